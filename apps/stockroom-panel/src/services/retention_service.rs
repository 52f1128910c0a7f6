use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use stockroom_db::Ledger;
use stockroom_shared::api::SweepItemError;

use crate::services::fulfillment_service::FulfillmentError;
use crate::storage::{self, ObjectStore};

pub const RETENTION_HOURS: i64 = 72;

#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: u64,
    pub errors: Vec<SweepItemError>,
}

/// Reclaims storage of sold single-use files after the grace period.
pub struct RetentionService {
    ledger: Arc<dyn Ledger>,
    storage: Arc<dyn ObjectStore>,
}

impl RetentionService {
    pub fn new(ledger: Arc<dyn Ledger>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { ledger, storage }
    }

    pub fn cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(RETENTION_HOURS)
    }

    /// Storage failures are recorded and never stop the batch; rows are
    /// deleted even when their object could not be removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, FulfillmentError> {
        let expired = self.ledger.expired_units(Self::cutoff(now)).await?;
        let mut report = SweepReport {
            scanned: expired.len(),
            ..SweepReport::default()
        };

        for unit in expired {
            let path = storage::object_path(
                unit.file_url.as_deref(),
                unit.filename.as_deref(),
                self.storage.bucket(),
            );

            match path {
                Some(path) => {
                    if let Err(e) = self.storage.remove(&[path.clone()]).await {
                        warn!("Storage delete failed for {} ({}): {}", unit.id, path, e);
                        report.errors.push(SweepItemError {
                            id: unit.id.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
                None => warn!("Stock unit {} has no resolvable object path", unit.id),
            }

            match self.ledger.delete_unit(unit.id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    error!("Failed to delete stock unit {}: {}", unit.id, e);
                    report.errors.push(SweepItemError {
                        id: unit.id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Retention sweep: {} expired, {} deleted, {} errors",
            report.scanned,
            report.deleted,
            report.errors.len()
        );
        Ok(report)
    }
}
