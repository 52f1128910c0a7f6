use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_db::models::stock::StockUnit;

use crate::services::fulfillment_service::FulfillmentError;
use crate::services::package_service::PackageService;
use crate::storage::{self, ObjectStore};

pub const STOCK_LINK_TTL_SECS: u64 = 3600;
pub const PURCHASE_LINK_TTL_SECS: u64 = 60;

/// Turns buyer-held references into short-lived download links.
pub struct DeliveryService {
    ledger: Arc<dyn Ledger>,
    storage: Arc<dyn ObjectStore>,
    packages: Arc<PackageService>,
}

impl DeliveryService {
    pub fn new(ledger: Arc<dyn Ledger>, storage: Arc<dyn ObjectStore>, packages: Arc<PackageService>) -> Self {
        Self {
            ledger,
            storage,
            packages,
        }
    }

    pub async fn link_for_stock(&self, buyer_id: Uuid, stock_id: Uuid) -> Result<String, FulfillmentError> {
        let unit = self
            .ledger
            .stock_unit(stock_id)
            .await?
            .filter(|u| u.buyer_id == Some(buyer_id))
            .ok_or(FulfillmentError::NotFound)?;

        if unit.key_content.is_some() {
            let product = self
                .ledger
                .product(unit.product_id)
                .await?
                .ok_or(FulfillmentError::NotFound)?;
            return self.packages.build_for_unit(&unit, &product).await;
        }

        self.sign(&unit, STOCK_LINK_TTL_SECS).await
    }

    /// Legacy path keyed by purchase; only completed purchases of the caller qualify.
    pub async fn link_for_purchase(&self, buyer_id: Uuid, purchase_id: Uuid) -> Result<String, FulfillmentError> {
        let purchase = self
            .ledger
            .purchase(purchase_id)
            .await?
            .filter(|p| p.user_id == buyer_id && p.is_completed())
            .ok_or(FulfillmentError::NotFound)?;

        let unit = self
            .ledger
            .unit_for_purchase(purchase.id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;

        self.sign(&unit, PURCHASE_LINK_TTL_SECS).await
    }

    async fn sign(&self, unit: &StockUnit, ttl_secs: u64) -> Result<String, FulfillmentError> {
        let path = storage::object_path(
            unit.file_url.as_deref(),
            unit.filename.as_deref(),
            self.storage.bucket(),
        )
        .ok_or_else(|| {
            FulfillmentError::Configuration(format!("stock unit {} has no stored file", unit.id))
        })?;

        let url = self.storage.signed_url(&path, ttl_secs).await.map_err(|e| {
            error!("Signing {} for stock unit {} failed: {}", path, unit.id, e);
            FulfillmentError::LinkGeneration(e.to_string())
        })?;

        info!("Issued {}s link for stock unit {}", ttl_secs, unit.id);
        Ok(url)
    }
}
