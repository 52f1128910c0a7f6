use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use stockroom_shared::UNLIMITED_STOCK_CONTENT;

/// One allocatable deliverable in a product's stock pool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockUnit {
    pub id: Uuid,
    /// Insertion sequence; breaks ties between identical `created_at` values.
    pub seq: i64,
    pub product_id: Uuid,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub key_content: Option<String>,
    pub duration: Option<String>,
    pub content: Option<String>,
    pub is_sold: bool,
    pub sold_at: Option<DateTime<Utc>>,
    pub buyer_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockPayload<'a> {
    File { filename: Option<&'a str>, file_url: Option<&'a str> },
    LicenseKey { key: &'a str, duration: Option<&'a str> },
    Unlimited { filename: Option<&'a str>, file_url: Option<&'a str> },
}

impl StockUnit {
    pub fn is_unlimited(&self) -> bool {
        self.content.as_deref() == Some(UNLIMITED_STOCK_CONTENT)
    }

    pub fn payload(&self) -> StockPayload<'_> {
        if self.is_unlimited() {
            return StockPayload::Unlimited {
                filename: self.filename.as_deref(),
                file_url: self.file_url.as_deref(),
            };
        }
        match self.key_content.as_deref() {
            Some(key) => StockPayload::LicenseKey {
                key,
                duration: self.duration.as_deref(),
            },
            None => StockPayload::File {
                filename: self.filename.as_deref(),
                file_url: self.file_url.as_deref(),
            },
        }
    }

    /// Whether a stored object backs this unit.
    pub fn has_stored_file(&self) -> bool {
        self.key_content.is_none() && (self.file_url.is_some() || self.filename.is_some())
    }

    /// FIFO eligibility for a purchase; units without a duration serve any tier.
    pub fn serves_duration(&self, wanted: Option<&str>) -> bool {
        match (wanted, self.duration.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(w), Some(d)) => w == d,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFileUnit {
    pub filename: String,
    pub file_url: String,
}
