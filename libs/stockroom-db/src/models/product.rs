use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use stockroom_shared::meta::strip_markers;
use stockroom_shared::{FileReference, ProductMeta, UNLIMITED_STOCK_SENTINEL};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    /// Display counter only; allocation never reads it except for the unlimited sentinel.
    pub stock: i32,
    pub pricing: Json<BTreeMap<String, String>>,
    pub file_url: Option<String>,
    pub file_path: Option<String>,
    /// Object path of the shared loader binary packaged with license keys.
    pub base_path: Option<String>,
    pub readme_template: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Structured columns win; description markers are the fallback for legacy rows.
    pub fn meta(&self) -> ProductMeta {
        let (_, legacy) = ProductMeta::parse(&self.description);

        let pricing = if self.pricing.0.is_empty() {
            legacy.pricing
        } else {
            self.pricing.0.clone()
        };

        let file = non_blank(self.file_url.as_deref())
            .map(|url| FileReference::Url(url.to_string()))
            .or_else(|| non_blank(self.file_path.as_deref()).map(|p| FileReference::Path(p.to_string())))
            .or(legacy.file);

        ProductMeta { pricing, file }
    }

    pub fn display_description(&self) -> String {
        strip_markers(&self.description)
    }

    pub fn has_unlimited_sentinel(&self) -> bool {
        self.stock >= UNLIMITED_STOCK_SENTINEL
    }

    pub fn is_unlimited(&self) -> bool {
        self.has_unlimited_sentinel() || self.meta().file.is_some()
    }

    /// Price of a duration tier, falling back to the base price when no tier is chosen.
    pub fn price_for(&self, duration: Option<&str>) -> Option<i64> {
        match duration {
            None => Some(self.price),
            Some(label) => self
                .meta()
                .pricing
                .get(label)
                .and_then(|p| p.replace(',', "").trim().parse::<i64>().ok()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
