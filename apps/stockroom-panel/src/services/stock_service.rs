use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_db::models::stock::{NewFileUnit, StockUnit};

use crate::services::fulfillment_service::FulfillmentError;
use crate::storage::ObjectStore;

/// Operator-side maintenance of the stock pool.
pub struct StockService {
    ledger: Arc<dyn Ledger>,
    storage: Arc<dyn ObjectStore>,
}

impl StockService {
    pub fn new(ledger: Arc<dyn Ledger>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { ledger, storage }
    }

    /// Adds one unit per non-blank line and returns `(added, display stock)`.
    pub async fn add_keys(&self, product_id: Uuid, duration: &str, pasted: &str) -> Result<(u64, i32), FulfillmentError> {
        self.ensure_product(product_id).await?;
        let keys = parse_key_lines(pasted);
        let duration = duration.trim();
        if keys.is_empty() || duration.is_empty() {
            return Ok((0, self.ledger.recount_display_stock(product_id).await?));
        }

        let added = self.ledger.add_key_units(product_id, duration, &keys).await?;
        let display = self.ledger.recount_display_stock(product_id).await?;
        info!("Added {} license keys ({}) to product {}", added, duration, product_id);
        Ok((added, display))
    }

    /// Registers already-uploaded objects as file units.
    pub async fn add_files(&self, product_id: Uuid, files: &[(String, String)]) -> Result<(u64, i32), FulfillmentError> {
        self.ensure_product(product_id).await?;
        let units: Vec<NewFileUnit> = files
            .iter()
            .filter(|(name, path)| !name.trim().is_empty() && !path.trim().is_empty())
            .map(|(name, path)| NewFileUnit {
                filename: name.trim().to_string(),
                file_url: self.storage.public_url(path.trim()),
            })
            .collect();

        let added = if units.is_empty() {
            0
        } else {
            self.ledger.add_file_units(product_id, &units).await?
        };
        let display = self.ledger.recount_display_stock(product_id).await?;
        info!("Added {} stock files to product {}", added, product_id);
        Ok((added, display))
    }

    pub async fn list_unsold(&self, product_id: Uuid) -> Result<Vec<StockUnit>, FulfillmentError> {
        Ok(self.ledger.unsold_units(product_id).await?)
    }

    pub async fn delete_unsold(&self, stock_id: Uuid) -> Result<i32, FulfillmentError> {
        let unit = self
            .ledger
            .delete_unsold_unit(stock_id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;
        info!("Deleted unsold stock unit {} of product {}", unit.id, unit.product_id);
        Ok(self.ledger.recount_display_stock(unit.product_id).await?)
    }

    async fn ensure_product(&self, product_id: Uuid) -> Result<(), FulfillmentError> {
        self.ledger
            .product(product_id)
            .await?
            .map(|_| ())
            .ok_or(FulfillmentError::NotFound)
    }
}

pub fn parse_key_lines(pasted: &str) -> Vec<String> {
    pasted
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_key_lines;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_key_lines("A-1\r\n\n  B-2  \n"), vec!["A-1", "B-2"]);
    }
}
