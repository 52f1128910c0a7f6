use std::sync::Arc;

use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_db::models::product::Product;
use stockroom_shared::api::ProductView;

use crate::services::fulfillment_service::FulfillmentError;

pub struct CatalogService {
    ledger: Arc<dyn Ledger>,
}

impl CatalogService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn product_view(&self, id: Uuid) -> Result<ProductView, FulfillmentError> {
        let product = self
            .ledger
            .product(id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;
        Ok(to_view(&product))
    }
}

/// Buyer-facing projection; markers never leave the server.
pub fn to_view(product: &Product) -> ProductView {
    ProductView {
        id: product.id.to_string(),
        title: product.title.clone(),
        description: product.display_description(),
        price: product.price,
        stock: product.stock,
        unlimited: product.is_unlimited(),
        pricing: product.meta().pricing,
    }
}
