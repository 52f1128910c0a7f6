use std::io::{Cursor, Write};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use zip::CompressionMethod;
use zip::write::FileOptions;

use stockroom_db::Ledger;
use stockroom_db::models::product::Product;
use stockroom_db::models::stock::StockUnit;
use stockroom_shared::readme::{self, ReadmeFields, UNKNOWN_ORDER_ID};

use crate::services::fulfillment_service::FulfillmentError;
use crate::storage::{ObjectStore, StorageError};

pub const PACKAGE_LINK_TTL_SECS: u64 = 3600;
const LOADER_PREFIX: &str = "base_";
const README_NAME: &str = "readme.txt";

/// Builds license-key packages on demand instead of storing one per sale.
pub struct PackageService {
    ledger: Arc<dyn Ledger>,
    storage: Arc<dyn ObjectStore>,
}

impl PackageService {
    pub fn new(ledger: Arc<dyn Ledger>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { ledger, storage }
    }

    /// Zips the product loader with a rendered readme, uploads it under
    /// `temp/` and returns a signed link. Temp objects expire through the
    /// bucket's lifecycle policy.
    pub async fn build_for_unit(&self, unit: &StockUnit, product: &Product) -> Result<String, FulfillmentError> {
        let license_key = unit.key_content.as_deref().ok_or_else(|| {
            FulfillmentError::Configuration(format!("stock unit {} carries no license key", unit.id))
        })?;

        let base_path = product
            .base_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                FulfillmentError::Configuration(format!("'{}' has no loader file configured", product.title))
            })?;

        let loader = self.storage.download(base_path).await.map_err(|e| match e {
            StorageError::NotFound(path) => {
                FulfillmentError::Configuration(format!("loader file {} is missing", path))
            }
            other => FulfillmentError::LinkGeneration(other.to_string()),
        })?;

        let order_id = self.order_id_for(unit, product).await;
        let readme_text = readme::render_or_default(
            product.readme_template.as_deref(),
            &ReadmeFields {
                product_name: &product.title,
                license_key,
                duration: unit.duration.as_deref().unwrap_or_default(),
                order_id: &order_id,
            },
        );

        let loader_name = loader_filename(base_path);
        let archive = build_archive(&loader_name, &loader, &readme_text)
            .map_err(|e| FulfillmentError::LinkGeneration(format!("failed to build archive: {}", e)))?;

        let path = format!("temp/{}/{}", Uuid::new_v4(), archive_name(&loader_name));
        self.storage
            .upload(&path, archive, "application/zip")
            .await
            .map_err(|e| FulfillmentError::LinkGeneration(e.to_string()))?;

        let url = self
            .storage
            .signed_url(&path, PACKAGE_LINK_TTL_SECS)
            .await
            .map_err(|e| FulfillmentError::LinkGeneration(e.to_string()))?;

        info!("Built package {} for stock unit {}", path, unit.id);
        Ok(url)
    }

    async fn order_id_for(&self, unit: &StockUnit, product: &Product) -> String {
        let Some(buyer) = unit.buyer_id else {
            return UNKNOWN_ORDER_ID.to_string();
        };
        match self.ledger.latest_completed(buyer, product.id).await {
            Ok(Some(purchase)) => purchase.id.to_string(),
            Ok(None) => UNKNOWN_ORDER_ID.to_string(),
            Err(e) => {
                warn!("Order lookup for buyer {} failed: {}", buyer, e);
                UNKNOWN_ORDER_ID.to_string()
            }
        }
    }
}

/// Loader name inside the archive: last path segment without the upload prefix.
pub fn loader_filename(base_path: &str) -> String {
    let name = base_path.rsplit('/').next().unwrap_or(base_path);
    let name = name.strip_prefix(LOADER_PREFIX).unwrap_or(name);
    if name.is_empty() {
        "loader.exe".to_string()
    } else {
        name.to_string()
    }
}

fn archive_name(loader_name: &str) -> String {
    let stem = loader_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(loader_name);
    format!("{}.zip", stem)
}

pub fn build_archive(loader_name: &str, loader: &[u8], readme_text: &str) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(loader_name, options)?;
    writer.write_all(loader)?;
    writer.start_file(README_NAME, options)?;
    writer.write_all(readme_text.as_bytes())?;

    Ok(writer.finish()?.into_inner())
}
