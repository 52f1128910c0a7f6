use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use stockroom_db::models::product::Product;
use stockroom_db::models::purchase::Purchase;
use stockroom_db::models::stock::{NewFileUnit, StockUnit};
use stockroom_db::{Allocation, ApprovalCommit, Ledger, StoreError};
use stockroom_shared::FileReference;

use crate::storage::ObjectStore;

const DEFAULT_SHARED_FILENAME: &str = "download.zip";

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("purchase or stock unit not found")]
    NotFound,
    #[error("purchase is {0}, only pending purchases can change")]
    NotPending(String),
    #[error("no unsold stock matches this purchase")]
    StockExhausted,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to generate download link: {0}")]
    LinkGeneration(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl FulfillmentError {
    /// Text safe to show buyers; backend details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound => "주문 또는 재고를 찾을 수 없습니다.".to_string(),
            Self::NotPending(_) => "이미 처리된 주문입니다.".to_string(),
            Self::StockExhausted => "재고가 부족하여 승인할 수 없습니다.".to_string(),
            Self::Configuration(detail) => format!("상품 설정 오류: {}", detail),
            Self::LinkGeneration(_) => "다운로드 링크 생성에 실패했습니다.".to_string(),
            Self::Persistence(_) => "처리 중 오류가 발생했습니다.".to_string(),
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::StockExhausted => Self::StockExhausted,
            StoreError::NotPending(status) => Self::NotPending(status),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Pooled units, oldest first.
    Fifo,
    /// One shared deliverable, a fresh unit per sale.
    Unlimited,
}

impl AllocationMode {
    pub fn of(product: &Product) -> Self {
        if product.is_unlimited() {
            Self::Unlimited
        } else {
            Self::Fifo
        }
    }
}

#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Completed {
        purchase: Purchase,
        product: Product,
        unit: StockUnit,
        mode: AllocationMode,
    },
    AlreadyCompleted(Purchase),
}

/// Single approval path shared by the admin API and the Telegram bot.
pub struct FulfillmentService {
    ledger: Arc<dyn Ledger>,
    storage: Arc<dyn ObjectStore>,
}

impl FulfillmentService {
    pub fn new(ledger: Arc<dyn Ledger>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { ledger, storage }
    }

    pub async fn approve(&self, purchase_id: Uuid) -> Result<ApprovalOutcome, FulfillmentError> {
        let purchase = self
            .ledger
            .purchase(purchase_id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;

        if purchase.is_completed() {
            info!("Purchase {} is already completed", purchase_id);
            return Ok(ApprovalOutcome::AlreadyCompleted(purchase));
        }
        if !purchase.is_pending() {
            return Err(FulfillmentError::NotPending(purchase.status));
        }

        let product = self
            .ledger
            .product(purchase.product_id)
            .await?
            .ok_or_else(|| {
                FulfillmentError::Configuration(format!("product {} no longer exists", purchase.product_id))
            })?;

        let mode = AllocationMode::of(&product);
        let allocation = match mode {
            AllocationMode::Fifo => Allocation::Fifo,
            AllocationMode::Unlimited => Allocation::Mint(self.shared_file(&product)?),
        };

        let (purchase, unit) = match self.ledger.commit_approval(purchase_id, allocation).await? {
            ApprovalCommit::Completed { purchase, unit } => (purchase, unit),
            ApprovalCommit::AlreadyCompleted(purchase) => {
                info!("Purchase {} was completed concurrently", purchase_id);
                return Ok(ApprovalOutcome::AlreadyCompleted(purchase));
            }
        };

        match self.ledger.decrement_display_stock(product.id).await {
            Ok(true) => {}
            Ok(false) => debug!("Display stock of {} left unchanged", product.id),
            Err(e) => warn!("Failed to decrement display stock of {}: {}", product.id, e),
        }

        info!(
            "Approved purchase {} ({:?}) for buyer {} with stock unit {}",
            purchase.id, mode, purchase.user_id, unit.id
        );

        Ok(ApprovalOutcome::Completed {
            purchase,
            product,
            unit,
            mode,
        })
    }

    pub async fn reject(&self, purchase_id: Uuid) -> Result<Purchase, FulfillmentError> {
        let purchase = self.ledger.reject_purchase(purchase_id).await?;
        info!("Rejected purchase {}", purchase_id);
        Ok(purchase)
    }

    /// Location of the shared deliverable that unlimited sales point at.
    fn shared_file(&self, product: &Product) -> Result<NewFileUnit, FulfillmentError> {
        // Only object paths name the download; direct URLs get the generic name.
        let (file_url, filename) = match product.meta().file {
            Some(FileReference::Url(url)) => (url, DEFAULT_SHARED_FILENAME.to_string()),
            Some(FileReference::Path(path)) => (self.storage.public_url(&path), filename_of(&path)),
            None => {
                return Err(FulfillmentError::Configuration(format!(
                    "'{}' is unlimited but has no file reference",
                    product.title
                )));
            }
        };

        Ok(NewFileUnit { filename, file_url })
    }
}

fn filename_of(reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| {
            urlencoding::decode(name)
                .map(|n| n.into_owned())
                .unwrap_or_else(|_| name.to_string())
        })
        .unwrap_or_else(|| DEFAULT_SHARED_FILENAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_filename_comes_from_last_segment() {
        assert_eq!(filename_of("files/abc.zip"), "abc.zip");
        assert_eq!(filename_of("https://host/a/%ED%8C%8C%EC%9D%BC.zip?x=1"), "파일.zip");
        assert_eq!(filename_of("https://host/dir/"), DEFAULT_SHARED_FILENAME);
    }

    #[test]
    fn stock_exhaustion_keeps_its_kind() {
        let err = FulfillmentError::from(StoreError::StockExhausted);
        assert!(matches!(err, FulfillmentError::StockExhausted));
        assert_eq!(err.public_message(), "재고가 부족하여 승인할 수 없습니다.");
    }
}
