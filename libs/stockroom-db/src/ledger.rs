use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::admin_target::AdminTarget;
use crate::models::message::ChatMessage;
use crate::models::product::Product;
use crate::models::purchase::{NewPurchase, PendingPurchase, Purchase};
use crate::models::stock::{NewFileUnit, StockUnit};
use crate::repositories::admin_target_repo::AdminTargetRepository;
use crate::repositories::message_repo::MessageRepository;
use crate::repositories::product_repo::ProductRepository;
use crate::repositories::profile_repo::ProfileRepository;
use crate::repositories::purchase_repo::PurchaseRepository;
use crate::repositories::stock_repo::StockRepository;

/// How the unit for an approval is obtained.
#[derive(Debug, Clone)]
pub enum Allocation {
    /// Claim the oldest unsold unit serving the purchase's duration.
    Fifo,
    /// Create a fresh sold unit pointing at the product's shared file.
    Mint(NewFileUnit),
}

#[derive(Debug, Clone)]
pub enum ApprovalCommit {
    Completed { purchase: Purchase, unit: StockUnit },
    AlreadyCompleted(Purchase),
}

/// Persistence boundary of the fulfillment engine.
///
/// `commit_approval` is the only write that touches both purchases and stock:
/// it locks the purchase, binds exactly one unit to it and flips it to
/// completed, or changes nothing.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn decrement_display_stock(&self, product_id: Uuid) -> Result<bool, StoreError>;
    async fn recount_display_stock(&self, product_id: Uuid) -> Result<i32, StoreError>;

    async fn purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError>;
    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StoreError>;
    async fn create_coin_purchase(&self, new: NewPurchase) -> Result<(Purchase, i64), StoreError>;
    async fn refund_coins(&self, user_id: Uuid, amount: i64) -> Result<i64, StoreError>;
    async fn has_pending_tag(&self, payment_method: &str) -> Result<bool, StoreError>;
    async fn latest_completed(&self, buyer_id: Uuid, product_id: Uuid) -> Result<Option<Purchase>, StoreError>;
    async fn pending_purchases(&self) -> Result<Vec<PendingPurchase>, StoreError>;
    async fn pending_by_depositor(&self, query: &str) -> Result<Vec<PendingPurchase>, StoreError>;
    async fn reject_purchase(&self, id: Uuid) -> Result<Purchase, StoreError>;
    async fn commit_approval(&self, purchase_id: Uuid, allocation: Allocation) -> Result<ApprovalCommit, StoreError>;

    async fn stock_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError>;
    async fn unit_for_purchase(&self, purchase_id: Uuid) -> Result<Option<StockUnit>, StoreError>;
    async fn unsold_units(&self, product_id: Uuid) -> Result<Vec<StockUnit>, StoreError>;
    async fn add_key_units(&self, product_id: Uuid, duration: &str, keys: &[String]) -> Result<u64, StoreError>;
    async fn add_file_units(&self, product_id: Uuid, files: &[NewFileUnit]) -> Result<u64, StoreError>;
    async fn delete_unsold_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError>;
    async fn expired_units(&self, cutoff: DateTime<Utc>) -> Result<Vec<StockUnit>, StoreError>;
    async fn delete_unit(&self, id: Uuid) -> Result<(), StoreError>;

    async fn register_admin(&self, chat_id: i64) -> Result<bool, StoreError>;
    async fn admin_targets(&self) -> Result<Vec<AdminTarget>, StoreError>;
    async fn is_admin(&self, chat_id: i64) -> Result<bool, StoreError>;

    async fn create_message(&self, user_id: Uuid, content: &str, is_admin: bool) -> Result<ChatMessage, StoreError>;
    async fn mark_messages_read(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    products: ProductRepository,
    purchases: PurchaseRepository,
    stock: StockRepository,
    profiles: ProfileRepository,
    admins: AdminTargetRepository,
    messages: MessageRepository,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool.clone()),
            purchases: PurchaseRepository::new(pool.clone()),
            stock: StockRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            admins: AdminTargetRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.get_by_id(id).await?)
    }

    async fn decrement_display_stock(&self, product_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.products.decrement_display_stock(product_id).await?)
    }

    async fn recount_display_stock(&self, product_id: Uuid) -> Result<i32, StoreError> {
        Ok(self.products.recount_display_stock(product_id).await?)
    }

    async fn purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.purchases.get_by_id(id).await?)
    }

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StoreError> {
        Ok(self.purchases.create(&new).await?)
    }

    async fn create_coin_purchase(&self, new: NewPurchase) -> Result<(Purchase, i64), StoreError> {
        self.purchases.create_with_coins(&new).await
    }

    async fn refund_coins(&self, user_id: Uuid, amount: i64) -> Result<i64, StoreError> {
        self.profiles.credit(user_id, amount).await
    }

    async fn has_pending_tag(&self, payment_method: &str) -> Result<bool, StoreError> {
        Ok(self.purchases.has_pending_tag(payment_method).await?)
    }

    async fn latest_completed(&self, buyer_id: Uuid, product_id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.purchases.latest_completed_for(buyer_id, product_id).await?)
    }

    async fn pending_purchases(&self) -> Result<Vec<PendingPurchase>, StoreError> {
        Ok(self.purchases.get_pending().await?)
    }

    async fn pending_by_depositor(&self, query: &str) -> Result<Vec<PendingPurchase>, StoreError> {
        Ok(self.purchases.get_pending_by_depositor(query).await?)
    }

    async fn reject_purchase(&self, id: Uuid) -> Result<Purchase, StoreError> {
        self.purchases.reject(id).await
    }

    async fn commit_approval(&self, purchase_id: Uuid, allocation: Allocation) -> Result<ApprovalCommit, StoreError> {
        let mut tx = self.pool.begin().await?;

        let purchase = PurchaseRepository::lock_tx(&mut tx, purchase_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if purchase.is_completed() {
            debug!("Purchase {} already completed, nothing to allocate", purchase_id);
            return Ok(ApprovalCommit::AlreadyCompleted(purchase));
        }
        if !purchase.is_pending() {
            return Err(StoreError::NotPending(purchase.status));
        }

        let unit = match allocation {
            Allocation::Fifo => StockRepository::claim_oldest_tx(
                &mut tx,
                purchase.product_id,
                purchase.duration.as_deref(),
                purchase.user_id,
                purchase.id,
            )
            .await?
            .ok_or(StoreError::StockExhausted)?,
            Allocation::Mint(file) => {
                StockRepository::mint_unlimited_tx(
                    &mut tx,
                    purchase.product_id,
                    &file,
                    purchase.user_id,
                    purchase.id,
                )
                .await?
            }
        };

        let purchase = PurchaseRepository::complete_tx(&mut tx, purchase_id).await?;
        tx.commit().await?;

        debug!("Purchase {} completed with stock unit {}", purchase.id, unit.id);
        Ok(ApprovalCommit::Completed { purchase, unit })
    }

    async fn stock_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.stock.get_by_id(id).await?)
    }

    async fn unit_for_purchase(&self, purchase_id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.stock.get_by_purchase(purchase_id).await?)
    }

    async fn unsold_units(&self, product_id: Uuid) -> Result<Vec<StockUnit>, StoreError> {
        Ok(self.stock.get_unsold(product_id).await?)
    }

    async fn add_key_units(&self, product_id: Uuid, duration: &str, keys: &[String]) -> Result<u64, StoreError> {
        Ok(self.stock.add_keys(product_id, duration, keys).await?)
    }

    async fn add_file_units(&self, product_id: Uuid, files: &[NewFileUnit]) -> Result<u64, StoreError> {
        Ok(self.stock.add_files(product_id, files).await?)
    }

    async fn delete_unsold_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.stock.delete_unsold(id).await?)
    }

    async fn expired_units(&self, cutoff: DateTime<Utc>) -> Result<Vec<StockUnit>, StoreError> {
        Ok(self.stock.get_expired(cutoff).await?)
    }

    async fn delete_unit(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(self.stock.delete(id).await?)
    }

    async fn register_admin(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(self.admins.register(chat_id).await?)
    }

    async fn admin_targets(&self) -> Result<Vec<AdminTarget>, StoreError> {
        Ok(self.admins.get_all().await?)
    }

    async fn is_admin(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(self.admins.exists(chat_id).await?)
    }

    async fn create_message(&self, user_id: Uuid, content: &str, is_admin: bool) -> Result<ChatMessage, StoreError> {
        Ok(self.messages.create(user_id, content, is_admin).await?)
    }

    async fn mark_messages_read(&self, user_id: Uuid) -> Result<u64, StoreError> {
        Ok(self.messages.mark_read(user_id).await?)
    }
}
