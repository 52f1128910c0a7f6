//! In-memory ledger used by tests and local dry runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::ledger::{Allocation, ApprovalCommit, Ledger};
use crate::models::admin_target::AdminTarget;
use crate::models::message::ChatMessage;
use crate::models::product::Product;
use crate::models::purchase::{NewPurchase, PendingPurchase, Purchase, PurchaseStatus};
use crate::models::stock::{NewFileUnit, StockUnit};
use stockroom_shared::{PaymentMethod, UNLIMITED_STOCK_CONTENT, UNLIMITED_STOCK_SENTINEL};

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    purchases: HashMap<Uuid, Purchase>,
    units: Vec<StockUnit>,
    balances: HashMap<Uuid, i64>,
    admins: BTreeSet<i64>,
    messages: Vec<ChatMessage>,
    next_seq: i64,
}

impl State {
    fn next_seq(&mut self) -> i64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn with_title(&self, purchase: &Purchase) -> PendingPurchase {
        let product_title = self
            .products
            .get(&purchase.product_id)
            .map(|p| p.title.clone())
            .unwrap_or_default();
        PendingPurchase {
            purchase: purchase.clone(),
            product_title,
        }
    }

    fn new_purchase(&self, new: &NewPurchase) -> Result<Purchase, StoreError> {
        if !self.products.contains_key(&new.product_id) {
            return Err(StoreError::NotFound);
        }
        let tag = new.payment_method.to_string();
        if new.payment_method.depositor().is_some()
            && self.purchases.values().any(|p| p.is_pending() && p.payment_method == tag)
        {
            return Err(StoreError::DuplicatePending);
        }
        Ok(Purchase {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            product_id: new.product_id,
            amount: new.amount,
            payment_method: new.payment_method.to_string(),
            status: PurchaseStatus::Pending.as_str().to_string(),
            duration: new.duration.clone(),
            stock_quantity_at_purchase: new.stock_quantity_at_purchase,
            created_at: Utc::now(),
            completed_at: None,
        })
    }
}

/// Ledger backed by a single mutex; every operation is trivially serializable.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
    fail_display_decrement: AtomicBool,
    decrement_attempts: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Stores the unit as given, assigning the next insertion sequence.
    pub async fn insert_unit(&self, mut unit: StockUnit) -> StockUnit {
        let mut state = self.state.lock().await;
        unit.seq = state.next_seq();
        state.units.push(unit.clone());
        unit
    }

    pub async fn insert_purchase(&self, purchase: Purchase) {
        self.state.lock().await.purchases.insert(purchase.id, purchase);
    }

    pub async fn set_balance(&self, user_id: Uuid, balance: i64) {
        self.state.lock().await.balances.insert(user_id, balance);
    }

    pub async fn balance(&self, user_id: Uuid) -> Option<i64> {
        self.state.lock().await.balances.get(&user_id).copied()
    }

    pub async fn units(&self) -> Vec<StockUnit> {
        self.state.lock().await.units.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    /// Makes every display-counter decrement fail with a backend error.
    pub fn fail_display_decrement(&self, fail: bool) {
        self.fail_display_decrement.store(fail, Ordering::SeqCst);
    }

    pub fn decrement_attempts(&self) -> usize {
        self.decrement_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn decrement_display_stock(&self, product_id: Uuid) -> Result<bool, StoreError> {
        self.decrement_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_display_decrement.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("display counter unavailable")));
        }

        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&product_id).ok_or(StoreError::NotFound)?;
        if product.stock > 0 && product.stock < UNLIMITED_STOCK_SENTINEL {
            product.stock -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    async fn recount_display_stock(&self, product_id: Uuid) -> Result<i32, StoreError> {
        let mut state = self.state.lock().await;
        let unsold = state
            .units
            .iter()
            .filter(|u| u.product_id == product_id && !u.is_sold)
            .count() as i32;
        let product = state.products.get_mut(&product_id).ok_or(StoreError::NotFound)?;
        if product.stock < UNLIMITED_STOCK_SENTINEL {
            product.stock = unsold;
        }
        Ok(product.stock)
    }

    async fn purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.state.lock().await.purchases.get(&id).cloned())
    }

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StoreError> {
        let mut state = self.state.lock().await;
        let purchase = state.new_purchase(&new)?;
        state.purchases.insert(purchase.id, purchase.clone());
        Ok(purchase)
    }

    async fn create_coin_purchase(&self, new: NewPurchase) -> Result<(Purchase, i64), StoreError> {
        let mut state = self.state.lock().await;
        let balance = *state.balances.get(&new.user_id).ok_or(StoreError::NotFound)?;
        if balance < new.amount {
            return Err(StoreError::InsufficientBalance);
        }
        let purchase = state.new_purchase(&new)?;
        let remaining = balance - new.amount;
        state.balances.insert(new.user_id, remaining);
        state.purchases.insert(purchase.id, purchase.clone());
        Ok((purchase, remaining))
    }

    async fn refund_coins(&self, user_id: Uuid, amount: i64) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        let balance = state.balances.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        *balance += amount;
        Ok(*balance)
    }

    async fn has_pending_tag(&self, payment_method: &str) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .purchases
            .values()
            .any(|p| p.is_pending() && p.payment_method == payment_method))
    }

    async fn latest_completed(&self, buyer_id: Uuid, product_id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .purchases
            .values()
            .filter(|p| p.user_id == buyer_id && p.product_id == product_id && p.is_completed())
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn pending_purchases(&self) -> Result<Vec<PendingPurchase>, StoreError> {
        let state = self.state.lock().await;
        let mut pending: Vec<PendingPurchase> = state
            .purchases
            .values()
            .filter(|p| p.is_pending())
            .map(|p| state.with_title(p))
            .collect();
        pending.sort_by(|a, b| b.purchase.created_at.cmp(&a.purchase.created_at));
        Ok(pending)
    }

    async fn pending_by_depositor(&self, query: &str) -> Result<Vec<PendingPurchase>, StoreError> {
        let state = self.state.lock().await;
        let mut found: Vec<PendingPurchase> = state
            .purchases
            .values()
            .filter(|p| p.is_pending())
            .filter(|p| {
                p.payment_method
                    .parse::<PaymentMethod>()
                    .map(|m| m.depositor_matches(query))
                    .unwrap_or(false)
            })
            .map(|p| state.with_title(p))
            .collect();
        found.sort_by(|a, b| a.purchase.created_at.cmp(&b.purchase.created_at));
        Ok(found)
    }

    async fn reject_purchase(&self, id: Uuid) -> Result<Purchase, StoreError> {
        let mut state = self.state.lock().await;
        let purchase = state.purchases.get_mut(&id).ok_or(StoreError::NotFound)?;
        if !purchase.is_pending() {
            return Err(StoreError::NotPending(purchase.status.clone()));
        }
        purchase.status = PurchaseStatus::Rejected.as_str().to_string();
        Ok(purchase.clone())
    }

    async fn commit_approval(&self, purchase_id: Uuid, allocation: Allocation) -> Result<ApprovalCommit, StoreError> {
        let mut state = self.state.lock().await;

        let purchase = state
            .purchases
            .get(&purchase_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        if purchase.is_completed() {
            return Ok(ApprovalCommit::AlreadyCompleted(purchase));
        }
        if !purchase.is_pending() {
            return Err(StoreError::NotPending(purchase.status));
        }

        let now = Utc::now();
        let unit = match allocation {
            Allocation::Fifo => {
                let wanted = purchase.duration.as_deref();
                let unit = state
                    .units
                    .iter_mut()
                    .filter(|u| u.product_id == purchase.product_id && !u.is_sold)
                    .filter(|u| u.serves_duration(wanted))
                    .min_by_key(|u| (u.created_at, u.seq))
                    .ok_or(StoreError::StockExhausted)?;
                unit.is_sold = true;
                unit.sold_at = Some(now);
                unit.buyer_id = Some(purchase.user_id);
                unit.purchase_id = Some(purchase.id);
                unit.clone()
            }
            Allocation::Mint(NewFileUnit { filename, file_url }) => {
                let seq = state.next_seq();
                let unit = StockUnit {
                    id: Uuid::new_v4(),
                    seq,
                    product_id: purchase.product_id,
                    filename: Some(filename),
                    file_url: Some(file_url),
                    key_content: None,
                    duration: None,
                    content: Some(UNLIMITED_STOCK_CONTENT.to_string()),
                    is_sold: true,
                    sold_at: Some(now),
                    buyer_id: Some(purchase.user_id),
                    purchase_id: Some(purchase.id),
                    created_at: now,
                };
                state.units.push(unit.clone());
                unit
            }
        };

        let stored = state
            .purchases
            .get_mut(&purchase_id)
            .ok_or(StoreError::NotFound)?;
        stored.status = PurchaseStatus::Completed.as_str().to_string();
        stored.completed_at = Some(now);

        Ok(ApprovalCommit::Completed {
            purchase: stored.clone(),
            unit,
        })
    }

    async fn stock_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.state.lock().await.units.iter().find(|u| u.id == id).cloned())
    }

    async fn unit_for_purchase(&self, purchase_id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .units
            .iter()
            .find(|u| u.purchase_id == Some(purchase_id))
            .cloned())
    }

    async fn unsold_units(&self, product_id: Uuid) -> Result<Vec<StockUnit>, StoreError> {
        let state = self.state.lock().await;
        let mut units: Vec<StockUnit> = state
            .units
            .iter()
            .filter(|u| u.product_id == product_id && !u.is_sold)
            .cloned()
            .collect();
        units.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        Ok(units)
    }

    async fn add_key_units(&self, product_id: Uuid, duration: &str, keys: &[String]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        for key in keys {
            let seq = state.next_seq();
            state.units.push(StockUnit {
                id: Uuid::new_v4(),
                seq,
                product_id,
                filename: None,
                file_url: None,
                key_content: Some(key.clone()),
                duration: Some(duration.to_string()),
                content: None,
                is_sold: false,
                sold_at: None,
                buyer_id: None,
                purchase_id: None,
                created_at: Utc::now(),
            });
        }
        Ok(keys.len() as u64)
    }

    async fn add_file_units(&self, product_id: Uuid, files: &[NewFileUnit]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        for file in files {
            let seq = state.next_seq();
            state.units.push(StockUnit {
                id: Uuid::new_v4(),
                seq,
                product_id,
                filename: Some(file.filename.clone()),
                file_url: Some(file.file_url.clone()),
                key_content: None,
                duration: None,
                content: None,
                is_sold: false,
                sold_at: None,
                buyer_id: None,
                purchase_id: None,
                created_at: Utc::now(),
            });
        }
        Ok(files.len() as u64)
    }

    async fn delete_unsold_unit(&self, id: Uuid) -> Result<Option<StockUnit>, StoreError> {
        let mut state = self.state.lock().await;
        let position = state.units.iter().position(|u| u.id == id && !u.is_sold);
        Ok(position.map(|i| state.units.remove(i)))
    }

    async fn expired_units(&self, cutoff: DateTime<Utc>) -> Result<Vec<StockUnit>, StoreError> {
        let state = self.state.lock().await;
        let mut units: Vec<StockUnit> = state
            .units
            .iter()
            .filter(|u| u.is_sold && !u.is_unlimited() && u.has_stored_file())
            .filter(|u| u.sold_at.map(|t| t < cutoff).unwrap_or(false))
            .cloned()
            .collect();
        units.sort_by_key(|u| u.sold_at);
        Ok(units)
    }

    async fn delete_unit(&self, id: Uuid) -> Result<(), StoreError> {
        self.state.lock().await.units.retain(|u| u.id != id);
        Ok(())
    }

    async fn register_admin(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.admins.insert(chat_id))
    }

    async fn admin_targets(&self) -> Result<Vec<AdminTarget>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .admins
            .iter()
            .map(|&chat_id| AdminTarget {
                chat_id,
                registered_at: Utc::now(),
            })
            .collect())
    }

    async fn is_admin(&self, chat_id: i64) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.admins.contains(&chat_id))
    }

    async fn create_message(&self, user_id: Uuid, content: &str, is_admin: bool) -> Result<ChatMessage, StoreError> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            is_admin,
            is_read: is_admin,
            created_at: Utc::now(),
        };
        self.state.lock().await.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_messages_read(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut marked = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.user_id == user_id && !m.is_admin && !m.is_read)
        {
            message.is_read = true;
            marked += 1;
        }
        Ok(marked)
    }
}
