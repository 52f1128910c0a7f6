use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use stockroom_db::models::product::Product;
use stockroom_db::models::purchase::{NewPurchase, Purchase};
use stockroom_db::{Ledger, StoreError};
use stockroom_shared::PaymentMethod;
use stockroom_shared::payment::PaymentMethodError;

use crate::services::fulfillment_service::{ApprovalOutcome, FulfillmentError, FulfillmentService};
use crate::services::notification_service::{NotificationPayload, NotificationService};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("product not found")]
    ProductNotFound,
    #[error("unknown duration tier: {0}")]
    UnknownTier(String),
    #[error("product is sold out")]
    SoldOut,
    #[error(transparent)]
    Payment(#[from] PaymentMethodError),
    #[error("a pending order already uses this bank and depositor name")]
    DuplicateDepositor,
    #[error("insufficient coin balance")]
    InsufficientBalance,
    #[error("coin payments must use the coin checkout")]
    WrongRail,
    #[error("order was paid but fulfillment failed: {0}")]
    Fulfillment(#[from] FulfillmentError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientBalance => Self::InsufficientBalance,
            StoreError::NotFound => Self::ProductNotFound,
            StoreError::DuplicatePending => Self::DuplicateDepositor,
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl CheckoutError {
    pub fn public_message(&self) -> String {
        match self {
            Self::ProductNotFound => "상품을 찾을 수 없습니다.".to_string(),
            Self::UnknownTier(_) => "선택한 기간의 가격 정보가 없습니다.".to_string(),
            Self::SoldOut => "재고가 소진되었습니다.".to_string(),
            Self::Payment(_) => "결제 정보가 올바르지 않습니다.".to_string(),
            Self::DuplicateDepositor => {
                "이미 해당 은행/예금주 명으로 등록된 구매 내역이 있습니다. 다른 예금주명을 사용해주세요.".to_string()
            }
            Self::InsufficientBalance => "코인 잔액이 부족합니다.".to_string(),
            Self::WrongRail => "코인 결제는 코인 결제 경로를 이용해주세요.".to_string(),
            Self::Fulfillment(e) => e.public_message(),
            Self::Persistence(_) => "처리 중 오류가 발생했습니다.".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutOrder {
    pub product_id: Uuid,
    pub duration: Option<String>,
    pub payment: PaymentMethod,
}

pub struct CheckoutService {
    ledger: Arc<dyn Ledger>,
    fulfillment: Arc<FulfillmentService>,
    notifications: Arc<NotificationService>,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        fulfillment: Arc<FulfillmentService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            ledger,
            fulfillment,
            notifications,
        }
    }

    async fn price(&self, order: &CheckoutOrder) -> Result<(Product, i64), CheckoutError> {
        let product = self
            .ledger
            .product(order.product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound)?;

        if !product.is_unlimited() && product.stock <= 0 {
            return Err(CheckoutError::SoldOut);
        }

        let amount = product
            .price_for(order.duration.as_deref())
            .ok_or_else(|| CheckoutError::UnknownTier(order.duration.clone().unwrap_or_default()))?;
        Ok((product, amount))
    }

    /// Records a pending order awaiting manual payment confirmation.
    pub async fn place_order(&self, buyer_id: Uuid, order: CheckoutOrder) -> Result<Purchase, CheckoutError> {
        if !order.payment.needs_manual_approval() {
            return Err(CheckoutError::WrongRail);
        }
        let (product, amount) = self.price(&order).await?;

        let tag = order.payment.to_string();
        if order.payment.depositor().is_some() && self.ledger.has_pending_tag(&tag).await? {
            return Err(CheckoutError::DuplicateDepositor);
        }

        let purchase = self
            .ledger
            .create_purchase(NewPurchase {
                user_id: buyer_id,
                product_id: product.id,
                amount,
                payment_method: order.payment.clone(),
                duration: order.duration.clone(),
                stock_quantity_at_purchase: Some(product.stock),
            })
            .await?;

        info!(
            "Order {} placed by {} for '{}' ({}원, {})",
            purchase.id, buyer_id, product.title, amount, tag
        );

        if let (Some(bank), Some(depositor)) = (order.payment.bank(), order.payment.depositor()) {
            let text = format!(
                "🔔 <b>새 입금 대기 주문</b>\n\n🏦 {} {}\n💰 {}원\n📦 {}\n\n이름을 입력하면 승인 메뉴가 뜹니다.",
                bank, depositor, amount, product.title
            );
            if let Err(e) = self.notifications.broadcast_admins(NotificationPayload::html(text)).await {
                warn!("Failed to announce order {}: {}", purchase.id, e);
            }
        }

        Ok(purchase)
    }

    /// Pays from the coin balance and fulfills immediately; the debit is
    /// refunded when fulfillment fails.
    pub async fn pay_with_coins(
        &self,
        buyer_id: Uuid,
        product_id: Uuid,
        duration: Option<String>,
    ) -> Result<(ApprovalOutcome, i64), CheckoutError> {
        let order = CheckoutOrder {
            product_id,
            duration,
            payment: PaymentMethod::Coin,
        };
        let (product, amount) = self.price(&order).await?;

        let (purchase, remaining) = self
            .ledger
            .create_coin_purchase(NewPurchase {
                user_id: buyer_id,
                product_id: product.id,
                amount,
                payment_method: PaymentMethod::Coin,
                duration: order.duration,
                stock_quantity_at_purchase: Some(product.stock),
            })
            .await?;

        match self.fulfillment.approve(purchase.id).await {
            Ok(outcome) => Ok((outcome, remaining)),
            Err(e) => {
                error!("Coin order {} failed to fulfill: {}", purchase.id, e);
                self.refund(&purchase).await;
                Err(CheckoutError::Fulfillment(e))
            }
        }
    }

    async fn refund(&self, purchase: &Purchase) {
        if let Err(e) = self.ledger.reject_purchase(purchase.id).await {
            error!("Failed to close unfulfilled coin order {}: {}", purchase.id, e);
        }
        match self.ledger.refund_coins(purchase.user_id, purchase.amount).await {
            Ok(balance) => info!("Refunded {} coins to {} (balance {})", purchase.amount, purchase.user_id, balance),
            Err(e) => error!("Refund for coin order {} failed: {}", purchase.id, e),
        }
    }
}
