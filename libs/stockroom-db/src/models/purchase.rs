use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use stockroom_shared::PaymentMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Rejected,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub status: String,
    pub duration: Option<String>,
    pub stock_quantity_at_purchase: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Purchase {
    pub fn status(&self) -> Option<PurchaseStatus> {
        PurchaseStatus::parse(&self.status)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(PurchaseStatus::Completed)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(PurchaseStatus::Pending)
    }

    pub fn payment(&self) -> Option<PaymentMethod> {
        self.payment_method.parse().ok()
    }
}

/// Pending purchase joined with its product title, as listed to operators.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingPurchase {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub purchase: Purchase,
    pub product_title: String,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub duration: Option<String>,
    pub stock_quantity_at_purchase: Option<i32>,
}
