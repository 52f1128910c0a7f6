use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Telegram chat that receives operator notifications and may approve orders.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminTarget {
    pub chat_id: i64,
    pub registered_at: DateTime<Utc>,
}
