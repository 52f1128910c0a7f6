use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;
use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_db::models::message::ChatMessage;

use crate::bot::keyboards;
use crate::bot::utils::escape_html;
use crate::services::fulfillment_service::FulfillmentError;
use crate::services::notification_service::{NotificationPayload, NotificationService};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Relays buyer support chat to operators and stores their replies.
pub struct ChatService {
    ledger: Arc<dyn Ledger>,
    notifications: Arc<NotificationService>,
}

impl ChatService {
    pub fn new(ledger: Arc<dyn Ledger>, notifications: Arc<NotificationService>) -> Self {
        Self { ledger, notifications }
    }

    /// Returns how many admin chats received the message.
    pub async fn forward_to_admins(&self, user_id: Uuid, content: &str, now: DateTime<Utc>) -> anyhow::Result<usize> {
        info!("[Chat Notify] Forwarding message from {}", user_id);
        let payload = NotificationPayload::html(inquiry_text(user_id, content, now))
            .with_button(keyboards::REPLY_LABEL, keyboards::reply_chat_data(user_id));
        self.notifications.broadcast_admins(payload).await
    }

    pub async fn admin_reply(&self, user_id: Uuid, content: &str) -> Result<ChatMessage, FulfillmentError> {
        let message = self.ledger.create_message(user_id, content, true).await?;
        info!("Stored admin reply {} for {}", message.id, user_id);
        Ok(message)
    }

    pub async fn mark_read(&self, user_id: Uuid) -> Result<u64, FulfillmentError> {
        Ok(self.ledger.mark_messages_read(user_id).await?)
    }
}

pub fn inquiry_text(user_id: Uuid, content: &str, now: DateTime<Utc>) -> String {
    let time = FixedOffset::east_opt(KST_OFFSET_SECS)
        .map(|kst| now.with_timezone(&kst).format("%Y. %m. %d. %p %I:%M").to_string())
        .unwrap_or_else(|| now.to_rfc3339());
    format!(
        "💬 <b>1:1 문의 도착</b>\n\n[User]: {}\n[Time]: {}\n\n{}",
        user_id,
        time,
        escape_html(content)
    )
}
