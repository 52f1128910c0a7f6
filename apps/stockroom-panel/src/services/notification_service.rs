use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tokio::sync::Mutex;
use tracing::{info, warn};

use stockroom_db::Ledger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationParseMode {
    #[default]
    Plain,
    Html,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPayload {
    pub text: String,
    pub parse_mode: NotificationParseMode,
    /// Inline buttons as `(label, callback data)`, one per row.
    pub buttons: Vec<(String, String)>,
    pub force_reply: bool,
}

impl NotificationPayload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: NotificationParseMode::Html,
            ..Self::default()
        }
    }

    pub fn with_button(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.buttons.push((label.into(), data.into()));
        self
    }

    pub fn force_reply(mut self) -> Self {
        self.force_reply = true;
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("telegram delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound chat channel to operators.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, payload: NotificationPayload) -> Result<(), NotifyError>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, payload: NotificationPayload) -> Result<(), NotifyError> {
        let mut req = self.bot.send_message(ChatId(chat_id), payload.text);
        if payload.parse_mode == NotificationParseMode::Html {
            req = req.parse_mode(ParseMode::Html);
        }

        if payload.force_reply {
            req = req.reply_markup(ForceReply::new());
        } else if !payload.buttons.is_empty() {
            let rows: Vec<Vec<InlineKeyboardButton>> = payload
                .buttons
                .into_iter()
                .map(|(label, data)| vec![InlineKeyboardButton::callback(label, data)])
                .collect();
            req = req.reply_markup(InlineKeyboardMarkup::new(rows));
        }

        req.await.map_err(|e| NotifyError(e.to_string()))?;
        Ok(())
    }
}

/// Used when no bot token is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, chat_id: i64, _payload: NotificationPayload) -> Result<(), NotifyError> {
        warn!("Cannot notify chat {}: bot is not configured", chat_id);
        Ok(())
    }
}

/// Keeps every payload in memory; handy for tests and dry runs.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, NotificationPayload)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(i64, NotificationPayload)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, chat_id: i64) -> Vec<NotificationPayload> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, payload: NotificationPayload) -> Result<(), NotifyError> {
        self.sent.lock().await.push((chat_id, payload));
        Ok(())
    }
}

/// Fans a payload out to every registered admin chat.
pub struct NotificationService {
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(ledger: Arc<dyn Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        Self { ledger, notifier }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub async fn reply(&self, chat_id: i64, payload: NotificationPayload) {
        if let Err(e) = self.notifier.send(chat_id, payload).await {
            warn!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }

    pub async fn broadcast_admins(&self, payload: NotificationPayload) -> anyhow::Result<usize> {
        let targets = self.ledger.admin_targets().await?;
        if targets.is_empty() {
            info!("No admin chats registered, skipping notification");
            return Ok(0);
        }

        let mut sent = 0;
        for target in &targets {
            match self.notifier.send(target.chat_id, payload.clone()).await {
                Ok(()) => sent += 1,
                Err(e) => warn!("✗ Failed to notify admin chat {}: {}", target.chat_id, e),
            }
        }

        info!("Admin notification sent to {}/{} chats", sent, targets.len());
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_db::MemoryLedger;

    #[tokio::test]
    async fn broadcast_reaches_every_admin() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.register_admin(1).await.unwrap();
        ledger.register_admin(2).await.unwrap();
        let recorder = Arc::new(RecordingNotifier::new());
        let service = NotificationService::new(ledger, recorder.clone());

        let sent = service
            .broadcast_admins(NotificationPayload::html("<b>hi</b>").with_button("✉️ 답장하기", "reply_chat:u"))
            .await
            .unwrap();

        assert_eq!(sent, 2);
        let to_first = recorder.sent_to(1).await;
        assert_eq!(to_first[0].buttons, vec![("✉️ 답장하기".to_string(), "reply_chat:u".to_string())]);
    }
}
