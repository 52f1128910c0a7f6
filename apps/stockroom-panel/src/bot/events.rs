use teloxide::types::{Update, UpdateKind};
use uuid::Uuid;

use crate::bot::keyboards::{APPROVE_PREFIX, REPLY_CHAT_PREFIX};
use crate::bot::utils::extract_user_marker;

pub const LIST_COMMAND: &str = "/전체";
pub const START_COMMAND: &str = "/start";

/// Inbound bot traffic reduced to what the approval flow acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Start { chat_id: i64, secret: Option<String> },
    ListPending { chat_id: i64 },
    Search { chat_id: i64, depositor: String },
    AdminReply { chat_id: i64, user_id: Uuid, content: String },
    Approve { chat_id: i64, purchase_id: String },
    ReplyPrompt { chat_id: i64, user_id: String },
    Ignored,
}

impl BotEvent {
    pub fn from_update(update: &Update) -> Self {
        match &update.kind {
            UpdateKind::Message(msg) => {
                let Some(text) = msg.text() else {
                    return Self::Ignored;
                };
                let replied_to = msg.reply_to_message().and_then(|m| m.text());
                Self::from_message(msg.chat.id.0, text, replied_to)
            }
            UpdateKind::CallbackQuery(q) => {
                let chat_id = q
                    .message
                    .as_ref()
                    .map(|m| m.chat().id.0)
                    .unwrap_or(q.from.id.0 as i64);
                Self::from_callback(chat_id, q.data.as_deref().unwrap_or_default())
            }
            _ => Self::Ignored,
        }
    }

    pub fn from_message(chat_id: i64, text: &str, replied_to: Option<&str>) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::Ignored;
        }

        if let Some(user_id) = replied_to.and_then(extract_user_marker) {
            return Self::AdminReply {
                chat_id,
                user_id,
                content: text.to_string(),
            };
        }

        let mut tokens = text.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let command = first.split('@').next().unwrap_or(first);

        match command {
            START_COMMAND => Self::Start {
                chat_id,
                secret: tokens.next().map(str::to_string),
            },
            LIST_COMMAND => Self::ListPending { chat_id },
            c if c.starts_with('/') => Self::Ignored,
            _ => Self::Search {
                chat_id,
                depositor: first.to_string(),
            },
        }
    }

    pub fn from_callback(chat_id: i64, data: &str) -> Self {
        if let Some(id) = data.strip_prefix(APPROVE_PREFIX) {
            return Self::Approve {
                chat_id,
                purchase_id: id.trim().to_string(),
            };
        }
        if let Some(id) = data.strip_prefix(REPLY_CHAT_PREFIX) {
            return Self::ReplyPrompt {
                chat_id,
                user_id: id.trim().to_string(),
            };
        }
        Self::Ignored
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Start { chat_id, .. }
            | Self::ListPending { chat_id }
            | Self::Search { chat_id, .. }
            | Self::AdminReply { chat_id, .. }
            | Self::Approve { chat_id, .. }
            | Self::ReplyPrompt { chat_id, .. } => Some(*chat_id),
            Self::Ignored => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::utils::user_marker;

    #[test]
    fn first_token_is_the_depositor() {
        assert_eq!(
            BotEvent::from_message(7, "  홍길동 30000원 입금했어요", None),
            BotEvent::Search {
                chat_id: 7,
                depositor: "홍길동".to_string()
            }
        );
    }

    #[test]
    fn commands_are_recognized() {
        assert_eq!(BotEvent::from_message(7, "/전체", None), BotEvent::ListPending { chat_id: 7 });
        assert_eq!(
            BotEvent::from_message(7, "/start@shop_bot s3cret", None),
            BotEvent::Start {
                chat_id: 7,
                secret: Some("s3cret".to_string())
            }
        );
        assert_eq!(BotEvent::from_message(7, "/help", None), BotEvent::Ignored);
    }

    #[test]
    fn replies_to_prompts_become_admin_messages() {
        let user = Uuid::new_v4();
        let prompt = format!("답장할 내용을 입력하세요.\n{}", user_marker(user));
        assert_eq!(
            BotEvent::from_message(7, "확인했습니다", Some(&prompt)),
            BotEvent::AdminReply {
                chat_id: 7,
                user_id: user,
                content: "확인했습니다".to_string()
            }
        );
    }

    #[test]
    fn callback_payloads_are_split() {
        assert_eq!(
            BotEvent::from_callback(7, "approve:abc"),
            BotEvent::Approve {
                chat_id: 7,
                purchase_id: "abc".to_string()
            }
        );
        assert_eq!(
            BotEvent::from_callback(7, "reply_chat:u1"),
            BotEvent::ReplyPrompt {
                chat_id: 7,
                user_id: "u1".to_string()
            }
        );
        assert_eq!(BotEvent::from_callback(7, "noop"), BotEvent::Ignored);
    }

    fn parse(raw: &str) -> Update {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn webhook_envelope_is_parsed() {
        let update = parse(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 1,
                    "date": 1700000000,
                    "chat": { "id": 555, "type": "private", "first_name": "Op" },
                    "from": { "id": 555, "is_bot": false, "first_name": "Op" },
                    "text": "/전체"
                }
            }"#,
        );
        assert_eq!(BotEvent::from_update(&update), BotEvent::ListPending { chat_id: 555 });
    }

    #[test]
    fn callback_envelope_becomes_an_approval() {
        let update = parse(
            r#"{
                "update_id": 11,
                "callback_query": {
                    "id": "4382",
                    "from": { "id": 555, "is_bot": false, "first_name": "Op" },
                    "chat_instance": "-1",
                    "data": "approve:0b1e6c3a-6f0e-4a43-9d53-2f7c1b1f4c10",
                    "message": {
                        "message_id": 2,
                        "date": 1700000000,
                        "chat": { "id": 555, "type": "private", "first_name": "Op" },
                        "from": { "id": 42, "is_bot": true, "first_name": "Shop" },
                        "text": "승인하시겠습니까?"
                    }
                }
            }"#,
        );
        assert_eq!(
            BotEvent::from_update(&update),
            BotEvent::Approve {
                chat_id: 555,
                purchase_id: "0b1e6c3a-6f0e-4a43-9d53-2f7c1b1f4c10".to_string()
            }
        );
    }
}
