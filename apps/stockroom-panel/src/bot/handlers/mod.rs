pub mod callback;
pub mod message;

use tracing::{debug, warn};

use crate::AppState;
use crate::bot::events::BotEvent;
use crate::services::notification_service::NotificationPayload;

pub const UNREGISTERED_CHAT: &str = "⛔ 등록되지 않은 채팅입니다. /start 로 먼저 등록하세요.";

/// Routes one parsed update. Every outcome, including failures, ends as a
/// chat reply; nothing here reports back through the webhook status.
pub async fn dispatch(state: &AppState, event: BotEvent) {
    debug!("Bot event: {:?}", event);

    if let BotEvent::Start { chat_id, secret } = &event {
        message::register(state, *chat_id, secret.as_deref()).await;
        return;
    }

    let Some(chat_id) = event.chat_id() else {
        return;
    };

    match state.ledger.is_admin(chat_id).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Rejected bot command from unregistered chat {}", chat_id);
            state
                .notifications
                .reply(chat_id, NotificationPayload::plain(UNREGISTERED_CHAT))
                .await;
            return;
        }
        Err(e) => {
            warn!("Admin lookup for chat {} failed: {}", chat_id, e);
            state
                .notifications
                .reply(chat_id, NotificationPayload::plain(format!("❌ 관리자 확인 실패: {}", e)))
                .await;
            return;
        }
    }

    match event {
        BotEvent::ListPending { chat_id } => message::list_pending(state, chat_id).await,
        BotEvent::Search { chat_id, depositor } => message::search(state, chat_id, &depositor).await,
        BotEvent::AdminReply {
            chat_id,
            user_id,
            content,
        } => message::admin_reply(state, chat_id, user_id, &content).await,
        BotEvent::Approve { chat_id, purchase_id } => callback::approve(state, chat_id, &purchase_id).await,
        BotEvent::ReplyPrompt { chat_id, user_id } => callback::reply_prompt(state, chat_id, &user_id).await,
        BotEvent::Start { .. } | BotEvent::Ignored => {}
    }
}
