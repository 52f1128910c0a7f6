use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use teloxide::prelude::*;
use teloxide::types::{Update, UpdateKind};
use tracing::{error, warn};

use crate::AppState;
use crate::bot::{self, BotEvent};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Always answers 200 so the platform never retries; outcomes go back as
/// chat messages.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if let Some(expected) = state.config.bot_webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Telegram webhook call with a wrong secret token");
            return StatusCode::OK;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            error!("Unparseable Telegram update: {}", e);
            return StatusCode::OK;
        }
    };

    if let (UpdateKind::CallbackQuery(q), Some(tg)) = (&update.kind, state.bot.as_ref()) {
        if let Err(e) = tg.answer_callback_query(q.id.clone()).await {
            warn!("Failed to answer callback query: {}", e);
        }
    }

    bot::dispatch(&state, BotEvent::from_update(&update)).await;
    StatusCode::OK
}
