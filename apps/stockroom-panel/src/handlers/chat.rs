use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use stockroom_shared::api::{ChatNotifyRequest, ErrorResponse, MarkReadRequest};

use crate::AppState;
use crate::handlers::auth::{BuyerClaims, decode_buyer, extract_bearer_token};

pub async fn chat_notify(
    State(state): State<AppState>,
    Extension(claims): Extension<BuyerClaims>,
    Json(req): Json<ChatNotifyRequest>,
) -> impl IntoResponse {
    let Ok(user_id) = Uuid::parse_str(req.user_id.trim()) else {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Invalid userId"))).into_response();
    };
    if claims.buyer_id() != Some(user_id) {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    }
    if req.content.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Empty message"))).into_response();
    }

    match state.chat.forward_to_admins(user_id, &req.content, Utc::now()).await {
        Ok(sent) => (StatusCode::OK, Json(json!({ "success": true, "sent": sent }))).into_response(),
        Err(e) => {
            error!("[Chat Notify] Failed for {}: {}", user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to notify admins")),
            )
                .into_response()
        }
    }
}

/// Admins name the buyer whose thread they read; buyers mark their own.
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MarkReadRequest>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized"))).into_response();
    };

    let target = if token == state.config.admin_token {
        match req.target_user_id.as_deref().map(|id| Uuid::parse_str(id.trim())) {
            Some(Ok(id)) => id,
            _ => {
                return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Missing targetUserId"))).into_response();
            }
        }
    } else {
        match decode_buyer(&state, token).and_then(|c| c.buyer_id()) {
            Some(id) => id,
            None => {
                return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized"))).into_response();
            }
        }
    };

    match state.chat.mark_read(target).await {
        Ok(updated) => (StatusCode::OK, Json(json!({ "success": true, "updated": updated }))).into_response(),
        Err(e) => {
            error!("Failed to mark messages of {} read: {}", target, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(e.public_message()))).into_response()
        }
    }
}
