use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use stockroom_shared::api::ErrorResponse;

use crate::AppState;

/// Claims of a buyer access token issued by the auth backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub role: Option<String>,
}

impl BuyerClaims {
    pub fn buyer_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized"))).into_response()
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    match extract_bearer_token(headers) {
        Some(token) if token == state.config.admin_token => Ok(()),
        _ => Err(unauthorized()),
    }
}

/// Cron calls are open when no secret is configured.
pub fn require_cron(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(secret) = state.config.cron_secret.as_deref() else {
        warn!("CRON_SECRET is not set, accepting unauthenticated cron call");
        return Ok(());
    };
    match extract_bearer_token(headers) {
        Some(token) if token == secret => Ok(()),
        _ => Err(unauthorized()),
    }
}

pub fn decode_buyer(state: &AppState, token: &str) -> Option<BuyerClaims> {
    decode::<BuyerClaims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .ok()
    .map(|data| data.claims)
}

/// Verifies the buyer JWT and stores its claims as a request extension.
pub async fn buyer_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(claims) = extract_bearer_token(req.headers()).and_then(|t| decode_buyer(&state, t)) else {
        return unauthorized();
    };

    if claims.role.as_deref() == Some("anon") || claims.buyer_id().is_none() {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    }

    req.extensions_mut().insert(claims);
    next.run(req).await
}
