use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;

use stockroom_shared::api::{ErrorResponse, SweepResponse};

use crate::AppState;
use crate::handlers::auth::require_cron;

pub async fn cleanup(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(resp) = require_cron(&state, &headers) {
        return resp;
    }

    match state.retention.sweep(Utc::now()).await {
        Ok(report) if report.scanned == 0 => (
            StatusCode::OK,
            Json(SweepResponse::Idle {
                message: "No expired files to clean up.".to_string(),
            }),
        )
            .into_response(),
        Ok(report) => (
            StatusCode::OK,
            Json(SweepResponse::Swept {
                deleted: report.deleted,
                errors: report.errors,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Retention sweep failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
