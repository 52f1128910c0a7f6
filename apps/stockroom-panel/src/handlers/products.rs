use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use stockroom_shared::api::ErrorResponse;
use uuid::Uuid;

use crate::AppState;
use crate::handlers::error_status;

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.catalog.product_view(id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => (error_status(&e), Json(ErrorResponse::new(e.public_message()))).into_response(),
    }
}
