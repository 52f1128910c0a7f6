use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use uuid::Uuid;

use stockroom_shared::api::{DownloadRequest, DownloadResponse, ErrorResponse};

use crate::AppState;
use crate::handlers::auth::BuyerClaims;
use crate::handlers::error_status;
use crate::services::fulfillment_service::FulfillmentError;

fn parse_id(raw: Option<&str>) -> Option<Uuid> {
    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn failure(err: &FulfillmentError) -> Response {
    (error_status(err), Json(ErrorResponse::new(err.public_message()))).into_response()
}

/// `{stockId}` for the current delivery flow, `{purchaseId}` for older orders.
pub async fn download_link(
    State(state): State<AppState>,
    Extension(claims): Extension<BuyerClaims>,
    Json(req): Json<DownloadRequest>,
) -> impl IntoResponse {
    let Some(buyer_id) = claims.buyer_id() else {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    };

    let result = if let Some(stock_id) = parse_id(req.stock_id.as_deref()) {
        state.delivery.link_for_stock(buyer_id, stock_id).await
    } else if let Some(purchase_id) = parse_id(req.purchase_id.as_deref()) {
        state.delivery.link_for_purchase(buyer_id, purchase_id).await
    } else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing stockId or purchaseId")),
        )
            .into_response();
    };

    match result {
        Ok(url) => (StatusCode::OK, Json(DownloadResponse { url })).into_response(),
        Err(e) => {
            error!("Download link for buyer {} failed: {}", buyer_id, e);
            failure(&e)
        }
    }
}
