use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use stockroom_shared::api::{
    ApproveRequest, ApproveResponse, ErrorResponse, StockAddedResponse, StockFilesRequest, StockKeysRequest,
};

use crate::AppState;
use crate::handlers::auth::require_admin;
use crate::handlers::error_status;
use crate::services::fulfillment_service::{ApprovalOutcome, FulfillmentError};

fn approved(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(ApproveResponse {
            success: true,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Malformed bodies get the same `{error}` shape as every other failure.
fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(req)| req).map_err(|rejection| {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(rejection.body_text()))).into_response()
    })
}

fn parse_purchase_id(req: &ApproveRequest) -> Option<Uuid> {
    req.purchase_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| Uuid::parse_str(id).ok())
}

pub async fn approve_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let req = match read_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let Some(purchase_id) = parse_purchase_id(&req) else {
        return bad_request("Missing purchaseId");
    };

    match state.fulfillment.approve(purchase_id).await {
        Ok(ApprovalOutcome::AlreadyCompleted(_)) => approved("Already completed"),
        Ok(ApprovalOutcome::Completed { unit, mode, .. }) => {
            info!("Admin approved {} ({:?}, unit {})", purchase_id, mode, unit.id);
            approved("Approved")
        }
        Err(e) => {
            error!("Admin approval of {} failed: {}", purchase_id, e);
            refused(&e)
        }
    }
}

/// Operators get the concrete reason for errors they can fix themselves.
fn approval_message(err: &FulfillmentError) -> String {
    match err {
        FulfillmentError::LinkGeneration(_) | FulfillmentError::Persistence(_) => {
            format!("Internal error: {}", err)
        }
        _ => err.public_message(),
    }
}

pub async fn reject_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let req = match read_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let Some(purchase_id) = parse_purchase_id(&req) else {
        return bad_request("Missing purchaseId");
    };

    match state.fulfillment.reject(purchase_id).await {
        Ok(_) => approved("Rejected"),
        Err(e) => {
            error!("Admin rejection of {} failed: {}", purchase_id, e);
            refused(&e)
        }
    }
}

fn refused(err: &FulfillmentError) -> Response {
    (error_status(err), Json(ErrorResponse::new(approval_message(err)))).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

fn failure(err: FulfillmentError) -> Response {
    (error_status(&err), Json(ErrorResponse::new(err.public_message()))).into_response()
}

pub async fn add_stock_keys(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StockKeysRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let req = match read_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let Ok(product_id) = Uuid::parse_str(req.product_id.trim()) else {
        return bad_request("Invalid productId");
    };
    if req.duration.trim().is_empty() {
        return bad_request("Missing duration");
    }

    match state.stock.add_keys(product_id, req.duration.trim(), &req.keys).await {
        Ok((0, _)) => bad_request("No keys provided"),
        Ok((added, display_stock)) => {
            (StatusCode::OK, Json(StockAddedResponse { added, display_stock })).into_response()
        }
        Err(e) => {
            error!("Failed to add keys to {}: {}", product_id, e);
            failure(e)
        }
    }
}

pub async fn add_stock_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StockFilesRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let req = match read_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let Ok(product_id) = Uuid::parse_str(req.product_id.trim()) else {
        return bad_request("Invalid productId");
    };
    let files: Vec<(String, String)> = req
        .files
        .into_iter()
        .filter(|f| !f.path.trim().is_empty())
        .map(|f| (f.filename, f.path))
        .collect();
    if files.is_empty() {
        return bad_request("No files provided");
    }

    match state.stock.add_files(product_id, &files).await {
        Ok((added, display_stock)) => {
            (StatusCode::OK, Json(StockAddedResponse { added, display_stock })).into_response()
        }
        Err(e) => {
            error!("Failed to add files to {}: {}", product_id, e);
            failure(e)
        }
    }
}

pub async fn list_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    match state.stock.list_unsold(product_id).await {
        Ok(units) => (StatusCode::OK, Json(units)).into_response(),
        Err(e) => failure(e),
    }
}

pub async fn delete_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(stock_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    match state.stock.delete_unsold(stock_id).await {
        Ok(display_stock) => (
            StatusCode::OK,
            Json(json!({ "deleted": stock_id, "displayStock": display_stock })),
        )
            .into_response(),
        Err(e) => failure(e),
    }
}
