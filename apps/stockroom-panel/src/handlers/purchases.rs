use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use stockroom_shared::PaymentMethod;
use stockroom_shared::api::{CheckoutRequest, CheckoutResponse, ErrorResponse};
use stockroom_shared::payment::PaymentMethodError;

use crate::AppState;
use crate::handlers::auth::BuyerClaims;
use crate::handlers::error_status;
use crate::services::checkout_service::{CheckoutError, CheckoutOrder};
use crate::services::fulfillment_service::ApprovalOutcome;

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::ProductNotFound => StatusCode::NOT_FOUND,
        CheckoutError::UnknownTier(_) | CheckoutError::Payment(_) | CheckoutError::WrongRail => {
            StatusCode::BAD_REQUEST
        }
        CheckoutError::SoldOut | CheckoutError::DuplicateDepositor => StatusCode::CONFLICT,
        CheckoutError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::Fulfillment(e) => error_status(e),
        CheckoutError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: &CheckoutError) -> Response {
    (checkout_status(err), Json(ErrorResponse::new(err.public_message()))).into_response()
}

fn payment_of(req: &CheckoutRequest) -> Result<PaymentMethod, PaymentMethodError> {
    match req.payment_method.trim() {
        "bank_transfer" => PaymentMethod::bank_transfer(
            req.bank_name.as_deref().unwrap_or_default(),
            req.depositor_name.as_deref().unwrap_or_default(),
        ),
        other => other.parse(),
    }
}

fn parse_product(req: &CheckoutRequest) -> Option<Uuid> {
    Uuid::parse_str(req.product_id.trim()).ok()
}

fn tier(req: &CheckoutRequest) -> Option<String> {
    req.duration
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<BuyerClaims>,
    Json(req): Json<CheckoutRequest>,
) -> impl IntoResponse {
    let Some(buyer_id) = claims.buyer_id() else {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    };
    let Some(product_id) = parse_product(&req) else {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Invalid productId"))).into_response();
    };
    let payment = match payment_of(&req) {
        Ok(p) => p,
        Err(e) => return failure(&CheckoutError::Payment(e)),
    };

    let order = CheckoutOrder {
        product_id,
        duration: tier(&req),
        payment,
    };

    match state.checkout.place_order(buyer_id, order).await {
        Ok(purchase) => (
            StatusCode::OK,
            Json(CheckoutResponse {
                purchase_id: purchase.id.to_string(),
                status: purchase.status,
                amount: purchase.amount,
                balance: None,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Checkout by {} refused: {}", buyer_id, e);
            failure(&e)
        }
    }
}

pub async fn coin_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<BuyerClaims>,
    Json(req): Json<CheckoutRequest>,
) -> impl IntoResponse {
    let Some(buyer_id) = claims.buyer_id() else {
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    };
    let Some(product_id) = parse_product(&req) else {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Invalid productId"))).into_response();
    };

    match state.checkout.pay_with_coins(buyer_id, product_id, tier(&req)).await {
        Ok((outcome, balance)) => {
            let purchase = match outcome {
                ApprovalOutcome::Completed { purchase, .. } => purchase,
                ApprovalOutcome::AlreadyCompleted(purchase) => purchase,
            };
            (
                StatusCode::OK,
                Json(CheckoutResponse {
                    purchase_id: purchase.id.to_string(),
                    status: purchase.status,
                    amount: purchase.amount,
                    balance: Some(balance),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Coin checkout by {} failed: {}", buyer_id, e);
            failure(&e)
        }
    }
}
