pub mod admin;
pub mod auth;
pub mod chat;
pub mod cron;
pub mod download;
pub mod health;
pub mod products;
pub mod purchases;
pub mod telegram;

use axum::http::StatusCode;

use crate::services::fulfillment_service::FulfillmentError;

pub fn error_status(err: &FulfillmentError) -> StatusCode {
    match err {
        FulfillmentError::NotFound => StatusCode::NOT_FOUND,
        FulfillmentError::NotPending(_) | FulfillmentError::StockExhausted => StatusCode::CONFLICT,
        FulfillmentError::Configuration(_)
        | FulfillmentError::LinkGeneration(_)
        | FulfillmentError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
