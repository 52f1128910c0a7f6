use serde::{Deserialize, Serialize};

pub mod meta;
pub mod payment;
pub mod readme;

pub use meta::{FileReference, ProductMeta};
pub use payment::PaymentMethod;

/// Stock units minted for shared-file products carry this content marker.
pub const UNLIMITED_STOCK_CONTENT: &str = "Unlimited Stock Item";

/// Display stock at or above this value marks a product as unlimited.
pub const UNLIMITED_STOCK_SENTINEL: i32 = 99990;

pub mod api {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApproveRequest {
        pub purchase_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ApproveResponse {
        pub success: bool,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorResponse {
        pub error: String,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>) -> Self {
            Self { error: error.into() }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DownloadRequest {
        pub stock_id: Option<String>,
        pub purchase_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DownloadResponse {
        pub url: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    pub struct SweepItemError {
        pub id: String,
        pub error: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum SweepResponse {
        Swept {
            deleted: u64,
            errors: Vec<SweepItemError>,
        },
        Idle {
            message: String,
        },
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckoutRequest {
        pub product_id: String,
        pub duration: Option<String>,
        /// `bank_transfer`, `bitcoin`, `litecoin`, `tron` or `coin`
        pub payment_method: String,
        pub bank_name: Option<String>,
        pub depositor_name: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckoutResponse {
        pub purchase_id: String,
        pub status: String,
        pub amount: i64,
        /// Coin balance left after a coin checkout.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub balance: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockKeysRequest {
        pub product_id: String,
        pub duration: String,
        /// One license key per line; blank lines are ignored.
        pub keys: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StockFile {
        pub filename: String,
        /// Object path inside the product bucket.
        pub path: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockFilesRequest {
        pub product_id: String,
        pub files: Vec<StockFile>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockAddedResponse {
        pub added: u64,
        pub display_stock: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChatNotifyRequest {
        pub user_id: String,
        pub content: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MarkReadRequest {
        pub target_user_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductView {
        pub id: String,
        pub title: String,
        pub description: String,
        pub price: i64,
        pub stock: i32,
        pub unlimited: bool,
        pub pricing: std::collections::BTreeMap<String, String>,
    }
}
