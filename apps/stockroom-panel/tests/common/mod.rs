#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::types::Json;
use uuid::Uuid;

use stockroom_db::models::product::Product;
use stockroom_db::models::purchase::{NewPurchase, Purchase};
use stockroom_db::models::stock::StockUnit;
use stockroom_db::{Ledger, MemoryLedger};
use stockroom_panel::AppState;
use stockroom_panel::config::PanelConfig;
use stockroom_panel::handlers::auth::BuyerClaims;
use stockroom_panel::services::notification_service::RecordingNotifier;
use stockroom_panel::storage::MemoryStorage;
use stockroom_shared::PaymentMethod;

pub const BUCKET: &str = "product-files";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const CRON_SECRET: &str = "cron-secret";
pub const JWT_SECRET: &str = "jwt-secret";
pub const ADMIN_CHAT: i64 = 9001;

pub struct Harness {
    pub state: AppState,
    pub ledger: Arc<MemoryLedger>,
    pub storage: Arc<MemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn config() -> PanelConfig {
    PanelConfig {
        database_url: "postgres://localhost/stockroom_test".to_string(),
        max_connections: 1,
        listen_port: 0,
        storage_url: "https://storage.test".to_string(),
        storage_service_key: "service".to_string(),
        storage_bucket: BUCKET.to_string(),
        bot_token: None,
        bot_webhook_secret: None,
        admin_registration_secret: None,
        admin_token: ADMIN_TOKEN.to_string(),
        cron_secret: Some(CRON_SECRET.to_string()),
        jwt_secret: JWT_SECRET.to_string(),
        log_file: "test.log".to_string(),
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: PanelConfig) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let storage = Arc::new(MemoryStorage::new(&config.storage_bucket));
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState::new(config, ledger.clone(), storage.clone(), notifier.clone(), None);
    Harness {
        state,
        ledger,
        storage,
        notifier,
    }
}

pub fn product(stock: i32) -> Product {
    Product {
        id: Uuid::new_v4(),
        title: "Valor Loader".to_string(),
        description: "External ESP".to_string(),
        price: 7500,
        stock,
        pricing: Json(BTreeMap::new()),
        file_url: None,
        file_path: None,
        base_path: None,
        readme_template: None,
        created_at: Utc::now(),
    }
}

fn blank_unit(product_id: Uuid, created_at: DateTime<Utc>) -> StockUnit {
    StockUnit {
        id: Uuid::new_v4(),
        seq: 0,
        product_id,
        filename: None,
        file_url: None,
        key_content: None,
        duration: None,
        content: None,
        is_sold: false,
        sold_at: None,
        buyer_id: None,
        purchase_id: None,
        created_at,
    }
}

pub fn key_unit(product_id: Uuid, key: &str, duration: &str, created_at: DateTime<Utc>) -> StockUnit {
    StockUnit {
        key_content: Some(key.to_string()),
        duration: Some(duration.to_string()),
        ..blank_unit(product_id, created_at)
    }
}

pub fn file_unit(product_id: Uuid, path: &str, created_at: DateTime<Utc>) -> StockUnit {
    StockUnit {
        filename: path.rsplit('/').next().map(str::to_string),
        file_url: Some(format!(
            "https://storage.test/storage/v1/object/public/{}/{}",
            BUCKET, path
        )),
        ..blank_unit(product_id, created_at)
    }
}

pub fn sold(mut unit: StockUnit, buyer_id: Uuid, sold_at: DateTime<Utc>) -> StockUnit {
    unit.is_sold = true;
    unit.buyer_id = Some(buyer_id);
    unit.sold_at = Some(sold_at);
    unit
}

pub async fn pending_purchase(
    ledger: &MemoryLedger,
    product_id: Uuid,
    depositor: &str,
    duration: Option<&str>,
) -> Purchase {
    ledger
        .create_purchase(NewPurchase {
            user_id: Uuid::new_v4(),
            product_id,
            amount: 7500,
            payment_method: PaymentMethod::bank_transfer("국민은행", depositor).unwrap(),
            duration: duration.map(str::to_string),
            stock_quantity_at_purchase: None,
        })
        .await
        .unwrap()
}

pub fn buyer_token(buyer_id: Uuid) -> String {
    token_with_role(buyer_id, Some("authenticated"))
}

pub fn token_with_role(buyer_id: Uuid, role: Option<&str>) -> String {
    let claims = BuyerClaims {
        sub: buyer_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: role.map(str::to_string),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
