pub mod bot;
pub mod cli;
pub mod config;
pub mod handlers;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use teloxide::Bot;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use stockroom_db::Ledger;

use crate::config::PanelConfig;
use crate::services::{
    catalog_service::CatalogService, chat_service::ChatService, checkout_service::CheckoutService,
    delivery_service::DeliveryService, fulfillment_service::FulfillmentService,
    notification_service::{NotificationService, Notifier}, package_service::PackageService,
    retention_service::RetentionService, stock_service::StockService,
};
use crate::storage::ObjectStore;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PanelConfig>,
    pub ledger: Arc<dyn Ledger>,
    pub storage: Arc<dyn ObjectStore>,
    /// Only used to acknowledge callback queries; replies go through `notifications`.
    pub bot: Option<Bot>,

    pub fulfillment: Arc<FulfillmentService>,
    pub packages: Arc<PackageService>,
    pub delivery: Arc<DeliveryService>,
    pub retention: Arc<RetentionService>,
    pub notifications: Arc<NotificationService>,
    pub checkout: Arc<CheckoutService>,
    pub stock: Arc<StockService>,
    pub chat: Arc<ChatService>,
    pub catalog: Arc<CatalogService>,
}

impl AppState {
    pub fn new(
        config: PanelConfig,
        ledger: Arc<dyn Ledger>,
        storage: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        bot: Option<Bot>,
    ) -> Self {
        let fulfillment = Arc::new(FulfillmentService::new(ledger.clone(), storage.clone()));
        let packages = Arc::new(PackageService::new(ledger.clone(), storage.clone()));
        let delivery = Arc::new(DeliveryService::new(ledger.clone(), storage.clone(), packages.clone()));
        let retention = Arc::new(RetentionService::new(ledger.clone(), storage.clone()));
        let notifications = Arc::new(NotificationService::new(ledger.clone(), notifier));
        let checkout = Arc::new(CheckoutService::new(
            ledger.clone(),
            fulfillment.clone(),
            notifications.clone(),
        ));
        let stock = Arc::new(StockService::new(ledger.clone(), storage.clone()));
        let chat = Arc::new(ChatService::new(ledger.clone(), notifications.clone()));
        let catalog = Arc::new(CatalogService::new(ledger.clone()));

        Self {
            config: Arc::new(config),
            ledger,
            storage,
            bot,
            fulfillment,
            packages,
            delivery,
            retention,
            notifications,
            checkout,
            stock,
            chat,
            catalog,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let buyer_routes = Router::new()
        .route("/api/purchases", post(handlers::purchases::checkout))
        .route("/api/purchases/coin", post(handlers::purchases::coin_checkout))
        .route("/api/download", post(handlers::download::download_link))
        .route("/api/chat-notify", post(handlers::chat::chat_notify))
        .layer(middleware::from_fn_with_state(state.clone(), handlers::auth::buyer_auth));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/products/{id}", get(handlers::products::get_product))
        .route("/api/admin/approve", post(handlers::admin::approve_purchase))
        .route("/api/admin/reject", post(handlers::admin::reject_purchase))
        .route("/api/admin/stock/keys", post(handlers::admin::add_stock_keys))
        .route("/api/admin/stock/files", post(handlers::admin::add_stock_files))
        .route(
            "/api/admin/stock/{id}",
            get(handlers::admin::list_stock).delete(handlers::admin::delete_stock),
        )
        .route("/api/cron/cleanup", get(handlers::cron::cleanup))
        .route("/api/telegram", post(handlers::telegram::webhook))
        .route("/api/messages/mark-read", post(handlers::chat::mark_read))
        .merge(buyer_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
