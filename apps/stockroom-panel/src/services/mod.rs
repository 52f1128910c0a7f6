pub mod catalog_service;
pub mod chat_service;
pub mod checkout_service;
pub mod delivery_service;
pub mod fulfillment_service;
pub mod notification_service;
pub mod package_service;
pub mod retention_service;
pub mod stock_service;
