pub mod admin_target_repo;
pub mod message_repo;
pub mod product_repo;
pub mod profile_repo;
pub mod purchase_repo;
pub mod stock_repo;
