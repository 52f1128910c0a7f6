pub mod admin_target;
pub mod message;
pub mod product;
pub mod profile;
pub mod purchase;
pub mod stock;
