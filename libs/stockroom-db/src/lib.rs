pub mod db;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod repositories;

pub use error::StoreError;
pub use ledger::{Allocation, ApprovalCommit, Ledger, PgLedger};
pub use memory::MemoryLedger;
pub use sqlx;
