/// Errors surfaced by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// No unsold unit matches the product and duration.
    #[error("no unsold stock available")]
    StockExhausted,

    #[error("purchase is {0}, expected pending")]
    NotPending(String),

    #[error("insufficient coin balance")]
    InsufficientBalance,

    /// Another pending bank-transfer order already uses this bank and depositor.
    #[error("a pending order already uses this depositor")]
    DuplicatePending,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Failures that say something about the data rather than the backend.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::StockExhausted
                | Self::NotPending(_)
                | Self::InsufficientBalance
                | Self::DuplicatePending
        )
    }
}
