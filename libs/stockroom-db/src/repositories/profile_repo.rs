use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Option<i64>, StoreError> {
        let balance = sqlx::query_scalar("SELECT coin_balance FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    /// Deducts inside the caller's transaction; the row lock serializes concurrent checkouts.
    pub async fn debit_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
    ) -> Result<i64, StoreError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT coin_balance FROM profiles WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

        let balance = balance.ok_or(StoreError::NotFound)?;
        if balance < amount {
            return Err(StoreError::InsufficientBalance);
        }

        let remaining = sqlx::query_scalar(
            "UPDATE profiles SET coin_balance = coin_balance - $1 WHERE id = $2 RETURNING coin_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(remaining)
    }

    pub async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, StoreError> {
        let balance = sqlx::query_scalar(
            "UPDATE profiles SET coin_balance = coin_balance + $1 WHERE id = $2 RETURNING coin_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        balance.ok_or(StoreError::NotFound)
    }
}
