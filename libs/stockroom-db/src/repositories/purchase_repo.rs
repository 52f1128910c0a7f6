use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::purchase::{NewPurchase, PendingPurchase, Purchase, PurchaseStatus};
use crate::repositories::profile_repo::ProfileRepository;

/// Partial unique index over pending bank-transfer tags.
const PENDING_DEPOSITOR_INDEX: &str = "idx_purchases_pending_depositor";

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Purchase>> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch purchase by ID")
    }

    pub async fn create(&self, new: &NewPurchase) -> Result<Purchase, StoreError> {
        Self::insert(&self.pool, new).await.map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some(PENDING_DEPOSITOR_INDEX) => {
                StoreError::DuplicatePending
            }
            _ => StoreError::Database(e),
        })
    }

    /// Debits the buyer and records the purchase atomically.
    pub async fn create_with_coins(&self, new: &NewPurchase) -> Result<(Purchase, i64), StoreError> {
        let mut tx = self.pool.begin().await?;
        let remaining = ProfileRepository::debit_tx(&mut tx, new.user_id, new.amount).await?;
        let purchase = Self::insert(&mut *tx, new).await?;
        tx.commit().await?;
        Ok((purchase, remaining))
    }

    async fn insert<'e, E>(executor: E, new: &NewPurchase) -> Result<Purchase, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (id, user_id, product_id, amount, payment_method, status, duration, stock_quantity_at_purchase)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.product_id)
        .bind(new.amount)
        .bind(new.payment_method.to_string())
        .bind(new.duration.as_deref())
        .bind(new.stock_quantity_at_purchase)
        .fetch_one(executor)
        .await
    }

    pub async fn latest_completed_for(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<Purchase>> {
        sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE user_id = $1 AND product_id = $2 AND status = 'completed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest completed purchase")
    }

    pub async fn get_pending(&self) -> Result<Vec<PendingPurchase>> {
        sqlx::query_as::<_, PendingPurchase>(
            r#"
            SELECT pu.*, p.title AS product_title
            FROM purchases pu
            JOIN products p ON p.id = pu.product_id
            WHERE pu.status = 'pending'
            ORDER BY pu.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending purchases")
    }

    /// Case-insensitive substring match on the depositor segment of bank-transfer tags.
    pub async fn get_pending_by_depositor(&self, depositor: &str) -> Result<Vec<PendingPurchase>> {
        sqlx::query_as::<_, PendingPurchase>(
            r#"
            SELECT pu.*, p.title AS product_title
            FROM purchases pu
            JOIN products p ON p.id = pu.product_id
            WHERE pu.status = 'pending'
              AND pu.payment_method LIKE 'bank_transfer:%'
              AND split_part(pu.payment_method, ':', 3) ILIKE '%' || $1 || '%'
            ORDER BY pu.created_at ASC
            "#,
        )
        .bind(escape_like(depositor))
        .fetch_all(&self.pool)
        .await
        .context("Failed to search pending purchases by depositor")
    }

    pub async fn has_pending_tag(&self, payment_method: &str) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM purchases WHERE payment_method = $1 AND status = 'pending')",
        )
        .bind(payment_method)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check duplicate depositor")
    }

    pub async fn reject(&self, id: Uuid) -> Result<Purchase, StoreError> {
        let rejected = sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET status = 'rejected' WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match rejected {
            Some(purchase) => Ok(purchase),
            None => match self.get_by_id(id).await? {
                Some(existing) => Err(StoreError::NotPending(existing.status)),
                None => Err(StoreError::NotFound),
            },
        }
    }

    /// Row lock held until the surrounding transaction ends.
    pub async fn lock_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Purchase>, sqlx::Error> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn complete_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Purchase, sqlx::Error> {
        sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET status = $1, completed_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(PurchaseStatus::Completed.as_str())
        .bind(id)
        .fetch_one(&mut **tx)
        .await
    }
}

fn escape_like(raw: &str) -> String {
    raw.trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like(" 100%_x "), "100\\%\\_x");
    }
}
