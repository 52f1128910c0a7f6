use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::stock::{NewFileUnit, StockUnit};
use stockroom_shared::UNLIMITED_STOCK_CONTENT;

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: PgPool,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<StockUnit>> {
        sqlx::query_as::<_, StockUnit>("SELECT * FROM stock_units WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch stock unit")
    }

    pub async fn get_by_purchase(&self, purchase_id: Uuid) -> Result<Option<StockUnit>> {
        sqlx::query_as::<_, StockUnit>("SELECT * FROM stock_units WHERE purchase_id = $1")
            .bind(purchase_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch stock unit for purchase")
    }

    pub async fn get_unsold(&self, product_id: Uuid) -> Result<Vec<StockUnit>> {
        sqlx::query_as::<_, StockUnit>(
            "SELECT * FROM stock_units WHERE product_id = $1 AND is_sold = FALSE ORDER BY created_at DESC, seq DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch unsold stock")
    }

    pub async fn add_keys(&self, product_id: Uuid, duration: &str, keys: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;

        for key in keys {
            sqlx::query(
                "INSERT INTO stock_units (id, product_id, key_content, duration) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(key)
            .bind(duration)
            .execute(&mut *tx)
            .await
            .context("Failed to insert license key")?;
            added += 1;
        }

        tx.commit().await?;
        Ok(added)
    }

    pub async fn add_files(&self, product_id: Uuid, files: &[NewFileUnit]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;

        for file in files {
            sqlx::query(
                "INSERT INTO stock_units (id, product_id, filename, file_url) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(&file.filename)
            .bind(&file.file_url)
            .execute(&mut *tx)
            .await
            .context("Failed to insert stock file")?;
            added += 1;
        }

        tx.commit().await?;
        Ok(added)
    }

    /// Sold units are never removed here; the retention sweep owns those.
    pub async fn delete_unsold(&self, id: Uuid) -> Result<Option<StockUnit>> {
        sqlx::query_as::<_, StockUnit>(
            "DELETE FROM stock_units WHERE id = $1 AND is_sold = FALSE RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to delete stock unit")
    }

    /// Sold, file-backed, single-use units whose sale is older than `cutoff`.
    pub async fn get_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<StockUnit>> {
        sqlx::query_as::<_, StockUnit>(
            r#"
            SELECT * FROM stock_units
            WHERE is_sold = TRUE
              AND sold_at < $1
              AND content IS DISTINCT FROM $2
              AND key_content IS NULL
              AND (file_url IS NOT NULL OR filename IS NOT NULL)
            ORDER BY sold_at ASC
            "#,
        )
        .bind(cutoff)
        .bind(UNLIMITED_STOCK_CONTENT)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch expired stock")
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM stock_units WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete stock unit")?;
        Ok(())
    }

    /// Claims the oldest unsold unit in one statement. `SKIP LOCKED` keeps
    /// concurrent approvals from ever selecting the same row.
    pub async fn claim_oldest_tx(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        duration: Option<&str>,
        buyer_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Option<StockUnit>, sqlx::Error> {
        sqlx::query_as::<_, StockUnit>(
            r#"
            UPDATE stock_units
            SET is_sold = TRUE, buyer_id = $1, purchase_id = $2, sold_at = NOW()
            WHERE id = (
                SELECT id FROM stock_units
                WHERE product_id = $3
                  AND is_sold = FALSE
                  AND ($4::TEXT IS NULL OR duration IS NULL OR duration = $4)
                ORDER BY created_at ASC, seq ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(buyer_id)
        .bind(purchase_id)
        .bind(product_id)
        .bind(duration)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn mint_unlimited_tx(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        file: &NewFileUnit,
        buyer_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<StockUnit, sqlx::Error> {
        sqlx::query_as::<_, StockUnit>(
            r#"
            INSERT INTO stock_units (id, product_id, content, filename, file_url, is_sold, buyer_id, purchase_id, sold_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(UNLIMITED_STOCK_CONTENT)
        .bind(&file.filename)
        .bind(&file.file_url)
        .bind(buyer_id)
        .bind(purchase_id)
        .fetch_one(&mut **tx)
        .await
    }
}
