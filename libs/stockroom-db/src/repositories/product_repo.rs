use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::product::Product;
use stockroom_shared::UNLIMITED_STOCK_SENTINEL;

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product by ID")
    }

    /// Cosmetic counter; leaves the unlimited sentinel and zero untouched.
    pub async fn decrement_display_stock(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - 1 WHERE id = $1 AND stock > 0 AND stock < $2",
        )
        .bind(id)
        .bind(UNLIMITED_STOCK_SENTINEL)
        .execute(&self.pool)
        .await
        .context("Failed to decrement display stock")?;
        Ok(result.rows_affected() > 0)
    }

    /// Resets the display counter to the number of unsold units.
    pub async fn recount_display_stock(&self, id: Uuid) -> Result<i32> {
        let stock = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE products
            SET stock = (SELECT COUNT(*)::INTEGER FROM stock_units WHERE product_id = $1 AND is_sold = FALSE)
            WHERE id = $1 AND stock < $2
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(UNLIMITED_STOCK_SENTINEL)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to recount display stock")?;

        match stock {
            Some(stock) => Ok(stock),
            None => sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to read display stock"),
        }
    }
}
