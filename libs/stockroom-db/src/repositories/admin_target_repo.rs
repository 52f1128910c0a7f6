use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::admin_target::AdminTarget;

#[derive(Debug, Clone)]
pub struct AdminTargetRepository {
    pool: PgPool,
}

impl AdminTargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns `true` when the chat was not registered before.
    pub async fn register(&self, chat_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO admin_targets (chat_id) VALUES ($1) ON CONFLICT (chat_id) DO NOTHING",
        )
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .context("Failed to register admin chat")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_all(&self) -> Result<Vec<AdminTarget>> {
        sqlx::query_as::<_, AdminTarget>("SELECT * FROM admin_targets ORDER BY registered_at ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch admin chats")
    }

    pub async fn exists(&self, chat_id: i64) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_targets WHERE chat_id = $1)")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up admin chat")
    }
}
