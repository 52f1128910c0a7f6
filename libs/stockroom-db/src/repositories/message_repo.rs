use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::message::ChatMessage;

#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: Uuid, content: &str, is_admin: bool) -> Result<ChatMessage> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (id, user_id, content, is_admin, is_read)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert chat message")
    }

    /// Marks the buyer's own unread messages as read.
    pub async fn mark_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE WHERE user_id = $1 AND is_admin = FALSE AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark messages read")?;
        Ok(result.rows_affected())
    }
}
