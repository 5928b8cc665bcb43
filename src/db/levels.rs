//! User levels. A missing row means level 1 and is created on first use.

use anyhow::{bail, Result};
use sqlx::PgConnection;

use super::Database;

/// The user's level, creating the default row if needed.
pub async fn get_or_create(conn: &mut PgConnection, user_id: &str) -> Result<i32> {
    sqlx::query("INSERT INTO user_levels (user_id, level) VALUES ($1, 1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let level: i32 = sqlx::query_scalar("SELECT level FROM user_levels WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(level)
}

impl Database {
    pub async fn get_user_level(&self, user_id: &str) -> Result<i32> {
        let mut conn = self.pool.acquire().await?;
        get_or_create(&mut conn, user_id).await
    }

    /// Set a user's level (administrative). Levels start at 1.
    pub async fn set_user_level(&self, user_id: &str, level: i32) -> Result<()> {
        if level < 1 {
            bail!("level must be at least 1 (got {})", level);
        }
        sqlx::query(
            "INSERT INTO user_levels (user_id, level) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET level = EXCLUDED.level, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
