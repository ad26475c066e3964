// src/repositories/postgres/user_block.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use gradlink_common::models::UserBlock;

use crate::Error;

#[async_trait::async_trait]
pub trait UserBlockRepo: Send + Sync {
    async fn create(
        &self,
        blocker_id: i64,
        blocked_id: i64,
        reason: Option<&str>,
    ) -> Result<UserBlock, Error>;
    /// Ordered lookup: only the blocker's own row.
    async fn find(&self, blocker_id: i64, blocked_id: i64) -> Result<Option<UserBlock>, Error>;
    /// Symmetric check: true if a block exists in either direction.
    async fn exists_between(&self, user_a: i64, user_b: i64) -> Result<bool, Error>;
    /// Hard delete; blocking is not historical. Returns false if no row.
    async fn delete(&self, blocker_id: i64, blocked_id: i64) -> Result<bool, Error>;
    async fn list_for_blocker(&self, blocker_id: i64) -> Result<Vec<UserBlock>, Error>;
    async fn count(&self) -> Result<i64, Error>;
}

pub struct UserBlockRepository {
    pub pool: Pool<Postgres>,
}

impl UserBlockRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<UserBlock, Error> {
        Ok(UserBlock {
            block_id: r.try_get("block_id")?,
            blocker_id: r.try_get("blocker_id")?,
            blocked_id: r.try_get("blocked_id")?,
            reason: r.try_get("reason")?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl UserBlockRepo for UserBlockRepository {
    async fn create(
        &self,
        blocker_id: i64,
        blocked_id: i64,
        reason: Option<&str>,
    ) -> Result<UserBlock, Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_blocks (blocker_id, blocked_id, reason)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(reason)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn find(&self, blocker_id: i64, blocked_id: i64) -> Result<Option<UserBlock>, Error> {
        let row = sqlx::query(
            "SELECT * FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn exists_between(&self, user_a: i64, user_b: i64) -> Result<bool, Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_blocks
                WHERE (blocker_id = $1 AND blocked_id = $2)
                   OR (blocker_id = $2 AND blocked_id = $1)
            )
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn delete(&self, blocker_id: i64, blocked_id: i64) -> Result<bool, Error> {
        let result = sqlx::query(
            "DELETE FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_blocker(&self, blocker_id: i64) -> Result<Vec<UserBlock>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM user_blocks
            WHERE blocker_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(blocker_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn count(&self) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
