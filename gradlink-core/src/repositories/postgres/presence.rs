// src/repositories/postgres/presence.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use gradlink_common::models::{PresenceStats, PresenceStatus, UserPresence};

use crate::Error;

#[async_trait::async_trait]
pub trait PresenceRepo: Send + Sync {
    /// Upsert the user's persisted presence row. `connection_id` is the
    /// handle of the connection that produced the change, if any.
    async fn upsert(
        &self,
        user_id: i64,
        status: PresenceStatus,
        connection_id: Option<Uuid>,
    ) -> Result<UserPresence, Error>;
    async fn get(&self, user_id: i64) -> Result<Option<UserPresence>, Error>;
    async fn list_online(&self) -> Result<Vec<UserPresence>, Error>;
    async fn stats(&self) -> Result<PresenceStats, Error>;
}

pub struct PresenceRepository {
    pub pool: Pool<Postgres>,
}

impl PresenceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<UserPresence, Error> {
        Ok(UserPresence {
            presence_id: r.try_get("presence_id")?,
            user_id: r.try_get("user_id")?,
            status: PresenceStatus::from_str(&r.try_get::<String, _>("status")?)?,
            last_seen: r.try_get::<DateTime<Utc>, _>("last_seen")?,
            connection_id: r.try_get("connection_id")?,
        })
    }
}

#[async_trait::async_trait]
impl PresenceRepo for PresenceRepository {
    async fn upsert(
        &self,
        user_id: i64,
        status: PresenceStatus,
        connection_id: Option<Uuid>,
    ) -> Result<UserPresence, Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_presence (user_id, status, connection_id, last_seen)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id) DO UPDATE
            SET status = EXCLUDED.status,
                connection_id = EXCLUDED.connection_id,
                last_seen = EXCLUDED.last_seen
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(status.as_str())
        .bind(connection_id)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn get(&self, user_id: i64) -> Result<Option<UserPresence>, Error> {
        let row = sqlx::query("SELECT * FROM user_presence WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_online(&self) -> Result<Vec<UserPresence>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM user_presence
            WHERE status = 'online'
            ORDER BY last_seen DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn stats(&self) -> Result<PresenceStats, Error> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM user_presence
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = PresenceStats::default();
        for r in rows {
            let status: String = r.try_get("status")?;
            let count: i64 = r.try_get("count")?;
            match status.as_str() {
                "online" => stats.online = count,
                "offline" => stats.offline = count,
                "away" => stats.away = count,
                "busy" => stats.busy = count,
                _ => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }
}
