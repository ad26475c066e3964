// src/repositories/postgres/user.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use gradlink_common::models::{User, UserType};
use gradlink_common::traits::UserDirectory;

use crate::Error;

/// Directory backed by the local `users` table. In a deployment where user
/// accounts live in a separate service this is swapped for a remote client.
pub struct PostgresUserDirectory {
    pub pool: Pool<Postgres>,
}

impl PostgresUserDirectory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<User, Error> {
        Ok(User {
            user_id: r.try_get("user_id")?,
            display_name: r.try_get("display_name")?,
            user_type: UserType::from_str(&r.try_get::<String, _>("user_type")?)?,
            is_active: r.try_get("is_active")?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, Error> {
        let row = sqlx::query("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_moderators(&self) -> Result<Vec<User>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM users
            WHERE user_type = 'admin' AND is_active
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}
