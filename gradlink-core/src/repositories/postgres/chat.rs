// src/repositories/postgres/chat.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use gradlink_common::models::Chat;

use crate::Error;

#[async_trait::async_trait]
pub trait ChatRepo: Send + Sync {
    /// Create the chat row for an unordered participant pair.
    async fn create(&self, user_a: i64, user_b: i64) -> Result<Chat, Error>;
    async fn get(&self, chat_id: i64) -> Result<Option<Chat>, Error>;
    /// Lookup by unordered participant pair.
    async fn find_by_participants(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, Error>;
    /// Fetch a chat only if `user_id` is one of its participants; one query so
    /// inaccessible and absent chats are indistinguishable to callers.
    async fn get_for_participant(&self, chat_id: i64, user_id: i64)
        -> Result<Option<Chat>, Error>;
    async fn list_for_user(&self, user_id: i64, only_active: bool) -> Result<Vec<Chat>, Error>;
    async fn set_last_message(
        &self,
        chat_id: i64,
        message_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;
    /// Atomic `+1` on the given participant's unread counter. Returns the new
    /// count. Expressed as a storage-level delta so concurrent senders never
    /// lose an increment.
    async fn increment_unread(&self, chat_id: i64, user_id: i64) -> Result<i32, Error>;
    async fn reset_unread(&self, chat_id: i64, user_id: i64) -> Result<(), Error>;
    /// Overwrite the participant's counter with a recomputed value.
    async fn set_unread(&self, chat_id: i64, user_id: i64, count: i32) -> Result<(), Error>;
    /// Flip the active flag on any chat between the two users.
    async fn set_active_between(&self, user_a: i64, user_b: i64, active: bool)
        -> Result<(), Error>;
}

pub struct ChatRepository {
    pub pool: Pool<Postgres>,
}

impl ChatRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<Chat, Error> {
        Ok(Chat {
            chat_id: r.try_get("chat_id")?,
            user1_id: r.try_get("user1_id")?,
            user2_id: r.try_get("user2_id")?,
            last_message_id: r.try_get("last_message_id")?,
            last_message_at: r.try_get("last_message_at")?,
            user1_unread_count: r.try_get("user1_unread_count")?,
            user2_unread_count: r.try_get("user2_unread_count")?,
            is_active: r.try_get("is_active")?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    /// Normalize a pair so (a, b) and (b, a) address the same row.
    fn ordered(user_a: i64, user_b: i64) -> (i64, i64) {
        if user_a < user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        }
    }
}

#[async_trait::async_trait]
impl ChatRepo for ChatRepository {
    async fn create(&self, user_a: i64, user_b: i64) -> Result<Chat, Error> {
        let (u1, u2) = Self::ordered(user_a, user_b);
        let result = sqlx::query(
            r#"
            INSERT INTO chats (user1_id, user2_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(u1)
        .bind(u2)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::from_row(&row),
            Err(e) => {
                // Two concurrent creates for the same pair race past the
                // existence check; the loser takes the unique violation and
                // picks up the winner's row.
                let unique = e
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == "23505");
                if unique {
                    if let Some(chat) = self.find_by_participants(u1, u2).await? {
                        return Ok(chat);
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn get(&self, chat_id: i64) -> Result<Option<Chat>, Error> {
        let row = sqlx::query("SELECT * FROM chats WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_participants(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, Error> {
        let (u1, u2) = Self::ordered(user_a, user_b);
        let row = sqlx::query("SELECT * FROM chats WHERE user1_id = $1 AND user2_id = $2")
            .bind(u1)
            .bind(u2)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn get_for_participant(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<Chat>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM chats
            WHERE chat_id = $1 AND (user1_id = $2 OR user2_id = $2)
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_for_user(&self, user_id: i64, only_active: bool) -> Result<Vec<Chat>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM chats
            WHERE (user1_id = $1 OR user2_id = $1)
              AND (is_active OR NOT $2)
            ORDER BY last_message_at DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn set_last_message(
        &self,
        chat_id: i64,
        message_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chats
            SET last_message_id = $2,
                last_message_at = $3
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_unread(&self, chat_id: i64, user_id: i64) -> Result<i32, Error> {
        // Single atomic delta; RETURNING the counter that belongs to user_id.
        let row = sqlx::query(
            r#"
            UPDATE chats
            SET user1_unread_count = user1_unread_count
                    + CASE WHEN user1_id = $2 THEN 1 ELSE 0 END,
                user2_unread_count = user2_unread_count
                    + CASE WHEN user2_id = $2 THEN 1 ELSE 0 END
            WHERE chat_id = $1 AND (user1_id = $2 OR user2_id = $2)
            RETURNING CASE WHEN user1_id = $2
                           THEN user1_unread_count
                           ELSE user2_unread_count END AS unread
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(r.try_get("unread")?),
            None => Err(Error::NotFound("Chat not found".into())),
        }
    }

    async fn reset_unread(&self, chat_id: i64, user_id: i64) -> Result<(), Error> {
        self.set_unread(chat_id, user_id, 0).await
    }

    async fn set_unread(&self, chat_id: i64, user_id: i64, count: i32) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chats
            SET user1_unread_count = CASE WHEN user1_id = $2 THEN $3
                                          ELSE user1_unread_count END,
                user2_unread_count = CASE WHEN user2_id = $2 THEN $3
                                          ELSE user2_unread_count END
            WHERE chat_id = $1 AND (user1_id = $2 OR user2_id = $2)
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active_between(
        &self,
        user_a: i64,
        user_b: i64,
        active: bool,
    ) -> Result<(), Error> {
        let (u1, u2) = Self::ordered(user_a, user_b);
        sqlx::query(
            r#"
            UPDATE chats
            SET is_active = $3
            WHERE user1_id = $1 AND user2_id = $2
            "#,
        )
        .bind(u1)
        .bind(u2)
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
