// src/repositories/postgres/message.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use gradlink_common::models::{Attachment, Message, MessageKind, MessageStatus, TOMBSTONE};

use crate::Error;

/// Insert payload for `MessageRepo::create`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub reply_to_message_id: Option<i64>,
}

#[async_trait::async_trait]
pub trait MessageRepo: Send + Sync {
    async fn create(&self, msg: &NewMessage) -> Result<Message, Error>;
    async fn get(&self, message_id: i64) -> Result<Option<Message>, Error>;
    /// Fetch a message only if `user_id` participates in its chat.
    async fn get_accessible(&self, message_id: i64, user_id: i64)
        -> Result<Option<Message>, Error>;
    async fn update_content(&self, message_id: i64, content: &str) -> Result<Message, Error>;
    /// Replace content with the tombstone and flag the row deleted.
    async fn soft_delete(&self, message_id: i64) -> Result<Message, Error>;
    /// Newest-first page of non-deleted messages, optional ILIKE search.
    /// Returns the page plus the total row count for pagination.
    async fn list_page(
        &self,
        chat_id: i64,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> Result<(Vec<Message>, i64), Error>;
    /// Newest-first page of non-deleted image/file messages.
    async fn list_attachments(
        &self,
        chat_id: i64,
        kind: Option<MessageKind>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Message>, i64), Error>;
    /// Forward-only status transition. Returns false when the guard rejects
    /// the transition (row already at or past `status`).
    async fn advance_status(&self, message_id: i64, status: MessageStatus)
        -> Result<bool, Error>;
    /// `sent -> delivered` for everything addressed to the receiver in one
    /// chat. Returns rows affected.
    async fn mark_delivered_in_chat(&self, chat_id: i64, receiver_id: i64) -> Result<u64, Error>;
    /// `sent -> delivered` for everything addressed to the receiver across all
    /// their chats (connect-time sweep).
    async fn mark_delivered_for_receiver(&self, receiver_id: i64) -> Result<u64, Error>;
    /// `{sent,delivered} -> read` for everything addressed to the receiver in
    /// one chat. Returns the ids of the rows that actually transitioned.
    async fn mark_read_in_chat(&self, chat_id: i64, receiver_id: i64) -> Result<Vec<i64>, Error>;
    /// Live count of {sent,delivered} non-deleted messages addressed to the
    /// receiver in a chat.
    async fn count_unread(&self, chat_id: i64, receiver_id: i64) -> Result<i64, Error>;
    /// Message counts by status over everything the user sent or received:
    /// (sent, delivered, read).
    async fn status_stats(&self, user_id: i64) -> Result<(i64, i64, i64), Error>;
}

pub struct MessageRepository {
    pub pool: Pool<Postgres>,
}

impl MessageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<Message, Error> {
        let attachment_url: Option<String> = r.try_get("attachment_url")?;
        let attachment = match attachment_url {
            Some(url) => Some(Attachment {
                url,
                original_name: r
                    .try_get::<Option<String>, _>("attachment_name")?
                    .unwrap_or_default(),
                byte_size: r
                    .try_get::<Option<i64>, _>("attachment_size")?
                    .unwrap_or_default(),
                mime_type: r
                    .try_get::<Option<String>, _>("attachment_mime_type")?
                    .unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Message {
            message_id: r.try_get("message_id")?,
            chat_id: r.try_get("chat_id")?,
            sender_id: r.try_get("sender_id")?,
            receiver_id: r.try_get("receiver_id")?,
            content: r.try_get("content")?,
            kind: MessageKind::from_str(&r.try_get::<String, _>("message_type")?)?,
            attachment,
            status: MessageStatus::from_str(&r.try_get::<String, _>("status")?)?,
            is_edited: r.try_get("is_edited")?,
            edited_at: r.try_get("edited_at")?,
            is_deleted: r.try_get("is_deleted")?,
            deleted_at: r.try_get("deleted_at")?,
            reply_to_message_id: r.try_get("reply_to_message_id")?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl MessageRepo for MessageRepository {
    async fn create(&self, msg: &NewMessage) -> Result<Message, Error> {
        let (url, name, size, mime) = match &msg.attachment {
            Some(a) => (
                Some(a.url.as_str()),
                Some(a.original_name.as_str()),
                Some(a.byte_size),
                Some(a.mime_type.as_str()),
            ),
            None => (None, None, None, None),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO messages (
                chat_id, sender_id, receiver_id, content, message_type,
                attachment_url, attachment_name, attachment_size,
                attachment_mime_type, reply_to_message_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(msg.chat_id)
        .bind(msg.sender_id)
        .bind(msg.receiver_id)
        .bind(&msg.content)
        .bind(msg.kind.as_str())
        .bind(url)
        .bind(name)
        .bind(size)
        .bind(mime)
        .bind(msg.reply_to_message_id)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn get(&self, message_id: i64) -> Result<Option<Message>, Error> {
        let row = sqlx::query("SELECT * FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn get_accessible(
        &self,
        message_id: i64,
        user_id: i64,
    ) -> Result<Option<Message>, Error> {
        let row = sqlx::query(
            r#"
            SELECT m.* FROM messages m
            JOIN chats c ON c.chat_id = m.chat_id
            WHERE m.message_id = $1
              AND (c.user1_id = $2 OR c.user2_id = $2)
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn update_content(&self, message_id: i64, content: &str) -> Result<Message, Error> {
        let row = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2,
                is_edited = TRUE,
                edited_at = now()
            WHERE message_id = $1
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn soft_delete(&self, message_id: i64) -> Result<Message, Error> {
        let row = sqlx::query(
            r#"
            UPDATE messages
            SET is_deleted = TRUE,
                deleted_at = now(),
                content = $2
            WHERE message_id = $1
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(TOMBSTONE)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn list_page(
        &self,
        chat_id: i64,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> Result<(Vec<Message>, i64), Error> {
        let pattern = search.map(|s| format!("%{}%", s));
        let offset = (page.saturating_sub(1) as i64) * page_size as i64;

        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
              AND NOT is_deleted
              AND ($2::text IS NULL OR content ILIKE $2)
            ORDER BY created_at DESC, message_id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(chat_id)
        .bind(&pattern)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE chat_id = $1
              AND NOT is_deleted
              AND ($2::text IS NULL OR content ILIKE $2)
            "#,
        )
        .bind(chat_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let messages = rows.iter().map(Self::from_row).collect::<Result<_, _>>()?;
        Ok((messages, total))
    }

    async fn list_attachments(
        &self,
        chat_id: i64,
        kind: Option<MessageKind>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Message>, i64), Error> {
        let kind_filter = kind.map(|k| k.as_str().to_string());
        let offset = (page.saturating_sub(1) as i64) * page_size as i64;

        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
              AND NOT is_deleted
              AND message_type IN ('image', 'file')
              AND ($2::text IS NULL OR message_type = $2)
            ORDER BY created_at DESC, message_id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(chat_id)
        .bind(&kind_filter)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE chat_id = $1
              AND NOT is_deleted
              AND message_type IN ('image', 'file')
              AND ($2::text IS NULL OR message_type = $2)
            "#,
        )
        .bind(chat_id)
        .bind(&kind_filter)
        .fetch_one(&self.pool)
        .await?;

        let messages = rows.iter().map(Self::from_row).collect::<Result<_, _>>()?;
        Ok((messages, total))
    }

    async fn advance_status(
        &self,
        message_id: i64,
        status: MessageStatus,
    ) -> Result<bool, Error> {
        // The WHERE guard makes the transition monotonic under concurrency: a
        // row already at or past the target status is left untouched.
        let result = match status {
            MessageStatus::Sent => return Ok(false),
            MessageStatus::Delivered => {
                sqlx::query(
                    "UPDATE messages SET status = 'delivered' \
                     WHERE message_id = $1 AND status = 'sent'",
                )
                .bind(message_id)
                .execute(&self.pool)
                .await?
            }
            MessageStatus::Read => {
                sqlx::query(
                    "UPDATE messages SET status = 'read' \
                     WHERE message_id = $1 AND status IN ('sent', 'delivered')",
                )
                .bind(message_id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn mark_delivered_in_chat(&self, chat_id: i64, receiver_id: i64) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'delivered'
            WHERE chat_id = $1 AND receiver_id = $2 AND status = 'sent'
            "#,
        )
        .bind(chat_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_delivered_for_receiver(&self, receiver_id: i64) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'delivered'
            WHERE receiver_id = $1 AND status = 'sent'
            "#,
        )
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_read_in_chat(&self, chat_id: i64, receiver_id: i64) -> Result<Vec<i64>, Error> {
        let rows = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'read'
            WHERE chat_id = $1 AND receiver_id = $2 AND status IN ('sent', 'delivered')
            RETURNING message_id
            "#,
        )
        .bind(chat_id)
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| Ok(r.try_get("message_id")?)).collect()
    }

    async fn count_unread(&self, chat_id: i64, receiver_id: i64) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE chat_id = $1
              AND receiver_id = $2
              AND status IN ('sent', 'delivered')
              AND NOT is_deleted
            "#,
        )
        .bind(chat_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn status_stats(&self, user_id: i64) -> Result<(i64, i64, i64), Error> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            GROUP BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let (mut sent, mut delivered, mut read) = (0i64, 0i64, 0i64);
        for r in rows {
            let status: String = r.try_get("status")?;
            let count: i64 = r.try_get("count")?;
            match status.as_str() {
                "sent" => sent = count,
                "delivered" => delivered = count,
                "read" => read = count,
                _ => {}
            }
        }
        Ok((sent, delivered, read))
    }
}
