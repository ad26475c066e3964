// gradlink-core/src/services/status_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use gradlink_common::models::{MessageStatus, UnreadSummary};

use crate::eventbus::{ChatEvent, EventBus};
use crate::repositories::postgres::{ChatRepo, MessageRepo};
use crate::Error;

/// Delivery/read lifecycle and per-chat unread counters.
///
/// Counters are adjusted with storage-level deltas (see `ChatRepo`), and
/// every adjustment is followed by an `unread_count_updated` event to the
/// affected user so open clients stay in sync.
pub struct StatusService {
    message_repo: Arc<dyn MessageRepo>,
    chat_repo: Arc<dyn ChatRepo>,
    event_bus: Arc<EventBus>,
}

impl StatusService {
    pub fn new(
        message_repo: Arc<dyn MessageRepo>,
        chat_repo: Arc<dyn ChatRepo>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            message_repo,
            chat_repo,
            event_bus,
        }
    }

    /// Bump the receiver's unread counter for a freshly stored message and
    /// tell them about it. Returns the new counter value.
    pub async fn on_message_created(&self, chat_id: i64, receiver_id: i64) -> Result<i32, Error> {
        let unread = self.chat_repo.increment_unread(chat_id, receiver_id).await?;
        self.event_bus
            .publish_to_user(
                receiver_id,
                ChatEvent::UnreadCountUpdated {
                    chat_id,
                    unread_count: unread,
                },
            )
            .await;
        Ok(unread)
    }

    /// Connect-time sweep: everything still `sent` to this user becomes
    /// `delivered`. Unread counters are untouched; delivery is not reading.
    pub async fn mark_delivered_on_connect(&self, receiver_id: i64) -> Result<u64, Error> {
        let n = self.message_repo.mark_delivered_for_receiver(receiver_id).await?;
        if n > 0 {
            debug!("marked {} messages delivered for user {}", n, receiver_id);
        }
        Ok(n)
    }

    /// Fetch-time sweep for one chat.
    pub async fn mark_delivered_in_chat(
        &self,
        chat_id: i64,
        receiver_id: i64,
    ) -> Result<u64, Error> {
        self.message_repo
            .mark_delivered_in_chat(chat_id, receiver_id)
            .await
    }

    /// The reader opened a chat: everything addressed to them goes to
    /// `read`, their counter resets, and the counterpart hears which
    /// messages were read. Returns the transitioned message ids.
    pub async fn mark_read(&self, chat_id: i64, reader_id: i64) -> Result<Vec<i64>, Error> {
        let chat = self
            .chat_repo
            .get_for_participant(chat_id, reader_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat not found".into()))?;

        let message_ids = self.message_repo.mark_read_in_chat(chat_id, reader_id).await?;
        self.chat_repo.reset_unread(chat_id, reader_id).await?;

        if let Some(counterpart) = chat.other_participant(reader_id) {
            if !message_ids.is_empty() {
                self.event_bus
                    .publish_to_user(
                        counterpart,
                        ChatEvent::MessagesRead {
                            chat_id,
                            reader_id,
                            message_ids: message_ids.clone(),
                        },
                    )
                    .await;
            }
        }
        self.event_bus
            .publish_to_user(
                reader_id,
                ChatEvent::UnreadCountUpdated {
                    chat_id,
                    unread_count: 0,
                },
            )
            .await;

        Ok(message_ids)
    }

    /// Advance one message's status on behalf of its receiver. A no-op
    /// transition (already at or past the target) is not an error.
    pub async fn update_status(
        &self,
        message_id: i64,
        user_id: i64,
        status: MessageStatus,
    ) -> Result<bool, Error> {
        let msg = self
            .message_repo
            .get_accessible(message_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Message not found".into()))?;
        if msg.receiver_id != user_id {
            return Err(Error::Forbidden(
                "only the receiver can update message status".into(),
            ));
        }

        let advanced = self.message_repo.advance_status(message_id, status).await?;

        if advanced && status == MessageStatus::Read {
            // Single-message reads leave the counter derivable, not
            // resettable. Recompute it from the rows.
            let remaining = self.message_repo.count_unread(msg.chat_id, user_id).await?;
            self.chat_repo
                .set_unread(msg.chat_id, user_id, remaining as i32)
                .await?;
            self.event_bus
                .publish_to_user(
                    user_id,
                    ChatEvent::UnreadCountUpdated {
                        chat_id: msg.chat_id,
                        unread_count: remaining as i32,
                    },
                )
                .await;
            self.event_bus
                .publish_to_user(
                    msg.sender_id,
                    ChatEvent::MessagesRead {
                        chat_id: msg.chat_id,
                        reader_id: user_id,
                        message_ids: vec![message_id],
                    },
                )
                .await;
        }

        Ok(advanced)
    }

    /// Per-chat unread counters plus the grand total, from the chat rows.
    pub async fn unread_summary(&self, user_id: i64) -> Result<UnreadSummary, Error> {
        let chats = self.chat_repo.list_for_user(user_id, true).await?;
        let mut by_chat = HashMap::new();
        let mut total: i64 = 0;
        for chat in chats {
            let unread = chat.unread_for(user_id);
            if unread > 0 {
                by_chat.insert(chat.chat_id, unread);
            }
            total += unread as i64;
        }
        Ok(UnreadSummary { by_chat, total })
    }
}
