// gradlink-core/src/services/presence_service.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use gradlink_common::models::{PresenceStats, PresenceStatus, UserPresence};

use crate::eventbus::{ChatEvent, EventBus};
use crate::repositories::postgres::{ChatRepo, PresenceRepo};
use crate::Error;

/// Tracks who is connected right now and fans presence changes out to the
/// user's contacts (counterparts of their active chats).
///
/// Liveness is held in memory; the repository row is the durable record
/// (status plus last_seen) that survives restarts.
pub struct PresenceService {
    presence_repo: Arc<dyn PresenceRepo>,
    chat_repo: Arc<dyn ChatRepo>,
    event_bus: Arc<EventBus>,
    /// user_id -> handle of the connection that owns their online state.
    connections: DashMap<i64, Uuid>,
    /// (chat_id, user_id) -> last typing signal.
    typing: DashMap<(i64, i64), DateTime<Utc>>,
}

impl PresenceService {
    pub fn new(
        presence_repo: Arc<dyn PresenceRepo>,
        chat_repo: Arc<dyn ChatRepo>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            presence_repo,
            chat_repo,
            event_bus,
            connections: DashMap::new(),
            typing: DashMap::new(),
        }
    }

    /// Register a new connection for the user and mark them online.
    /// Returns the connection handle the caller must present to
    /// `set_offline`. A reconnect replaces the previous handle, so the
    /// stale connection's disconnect becomes a no-op.
    pub async fn set_online(&self, user_id: i64) -> Result<Uuid, Error> {
        let handle = Uuid::new_v4();
        self.connections.insert(user_id, handle);
        let presence = self
            .presence_repo
            .upsert(user_id, PresenceStatus::Online, Some(handle))
            .await?;
        info!("user {} online (connection {})", user_id, handle);
        self.broadcast_to_contacts(user_id, &presence).await?;
        Ok(handle)
    }

    /// Mark the user offline, but only if `handle` still owns their
    /// online state. A disconnect that raced with a reconnect is ignored.
    pub async fn set_offline(&self, user_id: i64, handle: Uuid) -> Result<(), Error> {
        let owned = self
            .connections
            .remove_if(&user_id, |_, current| *current == handle)
            .is_some();
        if !owned {
            debug!(
                "stale disconnect for user {} (connection {}), ignoring",
                user_id, handle
            );
            return Ok(());
        }

        let presence = self
            .presence_repo
            .upsert(user_id, PresenceStatus::Offline, None)
            .await?;
        info!("user {} offline", user_id);
        self.broadcast_to_contacts(user_id, &presence).await?;
        Ok(())
    }

    /// Manual status change (away, busy, back to online) on a live
    /// connection. Going offline goes through `set_offline` instead.
    pub async fn set_status(&self, user_id: i64, status: PresenceStatus) -> Result<(), Error> {
        if status == PresenceStatus::Offline {
            return Err(Error::Validation(
                "disconnect to go offline".into(),
            ));
        }
        let handle = self.connections.get(&user_id).map(|h| *h);
        let presence = self.presence_repo.upsert(user_id, status, handle).await?;
        self.broadcast_to_contacts(user_id, &presence).await?;
        Ok(())
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn connection_of(&self, user_id: i64) -> Option<Uuid> {
        self.connections.get(&user_id).map(|h| *h)
    }

    pub async fn get_presence(&self, user_id: i64) -> Result<Option<UserPresence>, Error> {
        self.presence_repo.get(user_id).await
    }

    pub async fn online_users(&self) -> Result<Vec<UserPresence>, Error> {
        self.presence_repo.list_online().await
    }

    pub async fn stats(&self) -> Result<PresenceStats, Error> {
        self.presence_repo.stats().await
    }

    pub async fn start_typing(&self, chat_id: i64, user_id: i64) {
        self.typing.insert((chat_id, user_id), Utc::now());
        self.event_bus
            .publish_to_chat(
                chat_id,
                ChatEvent::UserTyping {
                    chat_id,
                    user_id,
                    is_typing: true,
                },
            )
            .await;
    }

    pub async fn stop_typing(&self, chat_id: i64, user_id: i64) {
        if self.typing.remove(&(chat_id, user_id)).is_some() {
            self.event_bus
                .publish_to_chat(
                    chat_id,
                    ChatEvent::UserTyping {
                        chat_id,
                        user_id,
                        is_typing: false,
                    },
                )
                .await;
        }
    }

    /// Expire typing indicators whose client never sent typing_stop.
    pub async fn cleanup_typing(&self, max_age: Duration) {
        let cutoff = Utc::now() - max_age;
        let stale: Vec<(i64, i64)> = self
            .typing
            .iter()
            .filter(|e| *e.value() < cutoff)
            .map(|e| *e.key())
            .collect();
        for (chat_id, user_id) in stale {
            self.stop_typing(chat_id, user_id).await;
        }
    }

    /// Publish a presence change to every counterpart of the user's
    /// active chats, addressed per user so it reaches them on any
    /// connection without leaking presence to strangers.
    async fn broadcast_to_contacts(
        &self,
        user_id: i64,
        presence: &UserPresence,
    ) -> Result<(), Error> {
        let chats = self.chat_repo.list_for_user(user_id, true).await?;
        for chat in chats {
            let Some(contact_id) = chat.other_participant(user_id) else {
                continue;
            };
            self.event_bus
                .publish_to_user(
                    contact_id,
                    ChatEvent::ContactPresence {
                        user_id,
                        status: presence.status,
                        last_seen: presence.last_seen,
                    },
                )
                .await;
        }
        Ok(())
    }
}
