//! src/eventbus/mod.rs
//!
//! In-process event bus with guaranteed delivery to multiple subscribers
//! via bounded MPSC queues. Realtime connections and background tasks
//! subscribe here; services publish here. Delivery is at-least-once per
//! subscriber, so a connection subscribed to both a user topic and a chat
//! topic may see the same event twice and must tolerate it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex};

use gradlink_common::models::{ChatReport, MessageView, PresenceStatus};

/// Addressing for published events. Connections join the topic for their
/// own user id at connect time, and chat topics explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Events addressed to one user, wherever they are connected.
    User(i64),
    /// Events addressed to everyone who joined a chat's room.
    Chat(i64),
}

/// Event names and payload shapes match the websocket wire protocol, so
/// the gateway can serialize an event straight onto a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message arrived for the recipient.
    NewMessage { message: MessageView },
    /// Acknowledgement to the sender that their message was stored.
    MessageSent { message: MessageView },
    MessageEdited { message: MessageView },
    MessageDeleted { chat_id: i64, message_id: i64 },
    /// The counterpart read messages in this chat.
    MessagesRead {
        chat_id: i64,
        reader_id: i64,
        message_ids: Vec<i64>,
    },
    /// The chat's last-message preview changed.
    ChatUpdated {
        chat_id: i64,
        last_message: MessageView,
    },
    ContactPresence {
        user_id: i64,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    },
    UserTyping {
        chat_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    /// One chat's unread counter changed for the addressed user.
    UnreadCountUpdated { chat_id: i64, unread_count: i32 },
    /// Full unread snapshot, sent at connect time.
    UnreadCounts {
        by_chat: HashMap<i64, i32>,
        total: i64,
    },
    /// A report was resolved; addressed to the reporter.
    ReportResolved { report: ChatReport },
    /// Recoverable command failure, sent on the offending connection only.
    Error { message: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::NewMessage { .. } => "new_message",
            ChatEvent::MessageSent { .. } => "message_sent",
            ChatEvent::MessageEdited { .. } => "message_edited",
            ChatEvent::MessageDeleted { .. } => "message_deleted",
            ChatEvent::MessagesRead { .. } => "messages_read",
            ChatEvent::ChatUpdated { .. } => "chat_updated",
            ChatEvent::ContactPresence { .. } => "contact_presence",
            ChatEvent::UserTyping { .. } => "user_typing",
            ChatEvent::UnreadCountUpdated { .. } => "unread_count_updated",
            ChatEvent::UnreadCounts { .. } => "unread_counts",
            ChatEvent::ReportResolved { .. } => "report_resolved",
            ChatEvent::Error { .. } => "error",
        }
    }
}

/// A published event together with the topic it was addressed to.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: Topic,
    pub event: ChatEvent,
}

/// Each subscriber gets its own `mpsc::Sender<Envelope>` for guaranteed
/// delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, the channel is closed
///   and that sender is skipped.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Envelope>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which envelopes will be delivered. Topic
    /// filtering happens subscriber-side; the bus fans out everything.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<Envelope> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an envelope to all subscribers.
    pub async fn publish(&self, envelope: Envelope) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        for s in senders {
            let _ = s.send(envelope.clone()).await;
        }
    }

    pub async fn publish_to_user(&self, user_id: i64, event: ChatEvent) {
        self.publish(Envelope {
            topic: Topic::User(user_id),
            event,
        })
        .await;
    }

    pub async fn publish_to_chat(&self, chat_id: i64, event: ChatEvent) {
        self.publish(Envelope {
            topic: Topic::Chat(chat_id),
            event,
        })
        .await;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
