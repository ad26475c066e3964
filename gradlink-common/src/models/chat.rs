use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::User;
use crate::Error;

/// Content a soft-deleted message is replaced with.
pub const TOMBSTONE: &str = "[message deleted]";

/// Persistent 1:1 conversation container between two users.
///
/// The participant pair is order-normalized (`user1_id < user2_id`) so an
/// unordered pair maps to exactly one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub last_message_id: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub user1_unread_count: i32,
    pub user2_unread_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The counterpart of `user_id`, if they are a participant at all.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }

    pub fn unread_for(&self, user_id: i64) -> i32 {
        if self.user1_id == user_id {
            self.user1_unread_count
        } else {
            self.user2_unread_count
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
            MessageKind::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "file" => Ok(MessageKind::File),
            "system" => Ok(MessageKind::System),
            other => Err(Error::Parse(format!("Unknown message kind: {}", other))),
        }
    }
}

/// Delivery status of a message. Transitions are forward-only:
/// `Sent -> Delivered -> Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(Error::Parse(format!("Unknown message status: {}", other))),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }

    /// Whether moving to `next` is a forward transition.
    pub fn can_advance_to(&self, next: MessageStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// Descriptor of an uploaded file, as returned by the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub original_name: String,
    pub byte_size: i64,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reply_to_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a reply target embedded in a hydrated message. Kept resolvable
/// even when the target was soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplySnapshot {
    pub message_id: i64,
    pub content: Option<String>,
    pub sender: User,
    pub kind: MessageKind,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Fully-hydrated message: sender/receiver identities plus the reply snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: User,
    pub receiver: User,
    pub reply_to: Option<ReplySnapshot>,
}

/// One row of the chat-list response, shaped around the counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub other_user: User,
    pub last_message: Option<Message>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-chat unread counts for one user, plus the sum across chats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnreadSummary {
    pub by_chat: HashMap<i64, i32>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_forward_only() {
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Delivered));
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Read));
        assert!(MessageStatus::Delivered.can_advance_to(MessageStatus::Read));

        assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Sent));
        assert!(!MessageStatus::Delivered.can_advance_to(MessageStatus::Sent));
        assert!(!MessageStatus::Sent.can_advance_to(MessageStatus::Sent));
    }

    #[test]
    fn chat_counterpart_lookup() {
        let chat = Chat {
            chat_id: 1,
            user1_id: 10,
            user2_id: 20,
            last_message_id: None,
            last_message_at: None,
            user1_unread_count: 3,
            user2_unread_count: 0,
            is_active: true,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(chat.other_participant(10), Some(20));
        assert_eq!(chat.other_participant(20), Some(10));
        assert_eq!(chat.other_participant(30), None);
        assert_eq!(chat.unread_for(10), 3);
        assert_eq!(chat.unread_for(20), 0);
    }
}
