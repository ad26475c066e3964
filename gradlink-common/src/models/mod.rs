// File: gradlink-common/src/models/mod.rs
pub mod chat;
pub mod moderation;
pub mod presence;
pub mod user;

pub use chat::{
    Attachment, Chat, ChatSummary, Message, MessageKind, MessageStatus, MessageView,
    ReplySnapshot, UnreadSummary, TOMBSTONE,
};
pub use moderation::{
    ChatReport, ModerationDashboard, ReportReason, ReportStatus, ReportView, UserBlock,
};
pub use presence::{PresenceStats, PresenceStatus, UserPresence};
pub use user::{User, UserType};
