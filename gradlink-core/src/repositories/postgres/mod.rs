// src/repositories/postgres/mod.rs

pub mod chat;
pub mod chat_report;
pub mod message;
pub mod presence;
pub mod user;
pub mod user_block;

pub use chat::{ChatRepo, ChatRepository};
pub use chat_report::{ChatReportRepo, ChatReportRepository, NewReport};
pub use message::{MessageRepo, MessageRepository, NewMessage};
pub use presence::{PresenceRepo, PresenceRepository};
pub use user::PostgresUserDirectory;
pub use user_block::{UserBlockRepo, UserBlockRepository};
