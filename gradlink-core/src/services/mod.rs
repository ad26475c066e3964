// gradlink-core/src/services/mod.rs

pub mod message_service;
pub mod moderation_service;
pub mod presence_service;
pub mod rate_limit;
pub mod status_service;

pub use message_service::{MessagePage, MessageService, MessageStats, SendMessage};
pub use moderation_service::ModerationService;
pub use presence_service::PresenceService;
pub use rate_limit::{Decision, LimitKind, LimitStatus, RateLimitService};
pub use status_service::StatusService;
