// src/repositories/mod.rs

pub mod postgres;

pub use postgres::{
    ChatRepo, ChatRepository, ChatReportRepo, ChatReportRepository, MessageRepo,
    MessageRepository, NewMessage, NewReport, PostgresUserDirectory, PresenceRepo,
    PresenceRepository, UserBlockRepo, UserBlockRepository,
};
