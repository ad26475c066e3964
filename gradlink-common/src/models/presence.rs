use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
    Away,
    Busy,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
            PresenceStatus::Away => "away",
            PresenceStatus::Busy => "busy",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "online" => Ok(PresenceStatus::Online),
            "offline" => Ok(PresenceStatus::Offline),
            "away" => Ok(PresenceStatus::Away),
            "busy" => Ok(PresenceStatus::Busy),
            other => Err(Error::Parse(format!("Unknown presence status: {}", other))),
        }
    }
}

/// Persisted "last known status" row; one per user, reused across sessions.
/// The live connection map is authoritative for `is_online` checks, this row
/// may lag behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPresence {
    pub presence_id: i64,
    pub user_id: i64,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
    pub connection_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceStats {
    pub online: i64,
    pub offline: i64,
    pub away: i64,
    pub busy: i64,
    pub total: i64,
}
