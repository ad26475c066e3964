use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Graduate,
    Staff,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Graduate => "graduate",
            UserType::Staff => "staff",
            UserType::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "graduate" => Ok(UserType::Graduate),
            "staff" => Ok(UserType::Staff),
            "admin" => Ok(UserType::Admin),
            other => Err(Error::Parse(format!("Unknown user type: {}", other))),
        }
    }

    /// Moderation endpoints are restricted to admins.
    pub fn is_moderator(&self) -> bool {
        matches!(self, UserType::Admin)
    }
}

/// Directory snapshot of a portal user, as the messaging core sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub display_name: String,
    pub user_type: UserType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Stand-in identity for a user id the directory no longer resolves.
    pub fn placeholder(user_id: i64) -> Self {
        Self {
            user_id,
            display_name: "Former member".to_string(),
            user_type: UserType::Graduate,
            is_active: false,
            created_at: Utc::now(),
        }
    }
}
