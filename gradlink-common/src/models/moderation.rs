use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::User;
use crate::Error;

/// Ordered blocker -> blocked pair. Hard-deleted on unblock; blocking is not
/// historical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBlock {
    pub block_id: i64,
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Harassment,
    InappropriateContent,
    FakeProfile,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Harassment => "harassment",
            ReportReason::InappropriateContent => "inappropriate_content",
            ReportReason::FakeProfile => "fake_profile",
            ReportReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "spam" => Ok(ReportReason::Spam),
            "harassment" => Ok(ReportReason::Harassment),
            "inappropriate_content" => Ok(ReportReason::InappropriateContent),
            "fake_profile" => Ok(ReportReason::FakeProfile),
            "other" => Ok(ReportReason::Other),
            other => Err(Error::Parse(format!("Unknown report reason: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            other => Err(Error::Parse(format!("Unknown report status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReport {
    pub report_id: i64,
    pub reporter_id: i64,
    pub reported_user_id: i64,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub reason: ReportReason,
    pub description: Option<String>,
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report hydrated with reporter/target identities for moderator views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: ChatReport,
    pub reporter: User,
    pub reported_user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationDashboard {
    pub total_reports: i64,
    pub pending_reports: i64,
    pub resolved_reports: i64,
    pub dismissed_reports: i64,
    pub total_blocks: i64,
    pub recent_reports: Vec<ReportView>,
}
