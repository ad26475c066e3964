// gradlink-core/src/services/moderation_service.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use gradlink_common::models::{
    ChatReport, ModerationDashboard, ReportReason, ReportStatus, ReportView, UserBlock,
};
use gradlink_common::traits::{NotificationSink, UserDirectory};

use crate::eventbus::{ChatEvent, EventBus};
use crate::repositories::postgres::{
    ChatRepo, ChatReportRepo, NewReport, UserBlockRepo,
};
use crate::Error;

/// Cooldown before the same reporter can re-report the same user.
const REPORT_COOLDOWN_HOURS: i64 = 24;

/// Blocks and reports. Blocking is symmetric for messaging purposes (a
/// block in either direction stops both sides) but only the blocker can
/// lift their own block.
pub struct ModerationService {
    block_repo: Arc<dyn UserBlockRepo>,
    report_repo: Arc<dyn ChatReportRepo>,
    chat_repo: Arc<dyn ChatRepo>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationSink>,
    event_bus: Arc<EventBus>,
}

impl ModerationService {
    pub fn new(
        block_repo: Arc<dyn UserBlockRepo>,
        report_repo: Arc<dyn ChatReportRepo>,
        chat_repo: Arc<dyn ChatRepo>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSink>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            block_repo,
            report_repo,
            chat_repo,
            directory,
            notifier,
            event_bus,
        }
    }

    pub async fn block(
        &self,
        blocker_id: i64,
        blocked_id: i64,
        reason: Option<&str>,
    ) -> Result<UserBlock, Error> {
        if blocker_id == blocked_id {
            return Err(Error::Validation("cannot block yourself".into()));
        }
        if self.directory.get_user(blocked_id).await?.is_none() {
            return Err(Error::NotFound("User not found".into()));
        }
        if self.block_repo.find(blocker_id, blocked_id).await?.is_some() {
            return Err(Error::Conflict("user is already blocked".into()));
        }

        let block = self.block_repo.create(blocker_id, blocked_id, reason).await?;
        self.chat_repo
            .set_active_between(blocker_id, blocked_id, false)
            .await?;
        info!("user {} blocked user {}", blocker_id, blocked_id);
        Ok(block)
    }

    pub async fn unblock(&self, blocker_id: i64, blocked_id: i64) -> Result<(), Error> {
        let removed = self.block_repo.delete(blocker_id, blocked_id).await?;
        if !removed {
            return Err(Error::NotFound("Block not found".into()));
        }
        // The chat stays inactive while a block in the other direction
        // remains.
        if !self.block_repo.exists_between(blocker_id, blocked_id).await? {
            self.chat_repo
                .set_active_between(blocker_id, blocked_id, true)
                .await?;
        }
        info!("user {} unblocked user {}", blocker_id, blocked_id);
        Ok(())
    }

    /// True if a block exists in either direction.
    pub async fn is_blocked(&self, user_a: i64, user_b: i64) -> Result<bool, Error> {
        self.block_repo.exists_between(user_a, user_b).await
    }

    pub async fn blocked_users(&self, blocker_id: i64) -> Result<Vec<UserBlock>, Error> {
        self.block_repo.list_for_blocker(blocker_id).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn report(
        &self,
        reporter_id: i64,
        reported_user_id: i64,
        chat_id: Option<i64>,
        message_id: Option<i64>,
        reason: ReportReason,
        description: Option<String>,
    ) -> Result<ChatReport, Error> {
        if reporter_id == reported_user_id {
            return Err(Error::Validation("cannot report yourself".into()));
        }
        if self.directory.get_user(reported_user_id).await?.is_none() {
            return Err(Error::NotFound("User not found".into()));
        }

        let cooldown = Duration::hours(REPORT_COOLDOWN_HOURS);
        let since = Utc::now() - cooldown;
        if let Some(prev) = self
            .report_repo
            .find_recent(reporter_id, reported_user_id, since)
            .await?
        {
            let retry_after = (prev.created_at + cooldown) - Utc::now();
            return Err(Error::RateLimited {
                message: "you already reported this user recently".into(),
                retry_after_secs: retry_after.num_seconds().max(0),
            });
        }

        let report = self
            .report_repo
            .create(&NewReport {
                reporter_id,
                reported_user_id,
                chat_id,
                message_id,
                reason,
                description,
            })
            .await?;
        info!(
            "user {} reported user {} ({})",
            reporter_id,
            reported_user_id,
            reason.as_str()
        );

        // Moderator notification is best effort; the report row is the
        // source of truth.
        for moderator in self.directory.list_moderators().await? {
            if let Err(e) = self
                .notifier
                .notify(
                    moderator.user_id,
                    reporter_id,
                    "chat_report",
                    &format!("new report: {}", reason.as_str()),
                )
                .await
            {
                warn!("failed to notify moderator {}: {:?}", moderator.user_id, e);
            }
        }

        Ok(report)
    }

    /// Reject non-admin actors. Shared by the moderation endpoints.
    pub async fn ensure_moderator(&self, actor_id: i64) -> Result<(), Error> {
        let actor = self
            .directory
            .get_user(actor_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))?;
        if !actor.user_type.is_moderator() {
            return Err(Error::Forbidden("moderator access required".into()));
        }
        Ok(())
    }

    pub async fn update_report_status(
        &self,
        actor_id: i64,
        report_id: i64,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> Result<ChatReport, Error> {
        self.ensure_moderator(actor_id).await?;

        let report = self
            .report_repo
            .update_status(report_id, status, admin_notes)
            .await?;

        if status == ReportStatus::Resolved {
            self.event_bus
                .publish_to_user(
                    report.reporter_id,
                    ChatEvent::ReportResolved {
                        report: report.clone(),
                    },
                )
                .await;
            if let Err(e) = self
                .notifier
                .notify(
                    report.reporter_id,
                    actor_id,
                    "report_resolved",
                    "your report was reviewed and resolved",
                )
                .await
            {
                warn!(
                    "failed to notify reporter {}: {:?}",
                    report.reporter_id, e
                );
            }
        }

        Ok(report)
    }

    pub async fn reports(
        &self,
        status: Option<ReportStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatReport>, i64), Error> {
        self.report_repo.list(status, limit, offset).await
    }

    pub async fn dashboard(&self) -> Result<ModerationDashboard, Error> {
        let total = self.report_repo.count_by_status(None).await?;
        let pending = self
            .report_repo
            .count_by_status(Some(ReportStatus::Pending))
            .await?;
        let resolved = self
            .report_repo
            .count_by_status(Some(ReportStatus::Resolved))
            .await?;
        let dismissed = self
            .report_repo
            .count_by_status(Some(ReportStatus::Dismissed))
            .await?;
        let total_blocks = self.block_repo.count().await?;

        let mut recent_reports = Vec::new();
        for report in self.report_repo.recent(10).await? {
            if let Some(view) = self.hydrate_report(report).await? {
                recent_reports.push(view);
            }
        }

        Ok(ModerationDashboard {
            total_reports: total,
            pending_reports: pending,
            resolved_reports: resolved,
            dismissed_reports: dismissed,
            total_blocks,
            recent_reports,
        })
    }

    /// Attach reporter/target identities. A report whose users were since
    /// removed from the directory is skipped rather than failing the view.
    pub async fn hydrate_report(&self, report: ChatReport) -> Result<Option<ReportView>, Error> {
        let Some(reporter) = self.directory.get_user(report.reporter_id).await? else {
            return Ok(None);
        };
        let Some(reported_user) = self.directory.get_user(report.reported_user_id).await? else {
            return Ok(None);
        };
        Ok(Some(ReportView {
            report,
            reporter,
            reported_user,
        }))
    }
}
