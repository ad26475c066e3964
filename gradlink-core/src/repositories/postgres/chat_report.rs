// src/repositories/postgres/chat_report.rs

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use gradlink_common::models::{ChatReport, ReportReason, ReportStatus};

use crate::Error;

/// Insert payload for `ChatReportRepo::create`.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: i64,
    pub reported_user_id: i64,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub reason: ReportReason,
    pub description: Option<String>,
}

#[async_trait::async_trait]
pub trait ChatReportRepo: Send + Sync {
    async fn create(&self, report: &NewReport) -> Result<ChatReport, Error>;
    async fn get(&self, report_id: i64) -> Result<Option<ChatReport>, Error>;
    /// Most recent report by `reporter_id` against `reported_user_id` at or
    /// after `since`, used for the re-report cooldown.
    async fn find_recent(
        &self,
        reporter_id: i64,
        reported_user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<ChatReport>, Error>;
    async fn update_status(
        &self,
        report_id: i64,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> Result<ChatReport, Error>;
    async fn list(
        &self,
        status: Option<ReportStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatReport>, i64), Error>;
    async fn count_by_status(&self, status: Option<ReportStatus>) -> Result<i64, Error>;
    async fn recent(&self, limit: u32) -> Result<Vec<ChatReport>, Error>;
}

pub struct ChatReportRepository {
    pub pool: Pool<Postgres>,
}

impl ChatReportRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn from_row(r: &sqlx::postgres::PgRow) -> Result<ChatReport, Error> {
        Ok(ChatReport {
            report_id: r.try_get("report_id")?,
            reporter_id: r.try_get("reporter_id")?,
            reported_user_id: r.try_get("reported_user_id")?,
            chat_id: r.try_get("chat_id")?,
            message_id: r.try_get("message_id")?,
            reason: ReportReason::from_str(&r.try_get::<String, _>("reason")?)?,
            description: r.try_get("description")?,
            status: ReportStatus::from_str(&r.try_get::<String, _>("status")?)?,
            admin_notes: r.try_get("admin_notes")?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: r.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait::async_trait]
impl ChatReportRepo for ChatReportRepository {
    async fn create(&self, report: &NewReport) -> Result<ChatReport, Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO chat_reports (
                reporter_id, reported_user_id, chat_id, message_id,
                reason, description
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(report.reporter_id)
        .bind(report.reported_user_id)
        .bind(report.chat_id)
        .bind(report.message_id)
        .bind(report.reason.as_str())
        .bind(&report.description)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn get(&self, report_id: i64) -> Result<Option<ChatReport>, Error> {
        let row = sqlx::query("SELECT * FROM chat_reports WHERE report_id = $1")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_recent(
        &self,
        reporter_id: i64,
        reported_user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<ChatReport>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM chat_reports
            WHERE reporter_id = $1
              AND reported_user_id = $2
              AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(reporter_id)
        .bind(reported_user_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn update_status(
        &self,
        report_id: i64,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> Result<ChatReport, Error> {
        let row = sqlx::query(
            r#"
            UPDATE chat_reports
            SET status = $2,
                admin_notes = COALESCE($3, admin_notes),
                updated_at = now()
            WHERE report_id = $1
            RETURNING *
            "#,
        )
        .bind(report_id)
        .bind(status.as_str())
        .bind(admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Self::from_row(&r),
            None => Err(Error::NotFound("Report not found".into())),
        }
    }

    async fn list(
        &self,
        status: Option<ReportStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatReport>, i64), Error> {
        let status_filter = status.map(|s| s.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT * FROM chat_reports
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&status_filter)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_reports WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(&status_filter)
        .fetch_one(&self.pool)
        .await?;

        let reports = rows.iter().map(Self::from_row).collect::<Result<_, _>>()?;
        Ok((reports, total))
    }

    async fn count_by_status(&self, status: Option<ReportStatus>) -> Result<i64, Error> {
        let status_filter = status.map(|s| s.as_str().to_string());
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_reports WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(&status_filter)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ChatReport>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM chat_reports
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}
