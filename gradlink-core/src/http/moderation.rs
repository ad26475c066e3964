// gradlink-core/src/http/moderation.rs

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use gradlink_common::models::{ReportReason, ReportStatus};

use crate::http::{success, ApiResult, AppState, AuthedUser};

#[derive(Deserialize)]
pub struct BlockBody {
    pub user_id: i64,
    pub reason: Option<String>,
}

pub async fn block(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Json(body): Json<BlockBody>,
) -> ApiResult<impl IntoResponse> {
    let block = state
        .moderation
        .block(me, body.user_id, body.reason.as_deref())
        .await?;
    Ok(success(block))
}

pub async fn unblock(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.moderation.unblock(me, user_id).await?;
    Ok(success(json!({ "unblocked": true })))
}

pub async fn blocked(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    let blocks = state.moderation.blocked_users(me).await?;
    Ok(success(blocks))
}

#[derive(Deserialize)]
pub struct ReportBody {
    pub user_id: i64,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub reason: ReportReason,
    pub description: Option<String>,
}

pub async fn report(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Json(body): Json<ReportBody>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .moderation
        .report(
            me,
            body.user_id,
            body.chat_id,
            body.message_id,
            body.reason,
            body.description,
        )
        .await?;
    Ok(success(report))
}

pub async fn dashboard(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    state.moderation.ensure_moderator(me).await?;
    let dashboard = state.moderation.dashboard().await?;
    Ok(success(dashboard))
}

#[derive(Deserialize)]
pub struct ReportListParams {
    pub status: Option<ReportStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

pub async fn reports(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Query(params): Query<ReportListParams>,
) -> ApiResult<impl IntoResponse> {
    state.moderation.ensure_moderator(me).await?;
    let (reports, total) = state
        .moderation
        .reports(params.status, params.limit.min(100), params.offset)
        .await?;
    let mut views = Vec::with_capacity(reports.len());
    for report in reports {
        if let Some(view) = state.moderation.hydrate_report(report).await? {
            views.push(view);
        }
    }
    Ok(success(json!({ "reports": views, "total": total })))
}

#[derive(Deserialize)]
pub struct UpdateReportBody {
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
}

pub async fn update_report(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(report_id): Path<i64>,
    Json(body): Json<UpdateReportBody>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .moderation
        .update_report_status(me, report_id, body.status, body.admin_notes.as_deref())
        .await?;
    Ok(success(report))
}
