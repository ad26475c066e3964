// gradlink-core/src/http/chat.rs

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use gradlink_common::models::{MessageKind, MessageStatus, PresenceStatus};
use gradlink_common::Error;

use crate::http::{success, ApiError, ApiResult, AppState, AuthedUser};
use crate::services::{LimitKind, SendMessage};

#[derive(Deserialize)]
pub struct CreateConversation {
    pub user_id: i64,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Json(body): Json<CreateConversation>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.messages.get_or_create_chat(me, body.user_id).await?;
    Ok(success(chat))
}

pub async fn conversations(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    let chats = state.messages.chat_list(me).await?;
    Ok(success(chats))
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

pub async fn messages(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .messages
        .list_page(chat_id, me, params.page, params.page_size)
        .await?;
    Ok(success(page))
}

#[derive(Deserialize)]
pub struct SendBody {
    pub content: String,
    pub reply_to_message_id: Option<i64>,
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
    Json(body): Json<SendBody>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(me, LimitKind::Message).require("messages")?;
    let view = state
        .messages
        .send(
            chat_id,
            me,
            SendMessage {
                content: Some(body.content),
                kind: None,
                attachment: None,
                reply_to_message_id: body.reply_to_message_id,
            },
        )
        .await?;
    Ok(success(view))
}

pub async fn send_attachment(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(me, LimitKind::Upload).require("uploads")?;

    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut caption: Option<String> = None;
    let mut reply_to: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(Error::Validation(format!("bad multipart body: {}", e))))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError(Error::Validation(format!("bad upload: {}", e))))?;
                file = Some((name, mime, bytes.to_vec()));
            }
            "caption" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError(Error::Validation(format!("bad caption: {}", e))))?;
                if !text.trim().is_empty() {
                    caption = Some(text);
                }
            }
            "reply_to_message_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError(Error::Validation(format!("bad field: {}", e))))?;
                reply_to = text.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    let (name, mime, bytes) =
        file.ok_or_else(|| ApiError(Error::Validation("file field is required".into())))?;
    let view = state
        .messages
        .send_attachment(chat_id, me, &name, &mime, bytes, caption, reply_to)
        .await?;
    Ok(success(view))
}

#[derive(Deserialize)]
pub struct AttachmentParams {
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

pub async fn attachments(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
    Query(params): Query<AttachmentParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .messages
        .attachments(chat_id, me, params.kind, params.page, params.page_size)
        .await?;
    Ok(success(page))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

pub async fn search(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .messages
        .search(chat_id, me, &params.q, params.page, params.page_size)
        .await?;
    Ok(success(page))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(chat_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let message_ids = state.status.mark_read(chat_id, me).await?;
    Ok(success(json!({ "marked_read": message_ids.len() })))
}

#[derive(Deserialize)]
pub struct EditBody {
    pub content: String,
}

pub async fn edit_message(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(message_id): Path<i64>,
    Json(body): Json<EditBody>,
) -> ApiResult<impl IntoResponse> {
    let view = state.messages.edit(message_id, me, &body.content).await?;
    Ok(success(view))
}

pub async fn delete_message(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(message_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.messages.soft_delete(message_id, me).await?;
    Ok(success(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: MessageStatus,
}

/// Receiver-driven acknowledgement for a single message. Transitions that
/// would move the status backwards are reported as not advanced.
pub async fn update_message_status(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(message_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> ApiResult<impl IntoResponse> {
    let advanced = state.status.update_status(message_id, me, body.status).await?;
    Ok(success(json!({ "advanced": advanced })))
}

pub async fn unread_counts(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    let summary = state.status.unread_summary(me).await?;
    Ok(success(summary))
}

pub async fn stats(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    let stats = state.messages.stats(me).await?;
    Ok(success(stats))
}

/// The requester's current usage against each sliding window.
pub async fn rate_limits(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.limiter.status(me)))
}

/// Presence is contact-scoped: visible to the user themselves and to
/// anyone who shares a chat with them.
pub async fn presence_of(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if user_id != me
        && state
            .chat_repo
            .find_by_participants(me, user_id)
            .await?
            .is_none()
    {
        return Err(ApiError(Error::NotFound("User not found".into())));
    }
    let presence = state
        .presence
        .get_presence(user_id)
        .await?
        .ok_or_else(|| ApiError(Error::NotFound("User not found".into())))?;
    Ok(success(presence))
}

pub async fn online_users(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
) -> ApiResult<impl IntoResponse> {
    state.moderation.ensure_moderator(me).await?;
    let online = state.presence.online_users().await?;
    let stats = state.presence.stats().await?;
    Ok(success(json!({ "online": online, "stats": stats })))
}

#[derive(Deserialize)]
pub struct PresenceBody {
    pub status: PresenceStatus,
}

pub async fn update_presence(
    State(state): State<AppState>,
    AuthedUser(me): AuthedUser,
    Json(body): Json<PresenceBody>,
) -> ApiResult<impl IntoResponse> {
    state.presence.set_status(me, body.status).await?;
    Ok(success(json!({ "status": body.status })))
}
