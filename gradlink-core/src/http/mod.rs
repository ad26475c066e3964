//! src/http/mod.rs
//!
//! REST surface plus the websocket upgrade route. Everything except the
//! upgrade itself authenticates with `Authorization: Bearer <token>`,
//! resolved to a user id by the portal's `TokenVerifier`.

pub mod chat;
pub mod moderation;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use gradlink_common::traits::TokenVerifier;
use gradlink_common::Error;

use crate::eventbus::EventBus;
use crate::gateway;
use crate::repositories::postgres::ChatRepo;
use crate::services::{
    MessageService, ModerationService, PresenceService, RateLimitService, StatusService,
};

#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<MessageService>,
    pub status: Arc<StatusService>,
    pub presence: Arc<PresenceService>,
    pub moderation: Arc<ModerationService>,
    pub limiter: Arc<RateLimitService>,
    pub chat_repo: Arc<dyn ChatRepo>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub event_bus: Arc<EventBus>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(gateway::ws_handler))
        .route("/chat/conversation", post(chat::create_conversation))
        .route("/chat/conversations", get(chat::conversations))
        .route(
            "/chat/{chat_id}/messages",
            get(chat::messages).post(chat::send_message),
        )
        .route(
            "/chat/{chat_id}/messages/attachment",
            post(chat::send_attachment),
        )
        .route("/chat/{chat_id}/attachments", get(chat::attachments))
        .route("/chat/{chat_id}/search", get(chat::search))
        .route("/chat/{chat_id}/read", put(chat::mark_read))
        .route(
            "/chat/messages/{message_id}",
            put(chat::edit_message).delete(chat::delete_message),
        )
        .route(
            "/chat/messages/{message_id}/status",
            put(chat::update_message_status),
        )
        .route("/chat/unread-counts", get(chat::unread_counts))
        .route("/chat/stats", get(chat::stats))
        .route("/chat/rate-limits", get(chat::rate_limits))
        .route("/chat/presence", put(chat::update_presence))
        .route("/chat/presence/{user_id}", get(chat::presence_of))
        .route("/chat/online-users", get(chat::online_users))
        .route("/chat/block", post(moderation::block))
        .route("/chat/block/{user_id}", delete(moderation::unblock))
        .route("/chat/blocked", get(moderation::blocked))
        .route("/chat/report", post(moderation::report))
        .route(
            "/chat/moderation/dashboard",
            get(moderation::dashboard),
        )
        .route("/chat/moderation/reports", get(moderation::reports))
        .route(
            "/chat/moderation/reports/{report_id}",
            put(moderation::update_report),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Static file serving for locally stored attachments. Merged into the app
/// by deployments that use the disk-backed object store; the stored URLs
/// (`/uploads/<name>`) resolve against this.
pub fn static_uploads(dir: impl AsRef<std::path::Path>) -> Router {
    Router::new().nest_service("/uploads", ServeDir::new(dir))
}

/// Uniform success body.
pub fn success<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "status": "success", "data": data }))
}

/// `Error` -> HTTP response adapter.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self.0 {
            Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone(), None),
            Error::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone(), None),
            Error::Validation(m) | Error::Parse(m) => {
                (StatusCode::BAD_REQUEST, m.clone(), None)
            }
            Error::Conflict(m) => (StatusCode::CONFLICT, m.clone(), None),
            Error::RateLimited {
                message,
                retry_after_secs,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                message.clone(),
                Some(*retry_after_secs),
            ),
            Error::Auth(m) => (StatusCode::UNAUTHORIZED, m.clone(), None),
            Error::Upstream(m) => (StatusCode::BAD_GATEWAY, m.clone(), None),
            other => {
                error!("internal error serving request: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({ "status": "error", "message": message });
        if let Some(secs) = retry_after {
            body["retry_after_secs"] = json!(secs);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The requester, resolved from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub i64);

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError(Error::Auth("missing bearer token".into())))?;

        let user_id = state.verifier.verify(token).await?;
        Ok(AuthedUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn stored_uploads_are_served_back() {
        let dir = std::env::temp_dir().join(format!("gradlink-uploads-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(dir.join("reunion.jpg"), b"jpeg bytes").expect("write upload");

        let app = static_uploads(&dir);
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/uploads/reunion.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/uploads/missing.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&dir).ok();
    }
}
