//! Collaborator interfaces consumed by the messaging core. The portal proper
//! (registration, roles, posts, uploads, auth) lives behind these traits.

use async_trait::async_trait;
use mockall::automock;

use crate::models::chat::Attachment;
use crate::models::user::User;
use crate::Error;

/// Read-only view of the portal's user directory, used to hydrate
/// sender/receiver/reporter identities.
#[automock]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, Error>;

    /// Users who receive new-report notifications and may review reports.
    async fn list_moderators(&self) -> Result<Vec<User>, Error>;
}

/// Async notification dispatch for offline/unfocused receivers. Failures are
/// logged by callers and never surfaced; a failed notification must not roll
/// back a persisted message.
#[automock]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        receiver_id: i64,
        sender_id: i64,
        kind: &str,
        body: &str,
    ) -> Result<(), Error>;
}

/// Opaque media host for image/file message attachments.
#[automock]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn store(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, Error>;
}

/// Token verification, delegated to the portal's auth layer. Gates every
/// realtime connection and REST request.
#[automock]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<i64, Error>;
}
