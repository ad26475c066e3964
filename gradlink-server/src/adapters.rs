// gradlink-server/src/adapters.rs
//
// Default collaborator implementations for standalone deployments. A portal
// deployment replaces these with clients for its own auth, notification and
// media services.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use gradlink_common::models::Attachment;
use gradlink_common::traits::{NotificationSink, ObjectStore, TokenVerifier};
use gradlink_common::Error;

/// Logs notifications instead of dispatching them.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(
        &self,
        receiver_id: i64,
        sender_id: i64,
        kind: &str,
        body: &str,
    ) -> Result<(), Error> {
        info!(
            "notification [{}] {} -> {}: {}",
            kind, sender_id, receiver_id, body
        );
        Ok(())
    }
}

/// Development-only verifier: the token is the user id in plain text.
pub struct DevTokenVerifier;

#[async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<i64, Error> {
        token
            .parse::<i64>()
            .map_err(|_| Error::Auth("invalid token".into()))
    }
}

/// Stores uploads on the local filesystem under `base_dir`, served at
/// `/uploads/<name>`.
pub struct DiskObjectStore {
    base_dir: PathBuf,
}

impl DiskObjectStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn store(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, Error> {
        let byte_size = bytes.len() as i64;
        // Flatten the client-provided name so it cannot traverse paths.
        let safe_name: String = original_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let stored_name = format!("{}-{}", Uuid::new_v4(), safe_name);

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| Error::Upstream(format!("object store unavailable: {}", e)))?;
        tokio::fs::write(self.base_dir.join(&stored_name), bytes)
            .await
            .map_err(|e| Error::Upstream(format!("object store write failed: {}", e)))?;

        Ok(Attachment {
            url: format!("/uploads/{}", stored_name),
            original_name: original_name.to_string(),
            byte_size,
            mime_type: mime_type.to_string(),
        })
    }
}
