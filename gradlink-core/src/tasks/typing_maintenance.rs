// gradlink-core/src/tasks/typing_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::services::presence_service::PresenceService;

/// Spawns a background task that expires typing indicators whose client
/// went away without sending typing_stop.
pub fn spawn_typing_sweep(
    presence: Arc<PresenceService>,
    interval: Duration,
    max_age: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            presence.cleanup_typing(max_age).await;
        }
    })
}
