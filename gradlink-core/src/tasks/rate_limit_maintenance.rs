// gradlink-core/src/tasks/rate_limit_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::services::rate_limit::RateLimitService;

/// Spawns a background task that periodically drops expired rate-limit
/// windows so idle users do not accumulate state.
pub fn spawn_rate_limit_sweep(
    limiter: Arc<RateLimitService>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            limiter.cleanup_expired();
        }
    })
}
