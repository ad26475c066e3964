// gradlink-server/src/context.rs

use std::sync::Arc;
use std::time::Duration;

use gradlink_common::traits::{NotificationSink, ObjectStore, TokenVerifier, UserDirectory};
use gradlink_core::eventbus::EventBus;
use gradlink_core::http::AppState;
use gradlink_core::repositories::postgres::{
    ChatReportRepository, ChatRepository, MessageRepository, PostgresUserDirectory,
    PresenceRepository, UserBlockRepository,
};
use gradlink_core::services::{
    MessageService, ModerationService, PresenceService, RateLimitService, StatusService,
};
use gradlink_core::tasks;
use gradlink_core::Database;

/// Everything the server wires together at startup.
pub struct ServerContext {
    pub state: AppState,
    pub event_bus: Arc<EventBus>,
}

impl ServerContext {
    pub fn new(
        db: &Database,
        verifier: Arc<dyn TokenVerifier>,
        notifier: Arc<dyn NotificationSink>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let pool = db.pool().clone();
        let event_bus = Arc::new(EventBus::new());

        let chat_repo = Arc::new(ChatRepository::new(pool.clone()));
        let message_repo = Arc::new(MessageRepository::new(pool.clone()));
        let presence_repo = Arc::new(PresenceRepository::new(pool.clone()));
        let block_repo = Arc::new(UserBlockRepository::new(pool.clone()));
        let report_repo = Arc::new(ChatReportRepository::new(pool.clone()));
        let directory: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(pool));

        let limiter = Arc::new(RateLimitService::new());
        let status = Arc::new(StatusService::new(
            message_repo.clone(),
            chat_repo.clone(),
            event_bus.clone(),
        ));
        let presence = Arc::new(PresenceService::new(
            presence_repo,
            chat_repo.clone(),
            event_bus.clone(),
        ));
        let moderation = Arc::new(ModerationService::new(
            block_repo,
            report_repo,
            chat_repo.clone(),
            directory.clone(),
            notifier.clone(),
            event_bus.clone(),
        ));
        let messages = Arc::new(MessageService::new(
            message_repo,
            chat_repo.clone(),
            status.clone(),
            presence.clone(),
            moderation.clone(),
            directory,
            notifier,
            object_store,
            event_bus.clone(),
        ));

        let state = AppState {
            messages,
            status,
            presence,
            moderation,
            limiter,
            chat_repo,
            verifier,
            event_bus: event_bus.clone(),
        };

        Self { state, event_bus }
    }

    /// Spawn the periodic maintenance tasks.
    pub fn spawn_tasks(&self) {
        tasks::spawn_rate_limit_sweep(self.state.limiter.clone(), Duration::from_secs(60));
        tasks::spawn_typing_sweep(
            self.state.presence.clone(),
            Duration::from_secs(10),
            chrono::Duration::seconds(10),
        );
    }
}
