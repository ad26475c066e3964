// File: gradlink-core/tests/common/mod.rs

use std::sync::Arc;

use gradlink_common::models::Attachment;
use gradlink_common::traits::{
    MockNotificationSink, MockObjectStore, NotificationSink, ObjectStore, UserDirectory,
};
use gradlink_core::eventbus::EventBus;
use gradlink_core::repositories::postgres::{
    ChatReportRepository, ChatRepository, MessageRepository, PostgresUserDirectory,
    PresenceRepository, UserBlockRepository,
};
use gradlink_core::services::{
    MessageService, ModerationService, PresenceService, StatusService,
};
use gradlink_core::test_utils::helpers::{clean_database, create_test_db_pool};
use gradlink_core::{Database, Error};

/// Fully wired service stack over a clean test database.
pub struct TestCtx {
    pub db: Database,
    pub event_bus: Arc<EventBus>,
    pub chat_repo: Arc<ChatRepository>,
    pub message_repo: Arc<MessageRepository>,
    pub messages: Arc<MessageService>,
    pub status: Arc<StatusService>,
    pub presence: Arc<PresenceService>,
    pub moderation: Arc<ModerationService>,
}

/// Builds the stack with a no-op notification sink and an object store that
/// fabricates URLs without touching disk.
pub async fn setup() -> Result<TestCtx, Error> {
    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool.clone());
    db.migrate().await?;
    clean_database(db.pool()).await?;

    let event_bus = Arc::new(EventBus::new());
    let chat_repo = Arc::new(ChatRepository::new(pool.clone()));
    let message_repo = Arc::new(MessageRepository::new(pool.clone()));
    let presence_repo = Arc::new(PresenceRepository::new(pool.clone()));
    let block_repo = Arc::new(UserBlockRepository::new(pool.clone()));
    let report_repo = Arc::new(ChatReportRepository::new(pool.clone()));
    let directory: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(pool));

    let notifier: Arc<dyn NotificationSink> = {
        let mut mock = MockNotificationSink::new();
        mock.expect_notify().returning(|_, _, _, _| Ok(()));
        Arc::new(mock)
    };
    let object_store: Arc<dyn ObjectStore> = {
        let mut mock = MockObjectStore::new();
        mock.expect_store().returning(|name, mime, bytes| {
            Ok(Attachment {
                url: format!("/uploads/test-{}", name),
                original_name: name.to_string(),
                byte_size: bytes.len() as i64,
                mime_type: mime.to_string(),
            })
        });
        Arc::new(mock)
    };

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
        message_repo.clone(),
        chat_repo.clone(),
        status.clone(),
        presence.clone(),
        moderation.clone(),
        directory,
        notifier,
        object_store,
        event_bus.clone(),
    ));

    Ok(TestCtx {
        db,
        event_bus,
        chat_repo,
        message_repo,
        messages,
        status,
        presence,
        moderation,
    })
}
