// tests/presence_tests.rs
//
// Presence lifecycle: handle-guarded offline, contact-scoped fan-out,
// typing indicators.

mod common;

use gradlink_common::models::{PresenceStatus, UserType};
use gradlink_core::eventbus::{ChatEvent, Topic};
use gradlink_core::test_utils::helpers::seed_user;
use gradlink_core::Error;

use common::setup;

#[tokio::test]
async fn online_offline_roundtrip() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;

    assert!(!ctx.presence.is_online(a.user_id));
    let handle = ctx.presence.set_online(a.user_id).await?;
    assert!(ctx.presence.is_online(a.user_id));
    assert_eq!(ctx.presence.connection_of(a.user_id), Some(handle));

    let row = ctx
        .presence
        .get_presence(a.user_id)
        .await?
        .expect("presence row expected");
    assert_eq!(row.status, PresenceStatus::Online);
    assert_eq!(row.connection_id, Some(handle));

    ctx.presence.set_offline(a.user_id, handle).await?;
    assert!(!ctx.presence.is_online(a.user_id));
    let row = ctx
        .presence
        .get_presence(a.user_id)
        .await?
        .expect("presence row expected");
    assert_eq!(row.status, PresenceStatus::Offline);
    Ok(())
}

#[tokio::test]
async fn stale_disconnect_cannot_clobber_reconnect() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;

    let old_handle = ctx.presence.set_online(a.user_id).await?;
    // Reconnect before the old connection's disconnect lands.
    let new_handle = ctx.presence.set_online(a.user_id).await?;
    assert_ne!(old_handle, new_handle);

    ctx.presence.set_offline(a.user_id, old_handle).await?;
    // Still online: the stale handle lost ownership.
    assert!(ctx.presence.is_online(a.user_id));

    ctx.presence.set_offline(a.user_id, new_handle).await?;
    assert!(!ctx.presence.is_online(a.user_id));
    Ok(())
}

#[tokio::test]
async fn presence_changes_reach_contacts_only() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    seed_user(ctx.db.pool(), "stranger", UserType::Graduate).await?;
    ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    let mut rx = ctx.event_bus.subscribe(Some(64)).await;
    ctx.presence.set_online(a.user_id).await?;

    let env = rx.recv().await.expect("expected an event");
    match (&env.topic, &env.event) {
        (Topic::User(id), ChatEvent::ContactPresence { user_id, status, .. }) => {
            assert_eq!(*id, b.user_id);
            assert_eq!(*user_id, a.user_id);
            assert_eq!(*status, PresenceStatus::Online);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    // One contact, one event.
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn manual_status_change_keeps_connection() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let handle = ctx.presence.set_online(a.user_id).await?;

    ctx.presence.set_status(a.user_id, PresenceStatus::Busy).await?;
    assert!(ctx.presence.is_online(a.user_id));
    let row = ctx
        .presence
        .get_presence(a.user_id)
        .await?
        .expect("presence row expected");
    assert_eq!(row.status, PresenceStatus::Busy);
    assert_eq!(row.connection_id, Some(handle));

    // Offline goes through the disconnect path, not set_status.
    match ctx.presence.set_status(a.user_id, PresenceStatus::Offline).await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn typing_indicators_broadcast_and_expire() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    let mut rx = ctx.event_bus.subscribe(Some(64)).await;
    ctx.presence.start_typing(chat.chat_id, a.user_id).await;

    let env = rx.recv().await.expect("expected typing event");
    assert_eq!(env.topic, Topic::Chat(chat.chat_id));
    assert!(matches!(
        env.event,
        ChatEvent::UserTyping { is_typing: true, .. }
    ));

    // The sweep expires the indicator once it is old enough.
    ctx.presence.cleanup_typing(chrono::Duration::seconds(0)).await;
    let env = rx.recv().await.expect("expected stop event");
    assert!(matches!(
        env.event,
        ChatEvent::UserTyping { is_typing: false, .. }
    ));

    // Stopping again emits nothing.
    ctx.presence.stop_typing(chat.chat_id, a.user_id).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}
