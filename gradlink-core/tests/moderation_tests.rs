// tests/moderation_tests.rs
//
// Blocking, reporting and the moderator surface.

mod common;

use gradlink_common::models::{ReportReason, ReportStatus, UserType};
use gradlink_core::eventbus::{ChatEvent, Topic};
use gradlink_core::test_utils::helpers::seed_user;
use gradlink_core::Error;

use common::setup;

#[tokio::test]
async fn blocking_deactivates_the_chat() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    assert!(chat.is_active);

    ctx.moderation.block(a.user_id, b.user_id, Some("spam")).await?;
    assert!(ctx.moderation.is_blocked(a.user_id, b.user_id).await?);
    assert!(ctx.moderation.is_blocked(b.user_id, a.user_id).await?);

    // Inactive chats fall out of the active chat list.
    assert!(ctx.messages.chat_list(a.user_id).await?.is_empty());

    ctx.moderation.unblock(a.user_id, b.user_id).await?;
    assert!(!ctx.moderation.is_blocked(a.user_id, b.user_id).await?);
    assert_eq!(ctx.messages.chat_list(a.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unblock_keeps_chat_inactive_while_reverse_block_remains() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    ctx.moderation.block(a.user_id, b.user_id, None).await?;
    ctx.moderation.block(b.user_id, a.user_id, None).await?;

    ctx.moderation.unblock(a.user_id, b.user_id).await?;
    // Bob's block still stands.
    assert!(ctx.moderation.is_blocked(a.user_id, b.user_id).await?);
    assert!(ctx.messages.chat_list(a.user_id).await?.is_empty());

    ctx.moderation.unblock(b.user_id, a.user_id).await?;
    assert_eq!(ctx.messages.chat_list(a.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn self_block_and_duplicates_are_rejected() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;

    match ctx.moderation.block(a.user_id, a.user_id, None).await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other.map(|b| b.block_id)),
    }

    ctx.moderation.block(a.user_id, b.user_id, None).await?;
    match ctx.moderation.block(a.user_id, b.user_id, None).await {
        Err(Error::Conflict(_)) => {}
        other => panic!("expected Conflict, got {:?}", other.map(|b| b.block_id)),
    }

    // Unblocking someone who is not blocked is NotFound.
    match ctx.moderation.unblock(b.user_id, a.user_id).await {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn reporting_enforces_the_cooldown() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;

    let report = ctx
        .moderation
        .report(a.user_id, b.user_id, None, None, ReportReason::Spam, None)
        .await?;
    assert_eq!(report.status, ReportStatus::Pending);

    match ctx
        .moderation
        .report(a.user_id, b.user_id, None, None, ReportReason::Harassment, None)
        .await
    {
        Err(Error::RateLimited { retry_after_secs, .. }) => {
            assert!(retry_after_secs > 0);
        }
        other => panic!("expected RateLimited, got {:?}", other.map(|r| r.report_id)),
    }

    // A different target is unaffected by the cooldown.
    let c = seed_user(ctx.db.pool(), "carol", UserType::Graduate).await?;
    assert!(ctx
        .moderation
        .report(a.user_id, c.user_id, None, None, ReportReason::Spam, None)
        .await
        .is_ok());

    // Self-reports are rejected outright.
    match ctx
        .moderation
        .report(a.user_id, a.user_id, None, None, ReportReason::Other, None)
        .await
    {
        Err(Error::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other.map(|r| r.report_id)),
    }
    Ok(())
}

#[tokio::test]
async fn report_review_is_moderator_only() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let admin = seed_user(ctx.db.pool(), "root", UserType::Admin).await?;

    let report = ctx
        .moderation
        .report(a.user_id, b.user_id, None, None, ReportReason::Spam, None)
        .await?;

    match ctx
        .moderation
        .update_report_status(b.user_id, report.report_id, ReportStatus::Dismissed, None)
        .await
    {
        Err(Error::Forbidden(_)) => {}
        other => panic!("expected Forbidden, got {:?}", other.map(|r| r.report_id)),
    }

    let mut rx = ctx.event_bus.subscribe(Some(16)).await;
    let updated = ctx
        .moderation
        .update_report_status(
            admin.user_id,
            report.report_id,
            ReportStatus::Resolved,
            Some("handled"),
        )
        .await?;
    assert_eq!(updated.status, ReportStatus::Resolved);
    assert_eq!(updated.admin_notes.as_deref(), Some("handled"));

    // The reporter hears about the resolution.
    let env = rx.recv().await.expect("expected an event");
    match (&env.topic, &env.event) {
        (Topic::User(id), ChatEvent::ReportResolved { report }) => {
            assert_eq!(*id, a.user_id);
            assert_eq!(report.report_id, updated.report_id);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn dashboard_aggregates_reports_and_blocks() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let c = seed_user(ctx.db.pool(), "carol", UserType::Graduate).await?;
    let admin = seed_user(ctx.db.pool(), "root", UserType::Admin).await?;

    let r1 = ctx
        .moderation
        .report(a.user_id, b.user_id, None, None, ReportReason::Spam, None)
        .await?;
    ctx.moderation
        .report(c.user_id, b.user_id, None, None, ReportReason::Harassment, None)
        .await?;
    ctx.moderation
        .update_report_status(admin.user_id, r1.report_id, ReportStatus::Resolved, None)
        .await?;
    ctx.moderation.block(a.user_id, c.user_id, None).await?;

    let dashboard = ctx.moderation.dashboard().await?;
    assert_eq!(dashboard.total_reports, 2);
    assert_eq!(dashboard.pending_reports, 1);
    assert_eq!(dashboard.resolved_reports, 1);
    assert_eq!(dashboard.dismissed_reports, 0);
    assert_eq!(dashboard.total_blocks, 1);
    assert_eq!(dashboard.recent_reports.len(), 2);

    let (pending, total) = ctx
        .moderation
        .reports(Some(ReportStatus::Pending), 20, 0)
        .await?;
    assert_eq!(total, 1);
    assert_eq!(pending.len(), 1);
    Ok(())
}
