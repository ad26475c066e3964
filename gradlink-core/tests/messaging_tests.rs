// tests/messaging_tests.rs
//
// End-to-end message flow through the service layer: sending, unread
// counters, read receipts, edit/delete rules, reply validation, events.

mod common;

use gradlink_common::models::{MessageStatus, UserType};
use gradlink_core::eventbus::{ChatEvent, Topic};
use gradlink_core::services::SendMessage;
use gradlink_core::test_utils::helpers::seed_user;
use gradlink_core::Error;

use common::setup;

fn text(content: &str) -> SendMessage {
    SendMessage {
        content: Some(content.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn send_increments_unread_and_notifies_receiver() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    let mut rx = ctx.event_bus.subscribe(Some(64)).await;

    let view = ctx.messages.send(chat.chat_id, a.user_id, text("hi bob")).await?;
    assert_eq!(view.message.status, MessageStatus::Sent);
    assert_eq!(view.sender.user_id, a.user_id);
    assert_eq!(view.receiver.user_id, b.user_id);

    let summary = ctx.status.unread_summary(b.user_id).await?;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.by_chat.get(&chat.chat_id), Some(&1));
    // Sender's own unread is untouched.
    assert_eq!(ctx.status.unread_summary(a.user_id).await?.total, 0);

    // The receiver hears unread_count_updated and new_message on their topic.
    let mut saw_new_message = false;
    let mut saw_unread = false;
    let mut saw_ack = false;
    for _ in 0..4 {
        let env = rx.recv().await.expect("expected an event");
        match (&env.topic, &env.event) {
            (Topic::User(id), ChatEvent::NewMessage { message }) if *id == b.user_id => {
                assert_eq!(message.message.message_id, view.message.message_id);
                saw_new_message = true;
            }
            (Topic::User(id), ChatEvent::UnreadCountUpdated { unread_count, .. })
                if *id == b.user_id =>
            {
                assert_eq!(*unread_count, 1);
                saw_unread = true;
            }
            (Topic::User(id), ChatEvent::MessageSent { .. }) if *id == a.user_id => {
                saw_ack = true;
            }
            _ => {}
        }
    }
    assert!(saw_new_message && saw_unread && saw_ack);
    Ok(())
}

#[tokio::test]
async fn mark_read_resets_counter_and_emits_receipt() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    for i in 0..3 {
        ctx.messages
            .send(chat.chat_id, a.user_id, text(&format!("msg {}", i)))
            .await?;
    }
    assert_eq!(ctx.status.unread_summary(b.user_id).await?.total, 3);

    let mut rx = ctx.event_bus.subscribe(Some(64)).await;
    let read_ids = ctx.status.mark_read(chat.chat_id, b.user_id).await?;
    assert_eq!(read_ids.len(), 3);
    assert_eq!(ctx.status.unread_summary(b.user_id).await?.total, 0);

    // Counterpart gets messages_read with the exact ids.
    let mut saw_receipt = false;
    for _ in 0..2 {
        let env = rx.recv().await.expect("expected an event");
        if let (Topic::User(id), ChatEvent::MessagesRead { message_ids, reader_id, .. }) =
            (&env.topic, &env.event)
        {
            if *id == a.user_id {
                assert_eq!(*reader_id, b.user_id);
                assert_eq!(message_ids.len(), 3);
                saw_receipt = true;
            }
        }
    }
    assert!(saw_receipt);

    // Marking again is a no-op, not an error.
    assert!(ctx.status.mark_read(chat.chat_id, b.user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn chat_updated_reaches_both_participants_directly() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    let mut rx = ctx.event_bus.subscribe(Some(64)).await;
    let view = ctx.messages.send(chat.chat_id, a.user_id, text("preview me")).await?;

    // new_message + message_sent + unread_count_updated + chat_updated x3.
    let mut updated_topics = Vec::new();
    for _ in 0..6 {
        let env = rx.recv().await.expect("expected an event");
        if let ChatEvent::ChatUpdated { last_message, .. } = &env.event {
            assert_eq!(last_message.message.message_id, view.message.message_id);
            updated_topics.push(env.topic);
        }
    }
    assert!(updated_topics.contains(&Topic::Chat(chat.chat_id)));
    assert!(updated_topics.contains(&Topic::User(a.user_id)));
    assert!(updated_topics.contains(&Topic::User(b.user_id)));
    Ok(())
}

#[tokio::test]
async fn single_message_acks_are_receiver_only_and_forward_only() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    let first = ctx.messages.send(chat.chat_id, a.user_id, text("one")).await?;
    ctx.messages.send(chat.chat_id, a.user_id, text("two")).await?;

    // The sender cannot acknowledge their own message.
    match ctx
        .status
        .update_status(first.message.message_id, a.user_id, MessageStatus::Read)
        .await
    {
        Err(Error::Forbidden(_)) => {}
        other => panic!("expected Forbidden, got {:?}", other),
    }

    // Reading one of two recomputes the counter from the rows.
    assert!(ctx
        .status
        .update_status(first.message.message_id, b.user_id, MessageStatus::Read)
        .await?);
    assert_eq!(ctx.status.unread_summary(b.user_id).await?.total, 1);

    // Downgrading back to delivered is a refused no-op, not an error.
    assert!(!ctx
        .status
        .update_status(first.message.message_id, b.user_id, MessageStatus::Delivered)
        .await?);
    Ok(())
}

#[tokio::test]
async fn only_the_sender_may_edit_or_delete() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    let view = ctx.messages.send(chat.chat_id, a.user_id, text("original")).await?;
    let id = view.message.message_id;

    match ctx.messages.edit(id, b.user_id, "hijacked").await {
        Err(Error::Forbidden(_)) => {}
        other => panic!("expected Forbidden, got {:?}", other.map(|v| v.message.message_id)),
    }
    match ctx.messages.soft_delete(id, b.user_id).await {
        Err(Error::Forbidden(_)) => {}
        other => panic!("expected Forbidden, got {:?}", other),
    }

    let edited = ctx.messages.edit(id, a.user_id, "fixed").await?;
    assert!(edited.message.is_edited);
    assert_eq!(edited.message.content.as_deref(), Some("fixed"));

    ctx.messages.soft_delete(id, a.user_id).await?;
    // A deleted message cannot be edited again; existence is not revealed.
    match ctx.messages.edit(id, a.user_id, "zombie").await {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|v| v.message.is_edited)),
    }
    Ok(())
}

#[tokio::test]
async fn replies_must_target_the_same_chat() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let c = seed_user(ctx.db.pool(), "carol", UserType::Graduate).await?;
    let chat_ab = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    let chat_ac = ctx.messages.get_or_create_chat(a.user_id, c.user_id).await?;

    let foreign = ctx.messages.send(chat_ac.chat_id, a.user_id, text("elsewhere")).await?;
    let send = SendMessage {
        content: Some("re: elsewhere".to_string()),
        reply_to_message_id: Some(foreign.message.message_id),
        ..Default::default()
    };
    match ctx.messages.send(chat_ab.chat_id, a.user_id, send).await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other.map(|v| v.message.message_id)),
    }

    // A reply to a deleted message keeps a renderable snapshot.
    let target = ctx.messages.send(chat_ab.chat_id, a.user_id, text("will vanish")).await?;
    ctx.messages
        .soft_delete(target.message.message_id, a.user_id)
        .await?;
    let reply = ctx
        .messages
        .send(
            chat_ab.chat_id,
            b.user_id,
            SendMessage {
                content: Some("re: vanished".to_string()),
                reply_to_message_id: Some(target.message.message_id),
                ..Default::default()
            },
        )
        .await?;
    let snapshot = reply.reply_to.expect("reply snapshot expected");
    assert!(snapshot.is_deleted);
    Ok(())
}

#[tokio::test]
async fn blocked_pairs_cannot_message() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    ctx.moderation.block(a.user_id, b.user_id, None).await?;

    // Both directions are cut off.
    for sender in [a.user_id, b.user_id] {
        match ctx.messages.send(chat.chat_id, sender, text("hello?")).await {
            Err(Error::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {:?}", other.map(|v| v.message.message_id)),
        }
    }

    ctx.moderation.unblock(a.user_id, b.user_id).await?;
    assert!(ctx.messages.send(chat.chat_id, a.user_id, text("we are back")).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn listing_marks_pending_messages_delivered() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;
    ctx.messages.send(chat.chat_id, a.user_id, text("one")).await?;
    ctx.messages.send(chat.chat_id, a.user_id, text("two")).await?;

    let page = ctx.messages.list_page(chat.chat_id, b.user_id, 1, 50).await?;
    assert_eq!(page.total, 2);
    // Oldest first within the page.
    assert_eq!(page.messages[0].message.content.as_deref(), Some("one"));
    assert_eq!(page.messages[1].message.content.as_deref(), Some("two"));
    for view in &page.messages {
        assert_eq!(view.message.status, MessageStatus::Delivered);
    }

    // Delivery does not clear unread.
    assert_eq!(ctx.status.unread_summary(b.user_id).await?.total, 2);
    Ok(())
}

#[tokio::test]
async fn empty_and_oversized_content_are_rejected() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    for bad in ["", "   ", &"x".repeat(2001)] {
        match ctx.messages.send(chat.chat_id, a.user_id, text(bad)).await {
            Err(Error::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other.map(|v| v.message.message_id)),
        }
    }
    Ok(())
}

#[tokio::test]
async fn self_chat_is_rejected() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    match ctx.messages.get_or_create_chat(a.user_id, a.user_id).await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected Validation, got {:?}", other.map(|c| c.chat_id)),
    }
    Ok(())
}

#[tokio::test]
async fn attachment_send_uses_object_store() -> Result<(), Error> {
    let ctx = setup().await?;
    let a = seed_user(ctx.db.pool(), "alice", UserType::Graduate).await?;
    let b = seed_user(ctx.db.pool(), "bob", UserType::Graduate).await?;
    let chat = ctx.messages.get_or_create_chat(a.user_id, b.user_id).await?;

    let view = ctx
        .messages
        .send_attachment(
            chat.chat_id,
            a.user_id,
            "reunion.jpg",
            "image/jpeg",
            vec![0u8; 128],
            Some("reunion photo".to_string()),
            None,
        )
        .await?;
    assert_eq!(view.message.kind, gradlink_common::models::MessageKind::Image);
    let attachment = view.message.attachment.expect("attachment expected");
    assert_eq!(attachment.original_name, "reunion.jpg");
    assert_eq!(attachment.byte_size, 128);

    let page = ctx
        .messages
        .attachments(chat.chat_id, b.user_id, None, 1, 50)
        .await?;
    assert_eq!(page.total, 1);
    Ok(())
}
