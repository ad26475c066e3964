// gradlink-core/src/services/message_service.rs

use std::sync::Arc;

use tracing::{debug, warn};

use gradlink_common::models::{
    Attachment, Chat, ChatSummary, Message, MessageKind, MessageView, ReplySnapshot, User,
};
use gradlink_common::traits::{NotificationSink, ObjectStore, UserDirectory};

use crate::eventbus::{ChatEvent, EventBus};
use crate::repositories::postgres::{ChatRepo, MessageRepo, NewMessage};
use crate::services::moderation_service::ModerationService;
use crate::services::presence_service::PresenceService;
use crate::services::status_service::StatusService;
use crate::Error;

const MAX_CONTENT_LEN: usize = 2000;
const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

/// Everything the caller may vary when sending a message.
#[derive(Debug, Clone, Default)]
pub struct SendMessage {
    pub content: Option<String>,
    pub kind: Option<MessageKind>,
    pub attachment: Option<Attachment>,
    pub reply_to_message_id: Option<i64>,
}

/// One page of hydrated messages, oldest-first within the page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageView>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageStats {
    pub sent: i64,
    pub delivered: i64,
    pub read: i64,
    pub total: i64,
}

/// The message store: conversation bootstrap, send/edit/delete, listing and
/// search. Ingest goes through here from both the REST handlers and the
/// websocket gateway; events fan out over the bus either way.
pub struct MessageService {
    message_repo: Arc<dyn MessageRepo>,
    chat_repo: Arc<dyn ChatRepo>,
    status: Arc<StatusService>,
    presence: Arc<PresenceService>,
    moderation: Arc<ModerationService>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationSink>,
    object_store: Arc<dyn ObjectStore>,
    event_bus: Arc<EventBus>,
}

impl MessageService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_repo: Arc<dyn MessageRepo>,
        chat_repo: Arc<dyn ChatRepo>,
        status: Arc<StatusService>,
        presence: Arc<PresenceService>,
        moderation: Arc<ModerationService>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSink>,
        object_store: Arc<dyn ObjectStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            message_repo,
            chat_repo,
            status,
            presence,
            moderation,
            directory,
            notifier,
            object_store,
            event_bus,
        }
    }

    /// Find or create the 1:1 chat between the requester and a counterpart.
    pub async fn get_or_create_chat(&self, user_id: i64, other_id: i64) -> Result<Chat, Error> {
        if user_id == other_id {
            return Err(Error::Validation("cannot start a chat with yourself".into()));
        }
        if self.directory.get_user(other_id).await?.is_none() {
            return Err(Error::NotFound("User not found".into()));
        }
        if self.moderation.is_blocked(user_id, other_id).await? {
            return Err(Error::Forbidden("messaging is blocked between these users".into()));
        }

        if let Some(chat) = self.chat_repo.find_by_participants(user_id, other_id).await? {
            return Ok(chat);
        }
        let chat = self.chat_repo.create(user_id, other_id).await?;
        debug!("created chat {} for users {} and {}", chat.chat_id, user_id, other_id);
        Ok(chat)
    }

    /// The requester's active conversations, newest activity first, shaped
    /// around the counterpart.
    pub async fn chat_list(&self, user_id: i64) -> Result<Vec<ChatSummary>, Error> {
        let chats = self.chat_repo.list_for_user(user_id, true).await?;
        let mut summaries = Vec::with_capacity(chats.len());
        for chat in chats {
            let Some(other_id) = chat.other_participant(user_id) else {
                continue;
            };
            let Some(other_user) = self.directory.get_user(other_id).await? else {
                continue;
            };
            let last_message = match chat.last_message_id {
                Some(id) => self.message_repo.get(id).await?,
                None => None,
            };
            summaries.push(ChatSummary {
                chat_id: chat.chat_id,
                other_user,
                last_message,
                last_message_at: chat.last_message_at,
                unread_count: chat.unread_for(user_id),
                is_active: chat.is_active,
                created_at: chat.created_at,
            });
        }
        Ok(summaries)
    }

    /// Store a message and fan out the aftermath: last-message pointer,
    /// unread counter, delivered-if-online upgrade, bus events, and a
    /// best-effort push notification.
    pub async fn send(
        &self,
        chat_id: i64,
        sender_id: i64,
        send: SendMessage,
    ) -> Result<MessageView, Error> {
        let chat = self
            .chat_repo
            .get_for_participant(chat_id, sender_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat not found".into()))?;
        if !chat.is_active {
            return Err(Error::Forbidden("this conversation is no longer active".into()));
        }
        let receiver_id = chat
            .other_participant(sender_id)
            .ok_or_else(|| Error::NotFound("Chat not found".into()))?;
        if self.moderation.is_blocked(sender_id, receiver_id).await? {
            return Err(Error::Forbidden("messaging is blocked between these users".into()));
        }

        let kind = send.kind.unwrap_or(MessageKind::Text);
        let content = send.content.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        match kind {
            MessageKind::Text | MessageKind::System => {
                let Some(ref c) = content else {
                    return Err(Error::Validation("message content is required".into()));
                };
                if c.chars().count() > MAX_CONTENT_LEN {
                    return Err(Error::Validation(format!(
                        "message content exceeds {} characters",
                        MAX_CONTENT_LEN
                    )));
                }
            }
            MessageKind::Image | MessageKind::File => {
                if send.attachment.is_none() {
                    return Err(Error::Validation("attachment is required".into()));
                }
            }
        }

        if let Some(reply_id) = send.reply_to_message_id {
            let target = self
                .message_repo
                .get(reply_id)
                .await?
                .ok_or_else(|| Error::NotFound("Reply target not found".into()))?;
            if target.chat_id != chat_id {
                return Err(Error::Validation(
                    "reply target belongs to a different conversation".into(),
                ));
            }
        }

        let message = self
            .message_repo
            .create(&NewMessage {
                chat_id,
                sender_id,
                receiver_id,
                content,
                kind,
                attachment: send.attachment,
                reply_to_message_id: send.reply_to_message_id,
            })
            .await?;

        self.chat_repo
            .set_last_message(chat_id, message.message_id, message.created_at)
            .await?;
        self.status.on_message_created(chat_id, receiver_id).await?;

        // Receiver connected right now: upgrade to delivered immediately.
        let message = if self.presence.is_online(receiver_id) {
            self.message_repo
                .advance_status(message.message_id, gradlink_common::models::MessageStatus::Delivered)
                .await?;
            self.message_repo
                .get(message.message_id)
                .await?
                .unwrap_or(message)
        } else {
            message
        };

        let view = self.hydrate(message).await?;

        self.event_bus
            .publish_to_user(receiver_id, ChatEvent::NewMessage { message: view.clone() })
            .await;
        self.event_bus
            .publish_to_user(sender_id, ChatEvent::MessageSent { message: view.clone() })
            .await;
        // The chat-list preview update goes to the chat room and to both
        // participants' personal topics, so clients that never joined the
        // room still see their chat list move.
        let updated = ChatEvent::ChatUpdated {
            chat_id,
            last_message: view.clone(),
        };
        self.event_bus.publish_to_chat(chat_id, updated.clone()).await;
        self.event_bus.publish_to_user(sender_id, updated.clone()).await;
        self.event_bus.publish_to_user(receiver_id, updated).await;

        let preview = view
            .message
            .content
            .clone()
            .unwrap_or_else(|| format!("sent you a {}", kind.as_str()));
        if let Err(e) = self
            .notifier
            .notify(receiver_id, sender_id, "new_message", &preview)
            .await
        {
            warn!("notification dispatch failed for user {}: {:?}", receiver_id, e);
        }

        Ok(view)
    }

    /// Upload bytes to the object store, then send the resulting attachment
    /// as an image or file message with an optional caption.
    pub async fn send_attachment(
        &self,
        chat_id: i64,
        sender_id: i64,
        original_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        caption: Option<String>,
        reply_to_message_id: Option<i64>,
    ) -> Result<MessageView, Error> {
        if bytes.is_empty() {
            return Err(Error::Validation("attachment is empty".into()));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(Error::Validation("attachment exceeds the size limit".into()));
        }

        let kind = if mime_type.starts_with("image/") {
            MessageKind::Image
        } else {
            MessageKind::File
        };
        let attachment = self.object_store.store(original_name, mime_type, bytes).await?;

        self.send(
            chat_id,
            sender_id,
            SendMessage {
                content: caption,
                kind: Some(kind),
                attachment: Some(attachment),
                reply_to_message_id,
            },
        )
        .await
    }

    /// Sender-only content edit.
    pub async fn edit(
        &self,
        message_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<MessageView, Error> {
        let message = self
            .message_repo
            .get_accessible(message_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Message not found".into()))?;
        if message.sender_id != user_id {
            return Err(Error::Forbidden("only the sender can edit a message".into()));
        }
        if message.is_deleted {
            return Err(Error::NotFound("Message not found".into()));
        }
        if message.kind != MessageKind::Text {
            return Err(Error::Validation("only text messages can be edited".into()));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("message content is required".into()));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(Error::Validation(format!(
                "message content exceeds {} characters",
                MAX_CONTENT_LEN
            )));
        }

        let updated = self.message_repo.update_content(message_id, content).await?;
        let view = self.hydrate(updated).await?;
        self.event_bus
            .publish_to_chat(
                view.message.chat_id,
                ChatEvent::MessageEdited { message: view.clone() },
            )
            .await;
        self.event_bus
            .publish_to_user(
                view.message.receiver_id,
                ChatEvent::MessageEdited { message: view.clone() },
            )
            .await;
        Ok(view)
    }

    /// Sender-only soft delete: tombstone content, keep the row addressable
    /// for reply snapshots.
    pub async fn soft_delete(&self, message_id: i64, user_id: i64) -> Result<(), Error> {
        let message = self
            .message_repo
            .get_accessible(message_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Message not found".into()))?;
        if message.sender_id != user_id {
            return Err(Error::Forbidden("only the sender can delete a message".into()));
        }
        if message.is_deleted {
            return Err(Error::NotFound("Message not found".into()));
        }

        let deleted = self.message_repo.soft_delete(message_id).await?;
        let event = ChatEvent::MessageDeleted {
            chat_id: deleted.chat_id,
            message_id,
        };
        self.event_bus.publish_to_chat(deleted.chat_id, event.clone()).await;
        self.event_bus.publish_to_user(deleted.receiver_id, event).await;
        Ok(())
    }

    /// A page of messages, oldest-first within the page. Fetching a page
    /// marks the requester's pending messages in this chat delivered.
    pub async fn list_page(
        &self,
        chat_id: i64,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<MessagePage, Error> {
        self.page_with_search(chat_id, user_id, page, page_size, None).await
    }

    /// Case-insensitive substring search within one chat.
    pub async fn search(
        &self,
        chat_id: i64,
        user_id: i64,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<MessagePage, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("search query is required".into()));
        }
        self.page_with_search(chat_id, user_id, page, page_size, Some(query))
            .await
    }

    async fn page_with_search(
        &self,
        chat_id: i64,
        user_id: i64,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> Result<MessagePage, Error> {
        self.chat_repo
            .get_for_participant(chat_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat not found".into()))?;

        let page = page.max(1);
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE)
        };

        // Fetching a page implies the client can render it.
        self.status.mark_delivered_in_chat(chat_id, user_id).await?;

        let (rows, total) = self
            .message_repo
            .list_page(chat_id, page, page_size, search)
            .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            messages.push(self.hydrate(row).await?);
        }
        Ok(MessagePage {
            messages,
            page,
            page_size,
            total,
        })
    }

    /// Image/file messages in a chat, newest first.
    pub async fn attachments(
        &self,
        chat_id: i64,
        user_id: i64,
        kind: Option<MessageKind>,
        page: u32,
        page_size: u32,
    ) -> Result<MessagePage, Error> {
        self.chat_repo
            .get_for_participant(chat_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat not found".into()))?;

        let page = page.max(1);
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE)
        };

        let (rows, total) = self
            .message_repo
            .list_attachments(chat_id, kind, page, page_size)
            .await?;
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(self.hydrate(row).await?);
        }
        Ok(MessagePage {
            messages,
            page,
            page_size,
            total,
        })
    }

    /// Message counts by status over everything the user sent or received.
    pub async fn stats(&self, user_id: i64) -> Result<MessageStats, Error> {
        let (sent, delivered, read) = self.message_repo.status_stats(user_id).await?;
        Ok(MessageStats {
            sent,
            delivered,
            read,
            total: sent + delivered + read,
        })
    }

    /// Attach sender/receiver identities and the reply snapshot.
    pub async fn hydrate(&self, message: Message) -> Result<MessageView, Error> {
        let sender = self.user_or_placeholder(message.sender_id).await?;
        let receiver = self.user_or_placeholder(message.receiver_id).await?;

        let reply_to = match message.reply_to_message_id {
            Some(reply_id) => match self.message_repo.get(reply_id).await? {
                Some(target) => {
                    let target_sender = self.user_or_placeholder(target.sender_id).await?;
                    Some(ReplySnapshot {
                        message_id: target.message_id,
                        content: target.content,
                        sender: target_sender,
                        kind: target.kind,
                        attachment_url: target.attachment.as_ref().map(|a| a.url.clone()),
                        attachment_name: target
                            .attachment
                            .as_ref()
                            .map(|a| a.original_name.clone()),
                        is_deleted: target.is_deleted,
                        created_at: target.created_at,
                    })
                }
                None => None,
            },
            None => None,
        };

        Ok(MessageView {
            message,
            sender,
            receiver,
            reply_to,
        })
    }

    /// Directory rows can lag behind chat rows (deactivated accounts); a
    /// placeholder identity keeps old conversations renderable.
    async fn user_or_placeholder(&self, user_id: i64) -> Result<User, Error> {
        Ok(self
            .directory
            .get_user(user_id)
            .await?
            .unwrap_or_else(|| User::placeholder(user_id)))
    }
}
