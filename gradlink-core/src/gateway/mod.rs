//! src/gateway/mod.rs
//!
//! Realtime connection layer: one websocket per client, authenticated by an
//! opaque token before upgrade. Each connection runs its own task, joins its
//! personal user topic implicitly and chat topics on request, and forwards
//! matching bus events onto the socket. A failed command emits an `error`
//! frame on the offending connection; it never tears the connection down.

use std::collections::HashSet;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gradlink_common::models::PresenceStatus;
use gradlink_common::Error;

use crate::eventbus::{ChatEvent, Envelope, Topic};
use crate::http::{ApiError, AppState};
use crate::services::{LimitKind, SendMessage};

/// Commands a client may send over the socket. Tagged the same way server
/// events are, so both directions read symmetrically on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    SendMessage {
        chat_id: i64,
        content: String,
        reply_to_message_id: Option<i64>,
    },
    MarkAsRead {
        chat_id: i64,
    },
    EditMessage {
        message_id: i64,
        content: String,
    },
    DeleteMessage {
        message_id: i64,
    },
    TypingStart {
        chat_id: i64,
    },
    TypingStop {
        chat_id: i64,
    },
    UpdatePresence {
        status: PresenceStatus,
    },
    JoinChat {
        chat_id: i64,
    },
    LeaveChat {
        chat_id: i64,
    },
}

#[derive(Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Browsers cannot set headers on websocket handshakes, so the token rides
/// in the query string here.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state.verifier.verify(&params.token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, user_id)))
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: i64) {
    let mut bus_rx = state.event_bus.subscribe(None).await;
    let mut shutdown_rx = state.event_bus.shutdown_rx.clone();

    let handle = match state.presence.set_online(user_id).await {
        Ok(h) => h,
        Err(e) => {
            warn!("presence bootstrap failed for user {}: {:?}", user_id, e);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Everything still pending for this user becomes delivered, then the
    // client gets its unread snapshot.
    if let Err(e) = state.status.mark_delivered_on_connect(user_id).await {
        warn!("delivery sweep failed for user {}: {:?}", user_id, e);
    }
    match state.status.unread_summary(user_id).await {
        Ok(summary) => {
            let event = ChatEvent::UnreadCounts {
                by_chat: summary.by_chat,
                total: summary.total,
            };
            if send_event(&mut sink, &event).await.is_err() {
                finish(&state, user_id, handle, &HashSet::new()).await;
                return;
            }
        }
        Err(e) => warn!("unread snapshot failed for user {}: {:?}", user_id, e),
    }

    info!("websocket open for user {}", user_id);
    let mut joined: HashSet<i64> = HashSet::new();

    loop {
        tokio::select! {
            envelope = bus_rx.recv() => {
                let Some(envelope) = envelope else { break };
                if !wants(&envelope, user_id, &joined) {
                    continue;
                }
                if send_event(&mut sink, &envelope.event).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let outcome = match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(command) => {
                                handle_command(&state, user_id, &mut joined, command).await
                            }
                            Err(e) => Err(Error::Validation(format!("bad command: {}", e))),
                        };
                        if let Err(e) = outcome {
                            debug!("command failed for user {}: {}", user_id, e);
                            let event = ChatEvent::Error { message: e.to_string() };
                            if send_event(&mut sink, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary frames are ignored
                    Some(Err(e)) => {
                        debug!("websocket read error for user {}: {}", user_id, e);
                        break;
                    }
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    finish(&state, user_id, handle, &joined).await;
    info!("websocket closed for user {}", user_id);
}

/// Topic filter for one connection. Typing echoes from the user themselves
/// are suppressed.
fn wants(envelope: &Envelope, user_id: i64, joined: &HashSet<i64>) -> bool {
    if let ChatEvent::UserTyping { user_id: typist, .. } = &envelope.event {
        if *typist == user_id {
            return false;
        }
    }
    match envelope.topic {
        Topic::User(id) => id == user_id,
        Topic::Chat(chat_id) => joined.contains(&chat_id),
    }
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, WsMessage>,
    event: &ChatEvent,
) -> Result<(), Error> {
    let json = serde_json::to_string(event)?;
    sink.send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| Error::Upstream(format!("websocket send failed: {}", e)))
}

async fn handle_command(
    state: &AppState,
    user_id: i64,
    joined: &mut HashSet<i64>,
    command: ClientCommand,
) -> Result<(), Error> {
    match command {
        ClientCommand::SendMessage {
            chat_id,
            content,
            reply_to_message_id,
        } => {
            state
                .limiter
                .check(user_id, LimitKind::Message)
                .require("messages")?;
            state
                .messages
                .send(
                    chat_id,
                    user_id,
                    SendMessage {
                        content: Some(content),
                        kind: None,
                        attachment: None,
                        reply_to_message_id,
                    },
                )
                .await?;
            Ok(())
        }
        ClientCommand::MarkAsRead { chat_id } => {
            state.status.mark_read(chat_id, user_id).await?;
            Ok(())
        }
        ClientCommand::EditMessage {
            message_id,
            content,
        } => {
            state.messages.edit(message_id, user_id, &content).await?;
            Ok(())
        }
        ClientCommand::DeleteMessage { message_id } => {
            state.messages.soft_delete(message_id, user_id).await
        }
        ClientCommand::TypingStart { chat_id } => {
            require_joined(joined, chat_id)?;
            state.presence.start_typing(chat_id, user_id).await;
            Ok(())
        }
        ClientCommand::TypingStop { chat_id } => {
            require_joined(joined, chat_id)?;
            state.presence.stop_typing(chat_id, user_id).await;
            Ok(())
        }
        ClientCommand::UpdatePresence { status } => {
            state.presence.set_status(user_id, status).await
        }
        ClientCommand::JoinChat { chat_id } => {
            state
                .chat_repo
                .get_for_participant(chat_id, user_id)
                .await?
                .ok_or_else(|| Error::NotFound("Chat not found".into()))?;
            joined.insert(chat_id);
            Ok(())
        }
        ClientCommand::LeaveChat { chat_id } => {
            joined.remove(&chat_id);
            state.presence.stop_typing(chat_id, user_id).await;
            Ok(())
        }
    }
}

fn require_joined(joined: &HashSet<i64>, chat_id: i64) -> Result<(), Error> {
    if joined.contains(&chat_id) {
        Ok(())
    } else {
        Err(Error::Forbidden("join the chat first".into()))
    }
}

/// Disconnect path: drop typing indicators, then release presence if this
/// connection still owns it.
async fn finish(state: &AppState, user_id: i64, handle: Uuid, joined: &HashSet<i64>) {
    for chat_id in joined {
        state.presence.stop_typing(*chat_id, user_id).await;
    }
    if let Err(e) = state.presence.set_offline(user_id, handle).await {
        warn!("offline transition failed for user {}: {:?}", user_id, e);
    }
}
