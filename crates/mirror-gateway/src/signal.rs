use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use mirror_common::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::relay::relay_shared;
use crate::AppState;

pub const DEFAULT_OUTBOX_CAPACITY: usize = 128;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_MESSAGES_PER_MINUTE: u32 = 600;

/// Per-socket limits applied by the signaling endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketLimits {
    pub outbox_capacity: usize,
    pub max_message_bytes: usize,
    pub max_messages_per_minute: u32,
}

impl Default for SocketLimits {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_messages_per_minute: DEFAULT_MAX_MESSAGES_PER_MINUTE,
        }
    }
}

/// Fixed one-minute message budget for a single socket.
#[derive(Debug)]
struct MessageBudget {
    window_start: Instant,
    count: u32,
    limit: u32,
}

impl MessageBudget {
    fn new(limit: u32) -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            limit,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(60) {
            self.window_start = now;
            self.count = 0;
        }
        self.count = self.count.saturating_add(1);
        self.count <= self.limit
    }
}

fn to_ws_message(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json)),
        Err(err) => {
            warn!(kind = message.kind(), "failed to encode message: {}", err);
            None
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let max_bytes = state.limits.max_message_bytes;
    ws.max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(stream: WebSocket, state: AppState, addr: SocketAddr) {
    let limits = state.limits;
    let (mut sender, mut receiver) = stream.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(limits.outbox_capacity);
    let (disconnect_tx, mut disconnect_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Some(frame) = to_ws_message(&message) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
        let _ = disconnect_tx.try_send(());
    });

    let id = state.registry.write().await.join(tx.clone());
    info!(participant = %id, %addr, "signaling session opened");

    let mut budget = MessageBudget::new(limits.max_messages_per_minute);

    loop {
        tokio::select! {
            _ = disconnect_rx.recv() => {
                break;
            }
            msg = receiver.next() => {
                let Some(msg) = msg else { break; };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        debug!(participant = %id, "socket error: {}", err);
                        break;
                    }
                };

                if !budget.allow(Instant::now()) {
                    let _ = tx.try_send(ServerMessage::error("Rate limit exceeded"));
                    warn!(participant = %id, %addr, "rate limit exceeded, closing");
                    break;
                }

                let text = match msg {
                    Message::Text(text) => text,
                    Message::Binary(_) => {
                        let _ = tx.try_send(ServerMessage::error("Binary messages are not supported"));
                        continue;
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                if text.len() > limits.max_message_bytes {
                    let _ = tx.try_send(ServerMessage::error("Message too large"));
                    continue;
                }

                let message: ClientMessage = match serde_json::from_str(&text) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(participant = %id, "invalid message envelope: {}", err);
                        let _ = tx.try_send(ServerMessage::error("Invalid message"));
                        continue;
                    }
                };

                relay_shared(&state.registry, id, message).await;
            }
        }
    }

    state.registry.write().await.leave(id);
    info!(participant = %id, %addr, "signaling session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_up_to_limit() {
        let mut budget = MessageBudget::new(3);
        let now = Instant::now();
        assert!(budget.allow(now));
        assert!(budget.allow(now));
        assert!(budget.allow(now));
        assert!(!budget.allow(now));
    }

    #[test]
    fn test_budget_resets_after_window() {
        let mut budget = MessageBudget::new(1);
        let start = Instant::now();
        assert!(budget.allow(start));
        assert!(!budget.allow(start));
        assert!(budget.allow(start + Duration::from_secs(61)));
    }

    #[test]
    fn test_error_frame_is_json_text() {
        let frame = to_ws_message(&ServerMessage::error("Invalid message")).unwrap();
        match frame {
            Message::Text(text) => {
                assert_eq!(
                    text,
                    r#"{"type":"error","payload":{"message":"Invalid message"}}"#
                );
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
