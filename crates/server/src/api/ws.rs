//! WebSocket stream of queue events and notifications.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use transmute_core::{Notification, QueueEvent};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A file or batch changed in one of the converter queues.
    Queue { event: QueueEvent },
    /// A user-facing status message.
    Notification { notification: Notification },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn type_label(&self) -> &'static str {
        match self {
            WsMessage::Queue { .. } => "queue",
            WsMessage::Notification { .. } => "notification",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // No subscribers is fine
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Relay an orchestrator's queue events until its channel closes.
    pub fn forward_queue_events(&self, rx: broadcast::Receiver<QueueEvent>) -> JoinHandle<()> {
        self.forward(rx, |event| WsMessage::Queue { event })
    }

    /// Relay notifications until the notifier is dropped.
    pub fn forward_notifications(&self, rx: broadcast::Receiver<Notification>) -> JoinHandle<()> {
        self.forward(rx, |notification| WsMessage::Notification { notification })
    }

    /// Send a heartbeat every `period`.
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broadcaster.broadcast(WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                });
            }
        })
    }

    fn forward<T, F>(&self, mut rx: broadcast::Receiver<T>, wrap: F) -> JoinHandle<()>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> WsMessage + Send + 'static,
    {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(item) => broadcaster.broadcast(wrap(item)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket relay lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    WS_MESSAGES_SENT
                        .with_label_values(&[msg.type_label()])
                        .inc();

                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize WsMessage: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Clients only send control frames
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use transmute_core::{ChannelNotifier, NotificationSink, Severity};

    #[test]
    fn test_messages_are_tagged() {
        let msg = WsMessage::Notification {
            notification: Notification::new(Severity::Success, "done"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["notification"]["severity"], "success");
        assert_eq!(json["notification"]["message"], "done");

        let json = serde_json::to_value(WsMessage::Heartbeat { timestamp: 7 }).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["timestamp"], 7);
    }

    #[tokio::test]
    async fn test_forward_notifications() {
        let broadcaster = WsBroadcaster::new(16);
        let mut client = broadcaster.subscribe();
        let notifier = ChannelNotifier::new(16);
        broadcaster.forward_notifications(notifier.subscribe());

        notifier.notify(Notification::new(Severity::Warning, "1 file rejected"));

        match client.recv().await.unwrap() {
            WsMessage::Notification { notification } => {
                assert_eq!(notification.message, "1 file rejected");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_stops_when_source_closes() {
        let broadcaster = WsBroadcaster::new(16);
        let notifier = ChannelNotifier::new(16);
        let handle = broadcaster.forward_notifications(notifier.subscribe());

        drop(notifier);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat() {
        let broadcaster = WsBroadcaster::new(16);
        let mut client = broadcaster.subscribe();
        let handle = broadcaster.spawn_heartbeat(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(
            client.try_recv(),
            Ok(WsMessage::Heartbeat { .. })
        ));
        handle.abort();
    }
}
