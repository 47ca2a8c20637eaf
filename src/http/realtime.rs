//! Realtime event socket.
//!
//! # Responsibilities
//! - Fan out server events (settings changes) to every connected client
//! - Track connected clients
//! - Close sockets when shutdown is requested
//!
//! # Data Flow
//! ```text
//! route handler → RealtimeHub::publish → broadcast channel
//!     → serve_socket (one task per client) → WebSocket text frame
//! ```
//!
//! # Design Decisions
//! - The handshake is authenticated by the gatekeeper like any request
//! - A `connected` frame is sent first, once the client is subscribed
//! - Slow clients skip missed events instead of blocking publishers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::context::AppContext;
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::observability::metrics;

/// Event name of the greeting frame.
pub const CONNECTED_EVENT: &str = "connected";

const CHANNEL_CAPACITY: usize = 64;

/// One frame sent to socket clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Broadcasts events to connected socket clients.
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RealtimeEvent>,
    clients: Arc<AtomicUsize>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Send `event` to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let name = event.event.clone();
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(event = %name, delivered, "Realtime event published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    fn connect(&self) -> ClientGuard {
        self.clients.fetch_add(1, Ordering::SeqCst);
        metrics::realtime_client_connected();
        ClientGuard {
            clients: Arc::clone(&self.clients),
        }
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the client count when a socket task ends, even by panic.
struct ClientGuard {
    clients: Arc<AtomicUsize>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
        metrics::realtime_client_disconnected();
    }
}

/// `GET /socket`
pub async fn socket_handler(State(ctx): State<AppContext>, ws: WebSocketUpgrade) -> Response {
    let hub = ctx.realtime().clone();
    let shutdown = ctx.shutdown().clone();
    ws.on_upgrade(move |socket| serve_socket(socket, hub, shutdown))
}

async fn serve_socket(mut socket: WebSocket, hub: RealtimeHub, shutdown: ShutdownTrigger) {
    let mut events = hub.subscribe();
    let _guard = hub.connect();
    tracing::debug!(clients = hub.client_count(), "Realtime client connected");

    let greeting = RealtimeEvent::new(
        CONNECTED_EVENT,
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    );
    if send_event(&mut socket, &greeting).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::debug!(error = %error, "Realtime socket error");
                    break;
                }
            },
            _ = shutdown.wait() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("Realtime client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &RealtimeEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}
