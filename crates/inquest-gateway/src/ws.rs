//! WebSocket connection handling
//!
//! Each connection authenticates, then either subscribes to a session's
//! snapshot stream (viewer clients) or pushes update frames into one
//! (upstream producers). Snapshot fan-out rides the session's broadcast
//! channel; a client that cannot keep up drops revisions and is told so,
//! it never backpressures the engine loop.

use crate::auth::ResolvedAuth;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use inquest_core::{Error, Interaction, UpdateFrame};
use inquest_graph::Snapshot;
use inquest_runtime::{drive, DemoFeed, FeedSource, SessionRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shared state for WebSocket connections.
pub struct WsState {
    pub auth: ResolvedAuth,
    pub registry: Arc<SessionRegistry>,
    pub demo_frame_delay: Duration,
    pub started_at: std::time::Instant,
}

/// Messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        token: Option<String>,
    },
    /// Start receiving snapshots for an investigation.
    Subscribe {
        investigation_id: String,
    },
    /// An upstream producer pushing one arrival frame.
    Update {
        frame: UpdateFrame,
    },
    Interact {
        investigation_id: String,
        interaction: Interaction,
    },
    Reset {
        investigation_id: String,
    },
    /// Run the built-in scripted investigation against a symbol.
    StartDemo {
        symbol: String,
    },
    Ping,
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Info {
        version: String,
        sessions: usize,
    },
    AuthResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Snapshot {
        snapshot: Snapshot,
    },
    DemoStarted {
        investigation_id: String,
    },
    Lagged {
        dropped: u64,
    },
    Error {
        message: String,
    },
    Pong,
}

/// Handle one WebSocket connection until it closes.
pub async fn handle_connection(socket: WebSocket, state: Arc<WsState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut authenticated = state.auth.open_by_default();
    let mut subscription: Option<broadcast::Receiver<Snapshot>> = None;

    let info = ServerMessage::Info {
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.registry.len(),
    };
    if send(&mut ws_tx, &info).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let reply = handle_text(
                            &text,
                            &state,
                            &mut authenticated,
                            &mut subscription,
                        )
                        .await;
                        for message in reply {
                            if send(&mut ws_tx, &message).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("client disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("websocket error: {}", e);
                        return;
                    }
                    None => return,
                    _ => {} // Binary, Ping, Pong — ignore
                }
            }

            snapshot = recv_or_pending(&mut subscription) => {
                match snapshot {
                    Ok(snapshot) => {
                        if send(&mut ws_tx, &ServerMessage::Snapshot { snapshot }).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        // Rendering is an idempotent projection: the next
                        // snapshot fully supersedes the missed ones.
                        warn!("client lagged, dropped {} snapshots", dropped);
                        if send(&mut ws_tx, &ServerMessage::Lagged { dropped }).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("session snapshot stream closed");
                        subscription = None;
                    }
                }
            }
        }
    }
}

async fn recv_or_pending(
    subscription: &mut Option<broadcast::Receiver<Snapshot>>,
) -> Result<Snapshot, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    message: &ServerMessage,
) -> Result<(), ()> {
    match serde_json::to_string(message) {
        Ok(json) => ws_tx.send(WsMessage::Text(json)).await.map_err(|_| ()),
        Err(e) => {
            warn!("failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

/// Handle one text message. Returns the replies to send back.
async fn handle_text(
    text: &str,
    state: &Arc<WsState>,
    authenticated: &mut bool,
    subscription: &mut Option<broadcast::Receiver<Snapshot>>,
) -> Vec<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            return vec![ServerMessage::Error {
                message: format!("invalid message: {e}"),
            }]
        }
    };

    match message {
        ClientMessage::Auth { token } => match state.auth.verify_token(token.as_deref()) {
            Ok(()) => {
                *authenticated = true;
                info!("client authenticated");
                vec![ServerMessage::AuthResult {
                    ok: true,
                    error: None,
                }]
            }
            Err(e) => {
                warn!("auth failed: {}", e);
                vec![ServerMessage::AuthResult {
                    ok: false,
                    error: Some(e.to_string()),
                }]
            }
        },

        ClientMessage::Ping => vec![ServerMessage::Pong],

        _ if !*authenticated => vec![ServerMessage::Error {
            message: "not authenticated".to_string(),
        }],

        ClientMessage::Subscribe { investigation_id } => {
            match state.registry.open(&investigation_id) {
                Ok(handle) => {
                    *subscription = Some(handle.subscribe());
                    // The first snapshot arrives through the subscription.
                    if let Err(e) = handle.request_snapshot().await {
                        return vec![ServerMessage::Error {
                            message: e.to_string(),
                        }];
                    }
                    info!(session = %investigation_id, "client subscribed");
                    Vec::new()
                }
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientMessage::Update { frame } => {
            let result = match state.registry.open(&frame.investigation_id) {
                Ok(handle) => handle.ingest(frame).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => Vec::new(),
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientMessage::Interact {
            investigation_id,
            interaction,
        } => match state.registry.get(&investigation_id) {
            Some(handle) => match handle.interact(interaction).await {
                Ok(()) => Vec::new(),
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            },
            None => vec![ServerMessage::Error {
                message: Error::SessionNotFound(investigation_id).to_string(),
            }],
        },

        ClientMessage::Reset { investigation_id } => match state.registry.get(&investigation_id) {
            Some(handle) => match handle.reset().await {
                Ok(()) => Vec::new(),
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            },
            None => vec![ServerMessage::Error {
                message: Error::SessionNotFound(investigation_id).to_string(),
            }],
        },

        ClientMessage::StartDemo { symbol } => {
            let feed = DemoFeed::new(&symbol, state.demo_frame_delay);
            let investigation_id = feed.investigation_id().to_string();
            match state.registry.open(&investigation_id) {
                Ok(handle) => {
                    info!(session = %investigation_id, symbol = %symbol, "demo started");
                    tokio::spawn(async move {
                        if let Err(e) = drive(feed, &handle).await {
                            warn!("demo feed stopped early: {}", e);
                        }
                    });
                    vec![ServerMessage::DemoStarted { investigation_id }]
                }
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            }
        }
    }
}
