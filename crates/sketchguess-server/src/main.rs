//! SketchGuess WebSocket Relay Server
//!
//! Plays the shared real-time store for one game session: clients say hello,
//! receive the current session, roster and drawing, then push sequenced
//! commands and receive every change as it happens.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "hello", "user_id": "u1", "instance": "<uuid>" }
//! { "type": "append_strokes", "seq": 3, "strokes": [ ... ] }
//! { "type": "clear_drawing", "seq": 4, "signal": { "cleared": true, "timestamp": 0 } }
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use sketchguess_core::protocol::{ClientMessage, ServerMessage};
use sketchguess_server::{Peer, Relay, ServerConfig};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchguess_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr;
    if config.teachers.is_empty() {
        warn!("No teachers configured; set SKETCHGUESS_TEACHERS to allow starting rounds");
    }
    let state = Arc::new(Relay::new(config));

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("SketchGuess relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "SketchGuess Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<Relay>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", message, e);
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<Relay>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();
    let mut peer: Option<Peer> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_msg,
                    Err(e) => {
                        warn!("Invalid message: {}", e);
                        let err = ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        };
                        if let Some(out) = encode(&err) {
                            let _ = sender.send(out).await;
                        }
                        continue;
                    }
                };

                if let ClientMessage::Hello { user_id, instance } = &client_msg {
                    info!("Hello from {} ({})", user_id, instance);
                    peer = Some(Peer {
                        user_id: user_id.clone(),
                        instance: *instance,
                    });
                }

                let direct = state.submit(peer.as_ref(), client_msg);

                let mut closed = false;
                for message in &direct {
                    if let Some(out) = encode(message) {
                        if sender.send(out).await.is_err() {
                            closed = true;
                            break;
                        }
                    }
                }
                if closed {
                    break;
                }
            }

            change = rx.recv() => {
                let change = match change {
                    Ok(change) => change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Connection lagged, {} changes skipped", skipped);
                        let Some(peer) = &peer else { continue };
                        // Skipped changes are unknown; resend the whole state
                        let welcome = state.welcome(&peer.user_id);
                        if let Some(out) = encode(&welcome) {
                            if sender.send(out).await.is_err() {
                                break;
                            }
                        }
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(peer) = &peer else { continue };
                let message = change.render(&peer.user_id, state.config());
                if let Some(out) = encode(&message) {
                    if sender.send(out).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if let Some(peer) = peer {
        info!("Connection closed: {}", peer.user_id);
    }
}
