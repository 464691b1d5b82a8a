//! WebSocket transport to the relay store.
//!
//! The socket lives on a background thread; the game loop polls events and
//! pushes outgoing messages through channels, so it never blocks.

use thiserror::Error;

use crate::protocol::ServerMessage;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid WebSocket URL scheme: {0}")]
    InvalidScheme(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the transport thread
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
    Error { message: String },
}

/// At most `max` characters of `msg`, cut on a character boundary.
#[cfg(not(target_arch = "wasm32"))]
fn preview(msg: &str, max: usize) -> &str {
    msg.char_indices().nth(max).map_or(msg, |(i, _)| &msg[..i])
}

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};
    use url::Url;

    use crate::protocol::ClientMessage;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Store client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeStoreClient {
        state: ConnectionState,
        events: Vec<TransportEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeStoreClient {
        /// Create a new disconnected client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to the relay.
        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.cmd_tx.is_some() {
                return Err(TransportError::AlreadyConnected);
            }
            validate_url(url)?;

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("Store thread: connecting to {}", url);

                let (mut socket, response) = match connect(&url) {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::error!("Store connection failed: {}", e);
                        let _ = event_tx.send(TransportEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                        return;
                    }
                };

                log::info!("Store connected, status: {}", response.status());
                let _ = event_tx.send(TransportEvent::Connected);

                if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }

                loop {
                    match cmd_rx.try_recv() {
                        Ok(WsCommand::Send(msg)) => {
                            log::debug!("Store sending: {}", preview(&msg, 100));
                            if let Err(e) = socket.send(Message::Text(msg)) {
                                log::error!("Store send error: {}", e);
                                break;
                            }
                        }
                        Ok(WsCommand::Close) => {
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => match serde_json::from_str::<ServerMessage>(&txt) {
                            Ok(message) => {
                                let _ = event_tx.send(TransportEvent::Message(message));
                            }
                            Err(e) => log::warn!("Failed to parse server message: {} ({})", txt, e),
                        },
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("Store sent close frame");
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::error!("Store read error: {}", e);
                            break;
                        }
                    }
                }

                log::info!("Store thread exiting");
                let _ = event_tx.send(TransportEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        /// Disconnect from the relay.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Serialize and queue a message.
        pub fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
            let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
            let text = serde_json::to_string(message)?;
            tx.send(WsCommand::Send(text))
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<TransportEvent> {
            let mut closed = false;
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        TransportEvent::Connected => self.state = ConnectionState::Connected,
                        TransportEvent::Disconnected => {
                            self.state = ConnectionState::Disconnected;
                            closed = true;
                        }
                        TransportEvent::Error { .. } => {
                            self.state = ConnectionState::Error;
                            closed = true;
                        }
                        TransportEvent::Message(_) => {}
                    }
                    self.events.push(event);
                }
            }
            if closed {
                // Thread is gone; allow a fresh connect
                self.cmd_tx = None;
                self.event_rx = None;
                self._thread = None;
            }
            std::mem::take(&mut self.events)
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeStoreClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeStoreClient {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    pub(super) fn validate_url(url: &str) -> Result<(), TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(TransportError::InvalidScheme(other.to_string())),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeStoreClient;
