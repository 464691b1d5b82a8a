//! Shared state behind every socket.

use std::sync::{Mutex, MutexGuard};

use sketchguess_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::store::{Broadcast, Peer, Store};

const CHANNEL_CAPACITY: usize = 256;

/// The store plus the channel its changes are fanned out on.
pub struct Relay {
    store: Mutex<Store>,
    config: ServerConfig,
    tx: broadcast::Sender<Broadcast>,
}

impl Relay {
    pub fn new(config: ServerConfig) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            store: Mutex::new(Store::new(config.clone())),
            config,
            tx,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        // A panic while holding the lock leaves the store usable
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `message` and publish its changes; returns the direct replies.
    ///
    /// Changes are published before the lock is released, so subscribers see
    /// them in the order the store applied them.
    pub fn submit(&self, peer: Option<&Peer>, message: ClientMessage) -> Vec<ServerMessage> {
        let mut store = self.store();
        let reply = store.apply(peer, message);
        for change in reply.broadcast {
            // No subscribers is fine
            let _ = self.tx.send(change);
        }
        reply.direct
    }

    /// Full state for a connection that fell behind.
    pub fn welcome(&self, user_id: &str) -> ServerMessage {
        self.store().welcome(user_id)
    }
}
