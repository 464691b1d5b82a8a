//! SketchGuess relay store.
//!
//! Keeps the single active session, the roster and the drawing log in memory
//! and relays every change to the connected game clients.

pub mod config;
pub mod relay;
pub mod store;

pub use config::ServerConfig;
pub use relay::Relay;
pub use store::{Broadcast, Peer, Reply, Store, StoreError};
