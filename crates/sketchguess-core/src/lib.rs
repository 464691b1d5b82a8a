//! SketchGuess Core Library
//!
//! Drawing sync, snapshot history and session logic for a real-time
//! drawing-and-guessing game.

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod outbox;
pub mod protocol;
pub mod roster;
pub mod session;
pub mod stroke;
pub mod surface;
pub mod sync;
pub mod tools;
pub mod transport;

pub use client::{ClientEvent, Effect, GameClient, UiAction};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use history::{DrawerScope, HistoryManager, HistoryOutcome, HistoryStack, MAX_HISTORY};
pub use outbox::{Command, Outbox};
pub use protocol::{Attempt, ClientMessage, ServerMessage};
pub use roster::{ProfileUpsert, RosterEntry};
pub use session::{Screen, SessionMachine, SessionState, SessionStatus, ViewMode};
pub use stroke::{Stroke, StrokeStyle};
pub use surface::{RasterSurface, RecordingSurface, Snapshot, Surface, SurfaceError};
pub use sync::{ClearSignal, DrawingDocument, DrawingSync, ReplayOutcome, SyncCursor, SyncMode};
pub use tools::{PointerEvent, ToolConfig};
pub use transport::{ConnectionState, TransportError, TransportEvent};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::NativeStoreClient;
