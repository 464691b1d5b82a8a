//! Wire protocol between game clients and the relay store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outbox::Command;
use crate::roster::{ProfileUpsert, RosterEntry};
use crate::session::SessionState;
use crate::stroke::Stroke;
use crate::sync::{ClearSignal, DrawingDocument};

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection; must come first
    Hello { user_id: String, instance: Uuid },
    /// Merge username and points into the roster
    UpsertProfile { seq: u64, profile: ProfileUpsert },
    /// Append strokes to the drawing log (drawer only)
    AppendStrokes { seq: u64, strokes: Vec<Stroke> },
    /// Replace the drawing log with a clear signal (drawer only)
    ClearDrawing { seq: u64, signal: ClearSignal },
    SubmitGuess { seq: u64, guess: String },
    /// Teacher only
    StartRound { seq: u64, prompts: Vec<String> },
    /// Teacher only
    EndRound { seq: u64 },
    /// Teacher only
    OpenLobby { seq: u64 },
    /// Ask for the full drawing document
    ResyncDrawing,
}

impl ClientMessage {
    pub fn from_command(seq: u64, command: Command) -> Self {
        match command {
            Command::UpsertProfile(profile) => ClientMessage::UpsertProfile { seq, profile },
            Command::AppendStrokes(strokes) => ClientMessage::AppendStrokes { seq, strokes },
            Command::ClearDrawing(signal) => ClientMessage::ClearDrawing { seq, signal },
            Command::SubmitGuess(guess) => ClientMessage::SubmitGuess { seq, guess },
            Command::StartRound(prompts) => ClientMessage::StartRound { seq, prompts },
            Command::EndRound => ClientMessage::EndRound { seq },
            Command::OpenLobby => ClientMessage::OpenLobby { seq },
        }
    }

    /// Sequence number, for sequenced commands.
    pub fn seq(&self) -> Option<u64> {
        match self {
            ClientMessage::UpsertProfile { seq, .. }
            | ClientMessage::AppendStrokes { seq, .. }
            | ClientMessage::ClearDrawing { seq, .. }
            | ClientMessage::SubmitGuess { seq, .. }
            | ClientMessage::StartRound { seq, .. }
            | ClientMessage::EndRound { seq }
            | ClientMessage::OpenLobby { seq } => Some(*seq),
            ClientMessage::Hello { .. } | ClientMessage::ResyncDrawing => None,
        }
    }
}

/// A guess relayed to everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub user_id: String,
    pub username: String,
    pub guess: String,
    pub timestamp: u64,
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `Hello` with the current state of every feed
    Welcome {
        session: SessionState,
        roster: Vec<RosterEntry>,
        drawing: DrawingDocument,
    },
    SessionChanged { session: SessionState },
    RosterChanged { roster: Vec<RosterEntry> },
    /// Strokes appended to the log, starting at index `offset`
    DrawingAppended { offset: usize, strokes: Vec<Stroke> },
    /// The whole drawing document (clear signal or resync)
    DrawingReplaced { drawing: DrawingDocument },
    AttemptPosted { attempt: Attempt },
    /// Command `seq` was applied (or was a duplicate)
    Ack { seq: u64 },
    /// Command `seq` was refused and will not be applied
    Rejected { seq: u64, reason: String },
    /// Error message
    Error { message: String },
}
