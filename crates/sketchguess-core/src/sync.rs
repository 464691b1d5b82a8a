//! Drawing sync engine.
//!
//! The drawer converts pointer drags into strokes, paints them locally and
//! buffers them for publishing. Viewers consume the shared drawing log and
//! replay only the entries they have not rendered yet. A clear signal resets
//! everyone's cursor, since the log is append-only and cannot be rolled back
//! in place.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::stroke::Stroke;
use crate::surface::Surface;

/// Out-of-band reset of the drawing log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSignal {
    pub cleared: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ClearSignal {
    pub fn new(timestamp: u64) -> Self {
        Self {
            cleared: true,
            timestamp,
        }
    }
}

/// Current value of the shared drawing document.
///
/// Either a clear signal or the full ordered list of strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrawingDocument {
    Cleared(ClearSignal),
    Lines { lines: Vec<Stroke> },
}

impl DrawingDocument {
    pub fn empty() -> Self {
        DrawingDocument::Lines { lines: Vec::new() }
    }

    /// Strokes in the document (empty when cleared).
    pub fn lines(&self) -> &[Stroke] {
        match self {
            DrawingDocument::Cleared(_) => &[],
            DrawingDocument::Lines { lines } => lines,
        }
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    /// Append strokes; a cleared document becomes a fresh log.
    pub fn append(&mut self, strokes: &[Stroke]) {
        match self {
            DrawingDocument::Cleared(_) => {
                *self = DrawingDocument::Lines {
                    lines: strokes.to_vec(),
                }
            }
            DrawingDocument::Lines { lines } => lines.extend_from_slice(strokes),
        }
    }
}

impl Default for DrawingDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Number of log entries already rendered locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub last_seen_length: usize,
}

/// Which half of the engine is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Local input is drawn and published.
    Publishing,
    /// The shared log is replayed.
    #[default]
    Following,
}

/// A batch of strokes ready to be appended to the shared log.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeBatch {
    pub strokes: Vec<Stroke>,
}

impl StrokeBatch {
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

/// Result of feeding a notification to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// The engine is publishing; the drawer does not read its own writes.
    Ignored,
    /// A clear signal was honoured.
    Cleared,
    /// This many new strokes were painted.
    Applied(usize),
    /// The log broke its append-only contract. The surface was wiped and the
    /// cursor reset; a full resync is needed.
    Violation(String),
}

impl ReplayOutcome {
    pub fn changed_surface(&self) -> bool {
        match self {
            ReplayOutcome::Ignored => false,
            ReplayOutcome::Applied(n) => *n > 0,
            ReplayOutcome::Cleared | ReplayOutcome::Violation(_) => true,
        }
    }
}

/// Batches local strokes and replays remote ones.
#[derive(Debug, Clone, Default)]
pub struct DrawingSync {
    mode: SyncMode,
    cursor: SyncCursor,
    /// Last entry rendered, used to detect a rewritten log.
    last_entry: Option<Stroke>,
    /// Strokes drawn locally and not yet handed out for publishing.
    outgoing: Vec<Stroke>,
}

impl DrawingSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn cursor(&self) -> SyncCursor {
        self.cursor
    }

    /// Number of strokes buffered for the next batch.
    pub fn pending(&self) -> usize {
        self.outgoing.len()
    }

    /// Switch direction.
    ///
    /// The cursor carries over: whatever is on the local surface is already
    /// part of the log, so a former drawer does not replay its own strokes.
    pub fn set_mode(&mut self, mode: SyncMode) {
        if self.mode != mode {
            log::info!("Drawing sync switching to {:?}", mode);
            self.mode = mode;
        }
    }

    /// Forget the cursor and any buffered strokes.
    pub fn reset(&mut self) {
        self.cursor = SyncCursor::default();
        self.last_entry = None;
        self.outgoing.clear();
    }

    // --- Write path ---

    /// Paint a locally drawn stroke and queue it for publishing.
    pub fn record_local<S: Surface>(&mut self, stroke: Stroke, surface: &mut S) -> Result<(), ClientError> {
        if self.mode != SyncMode::Publishing {
            return Err(ClientError::PermissionDenied(
                "only the drawer can draw".to_string(),
            ));
        }
        surface.apply_stroke(&stroke);
        self.cursor.last_seen_length += 1;
        self.last_entry = Some(stroke.clone());
        self.outgoing.push(stroke);
        Ok(())
    }

    /// Hand out the buffered strokes as one batch and empty the buffer.
    pub fn take_batch(&mut self) -> Option<StrokeBatch> {
        if self.mode != SyncMode::Publishing || self.outgoing.is_empty() {
            return None;
        }
        Some(StrokeBatch {
            strokes: std::mem::take(&mut self.outgoing),
        })
    }

    /// The drawer wiped the log (clear button, undo, lobby).
    ///
    /// Buffered strokes must be taken before this call if they are to be
    /// published ahead of the clear.
    pub fn local_clear(&mut self) -> Result<(), ClientError> {
        if self.mode != SyncMode::Publishing {
            return Err(ClientError::PermissionDenied(
                "only the drawer can clear the drawing".to_string(),
            ));
        }
        self.reset();
        Ok(())
    }

    // --- Read path ---

    /// Handle a full drawing document notification.
    pub fn on_document<S: Surface>(&mut self, document: &DrawingDocument, surface: &mut S) -> ReplayOutcome {
        if self.mode == SyncMode::Publishing {
            return ReplayOutcome::Ignored;
        }

        let lines = match document {
            DrawingDocument::Cleared(signal) if signal.cleared => {
                surface.clear();
                self.reset();
                log::debug!("Drawing cleared by remote signal");
                return ReplayOutcome::Cleared;
            }
            // Without the flag the document carries no strokes and clears nothing
            DrawingDocument::Cleared(_) => return ReplayOutcome::Applied(0),
            DrawingDocument::Lines { lines } => lines,
        };

        let seen = self.cursor.last_seen_length;
        if lines.len() < seen {
            return self.violation(
                surface,
                format!("log shrank from {} to {} without a clear", seen, lines.len()),
            );
        }
        if seen > 0 && self.last_entry.as_ref() != Some(&lines[seen - 1]) {
            return self.violation(surface, format!("entry {} changed after publish", seen - 1));
        }

        self.replay(&lines[seen..], surface)
    }

    /// Handle an incremental append starting at `offset`.
    pub fn on_appended<S: Surface>(&mut self, offset: usize, strokes: &[Stroke], surface: &mut S) -> ReplayOutcome {
        if self.mode == SyncMode::Publishing {
            return ReplayOutcome::Ignored;
        }

        let seen = self.cursor.last_seen_length;
        if offset > seen {
            return self.violation(
                surface,
                format!("gap in log: expected offset {}, got {}", seen, offset),
            );
        }

        let end = offset + strokes.len();
        if end <= seen {
            // Everything here has been rendered already
            return ReplayOutcome::Applied(0);
        }
        if seen > offset && self.last_entry.as_ref() != Some(&strokes[seen - offset - 1]) {
            return self.violation(surface, format!("entry {} changed after publish", seen - 1));
        }

        self.replay(&strokes[seen - offset..], surface)
    }

    fn replay<S: Surface>(&mut self, new_entries: &[Stroke], surface: &mut S) -> ReplayOutcome {
        for stroke in new_entries {
            surface.apply_stroke(stroke);
        }
        if let Some(last) = new_entries.last() {
            self.last_entry = Some(last.clone());
        }
        self.cursor.last_seen_length += new_entries.len();
        if !new_entries.is_empty() {
            log::debug!(
                "Replayed {} strokes, cursor at {}",
                new_entries.len(),
                self.cursor.last_seen_length
            );
        }
        ReplayOutcome::Applied(new_entries.len())
    }

    fn violation<S: Surface>(&mut self, surface: &mut S, reason: String) -> ReplayOutcome {
        log::warn!("Drawing log protocol violation: {}; resetting", reason);
        surface.clear();
        self.reset();
        ReplayOutcome::Violation(reason)
    }
}
