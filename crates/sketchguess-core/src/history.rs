//! Snapshot history for undo/redo.
//!
//! History is local to the active drawer. Only its effects travel over the
//! network: every undo or redo is announced to viewers as a clear signal,
//! never as a content delta.

use std::collections::VecDeque;

use crate::session::SessionStatus;
use crate::surface::{Snapshot, Surface, SurfaceError};

/// Maximum number of snapshots kept.
pub const MAX_HISTORY: usize = 30;

/// The slice of session state the history manager needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawerScope {
    pub is_drawer: bool,
    pub status: Option<SessionStatus>,
}

impl DrawerScope {
    /// History only records while the local user is drawing a live round.
    pub fn is_active(&self) -> bool {
        self.is_drawer && self.status == Some(SessionStatus::InProgress)
    }
}

/// Bounded snapshot stack with a movable pointer.
///
/// Entries after the pointer are redo states. Pushing while the pointer is not
/// at the tail discards them.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: VecDeque<Snapshot>,
    pointer: Option<usize>,
    capacity: usize,
}

impl HistoryStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(MAX_HISTORY) + 1),
            pointer: None,
            capacity: capacity.max(1),
        }
    }

    /// Push a snapshot; the pointer ends on it.
    pub fn push(&mut self, snapshot: Snapshot) {
        // Drop redo states
        let keep = self.pointer.map_or(0, |p| p + 1);
        self.entries.truncate(keep);

        self.entries.push_back(snapshot);
        self.pointer = Some(self.entries.len() - 1);

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.pointer = self.pointer.and_then(|p| p.checked_sub(1));
        }
    }

    /// Move the pointer one step back. Returns the new pointer.
    pub fn step_back(&mut self) -> Option<usize> {
        match self.pointer {
            Some(p) if p > 0 => {
                self.pointer = Some(p - 1);
                self.pointer
            }
            _ => None,
        }
    }

    /// Move the pointer one step forward. Returns the new pointer.
    pub fn step_forward(&mut self) -> Option<usize> {
        let next = self.pointer.map_or(0, |p| p + 1);
        if next < self.entries.len() {
            self.pointer = Some(next);
            self.pointer
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.entries.get(index)
    }

    /// Current pointer; `None` when nothing has been recorded.
    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        self.pointer.is_some_and(|p| p > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.pointer.map_or(0, |p| p + 1) < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = None;
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

/// What an undo or redo did to the local surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Nothing happened; no clear signal must be sent.
    Ignored,
    /// A snapshot was restored.
    Restored,
    /// No snapshot at the new pointer; the surface was wiped.
    Cleared,
}

impl HistoryOutcome {
    /// Whether viewers must be told to reset.
    pub fn needs_clear_signal(self) -> bool {
        !matches!(self, HistoryOutcome::Ignored)
    }
}

/// Records and replays surface snapshots for the local drawer.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    stack: HistoryStack,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            stack: HistoryStack::new(capacity),
        }
    }

    pub fn stack(&self) -> &HistoryStack {
        &self.stack
    }

    /// Capture the surface and push it. No-op outside an active drawing turn.
    ///
    /// Returns whether a snapshot was recorded.
    pub fn record_state<S: Surface>(
        &mut self,
        scope: DrawerScope,
        surface: &S,
    ) -> Result<bool, SurfaceError> {
        if !scope.is_active() {
            return Ok(false);
        }
        let snapshot = surface.capture_snapshot()?;
        self.stack.push(snapshot);
        log::debug!(
            "History recorded ({} entries, pointer {:?})",
            self.stack.len(),
            self.stack.pointer()
        );
        Ok(true)
    }

    /// Step back one snapshot.
    pub fn undo<S: Surface>(
        &mut self,
        scope: DrawerScope,
        surface: &mut S,
    ) -> Result<HistoryOutcome, SurfaceError> {
        if !scope.is_drawer {
            return Ok(HistoryOutcome::Ignored);
        }
        match self.stack.step_back() {
            Some(pointer) => self.show(pointer, surface),
            None => Ok(HistoryOutcome::Ignored),
        }
    }

    /// Step forward one snapshot.
    pub fn redo<S: Surface>(
        &mut self,
        scope: DrawerScope,
        surface: &mut S,
    ) -> Result<HistoryOutcome, SurfaceError> {
        if !scope.is_drawer {
            return Ok(HistoryOutcome::Ignored);
        }
        match self.stack.step_forward() {
            Some(pointer) => self.show(pointer, surface),
            None => Ok(HistoryOutcome::Ignored),
        }
    }

    /// Forget everything (new turn or new round).
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    fn show<S: Surface>(&self, pointer: usize, surface: &mut S) -> Result<HistoryOutcome, SurfaceError> {
        match self.stack.get(pointer) {
            Some(snapshot) => {
                surface.restore_snapshot(snapshot)?;
                Ok(HistoryOutcome::Restored)
            }
            None => {
                surface.clear();
                Ok(HistoryOutcome::Cleared)
            }
        }
    }
}
