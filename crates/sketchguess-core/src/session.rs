//! Session state machine.
//!
//! The round phase is owned by the game-control authority; this side only
//! observes it and derives what the local user may do and see.

use serde::{Deserialize, Serialize};

use crate::history::DrawerScope;
use crate::roster::RosterEntry;
use crate::sync::SyncMode;

/// Round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Lobby,
    InProgress,
    End,
}

/// The single active session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub status: SessionStatus,
    #[serde(default)]
    pub drawer_id: Option<String>,
    #[serde(default)]
    pub current_word: Option<String>,
    /// Seconds left in the turn.
    #[serde(default)]
    pub timer: u32,
}

impl SessionState {
    pub fn lobby() -> Self {
        Self {
            status: SessionStatus::Lobby,
            drawer_id: None,
            current_word: None,
            timer: 0,
        }
    }

    /// Copy with the secret word removed.
    pub fn masked(&self) -> Self {
        Self {
            current_word: None,
            ..self.clone()
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::lobby()
    }
}

/// Which screen the UI should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    #[default]
    Lobby,
    Game,
    GameEnd,
}

/// Text shown in place of the word for guessers.
pub const MASKED_WORD: &str = "????";

/// Mode flags surfaced to the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMode {
    pub screen: Screen,
    pub drawing_enabled: bool,
    pub guessing_enabled: bool,
    pub word_visible: bool,
    pub teacher_controls_visible: bool,
    /// The word when visible, otherwise `None`.
    pub word: Option<String>,
    pub drawer_id: Option<String>,
    pub timer: u32,
}

impl ViewMode {
    /// Word as the UI should print it.
    pub fn word_label(&self) -> &str {
        match (&self.word, self.word_visible) {
            (Some(word), true) => word,
            _ => MASKED_WORD,
        }
    }
}

/// What changed after observing a session record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTransition {
    /// Set when the status differs from the previous observation.
    pub entered: Option<SessionStatus>,
    /// Set when `is_drawer` flipped (or on the first observation).
    pub drawer_changed: Option<bool>,
}

/// Derives role, mode and permissions from the session and roster feeds.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    local_user_id: String,
    session: Option<SessionState>,
    is_drawer: bool,
    is_teacher: bool,
}

impl SessionMachine {
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            session: None,
            is_drawer: false,
            is_teacher: false,
        }
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn is_drawer(&self) -> bool {
        self.is_drawer
    }

    pub fn is_teacher(&self) -> bool {
        self.is_teacher
    }

    /// Observe a new session record.
    pub fn observe_session(&mut self, state: SessionState) -> SessionTransition {
        let previous_status = self.status();
        let first = self.session.is_none();
        let is_drawer = state.drawer_id.as_deref() == Some(self.local_user_id.as_str());

        let mut transition = SessionTransition::default();
        if previous_status != Some(state.status) {
            transition.entered = Some(state.status);
        }
        if first || is_drawer != self.is_drawer {
            transition.drawer_changed = Some(is_drawer);
        }

        if let Some(status) = transition.entered {
            log::info!("Session entered {:?} (drawer: {})", status, is_drawer);
        }

        self.is_drawer = is_drawer;
        self.session = Some(state);
        transition
    }

    /// Observe the roster. Returns whether the teacher role changed.
    ///
    /// The role only ever comes from the roster entry keyed by the local user,
    /// never from the session record.
    pub fn observe_roster(&mut self, roster: &[RosterEntry]) -> bool {
        let is_teacher = roster
            .iter()
            .find(|entry| entry.id == self.local_user_id)
            .is_some_and(RosterEntry::is_teacher);
        let changed = is_teacher != self.is_teacher;
        self.is_teacher = is_teacher;
        changed
    }

    /// Role and phase slice for the history manager.
    pub fn drawer_scope(&self) -> DrawerScope {
        DrawerScope {
            is_drawer: self.is_drawer,
            status: self.status(),
        }
    }

    /// Direction for the sync engine.
    pub fn sync_mode(&self) -> SyncMode {
        if self.is_drawer {
            SyncMode::Publishing
        } else {
            SyncMode::Following
        }
    }

    /// Current UI mode.
    pub fn mode(&self) -> ViewMode {
        let Some(session) = &self.session else {
            // Not observed yet: lobby without controls
            return ViewMode {
                teacher_controls_visible: self.is_teacher,
                ..ViewMode::default()
            };
        };

        let base = ViewMode {
            drawer_id: session.drawer_id.clone(),
            timer: session.timer,
            ..ViewMode::default()
        };

        match session.status {
            SessionStatus::Lobby => ViewMode {
                screen: Screen::Lobby,
                teacher_controls_visible: self.is_teacher,
                ..base
            },
            SessionStatus::InProgress if self.is_drawer => ViewMode {
                screen: Screen::Game,
                drawing_enabled: true,
                word_visible: true,
                word: session.current_word.clone(),
                ..base
            },
            SessionStatus::InProgress => ViewMode {
                screen: Screen::Game,
                guessing_enabled: true,
                ..base
            },
            SessionStatus::End => ViewMode {
                screen: Screen::GameEnd,
                teacher_controls_visible: self.is_teacher,
                word_visible: session.current_word.is_some(),
                word: session.current_word.clone(),
                ..base
            },
        }
    }
}
