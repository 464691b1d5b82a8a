//! In-memory store for the single active session.
//!
//! Holds the three shared resources (session, roster, drawing log) plus the
//! guess feed, and enforces single-writer discipline on each of them. The
//! store is synchronous; the socket layer wraps it in a mutex.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use sketchguess_core::protocol::{Attempt, ClientMessage, ServerMessage};
use sketchguess_core::roster::{self, ProfileUpsert, RosterEntry, TEACHER_ROLE};
use sketchguess_core::session::{SessionState, SessionStatus};
use sketchguess_core::stroke::Stroke;
use sketchguess_core::sync::{ClearSignal, DrawingDocument};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServerConfig;

/// Reasons a sequenced command is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Only the drawer can {0}")]
    NotDrawer(&'static str),
    #[error("Only a teacher can {0}")]
    NotTeacher(&'static str),
    #[error("Profiles can only be written by their owner")]
    ForeignProfile,
    #[error("Guessing is closed")]
    GuessingClosed,
    #[error("A round can only start from the lobby")]
    NotInLobby,
    #[error("No round in progress")]
    NoRound,
    #[error("No prompts given")]
    NoPrompts,
    #[error("No players have joined")]
    NoPlayers,
    #[error("A clear signal must set `cleared`")]
    ClearFlagUnset,
    #[error("Say hello first")]
    NoHello,
}

/// Identity of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    pub user_id: String,
    pub instance: Uuid,
}

/// A change every connection should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast {
    /// Rendered per recipient, since the word is secret
    Session(SessionState),
    Message(ServerMessage),
}

impl Broadcast {
    /// The message as `user_id` should see it.
    pub fn render(&self, user_id: &str, config: &ServerConfig) -> ServerMessage {
        match self {
            Broadcast::Session(state) => ServerMessage::SessionChanged {
                session: session_view(state, user_id, config),
            },
            Broadcast::Message(message) => message.clone(),
        }
    }
}

/// Result of applying one client message.
#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    /// Sent back to the sender only
    pub direct: Vec<ServerMessage>,
    /// Sent to every connection
    pub broadcast: Vec<Broadcast>,
}

/// The session as `user_id` may see it.
pub fn session_view(state: &SessionState, user_id: &str, config: &ServerConfig) -> SessionState {
    let is_drawer = state.drawer_id.as_deref() == Some(user_id);
    if is_drawer || config.is_teacher(user_id) || state.status == SessionStatus::End {
        state.clone()
    } else {
        state.masked()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub struct Store {
    config: ServerConfig,
    session: SessionState,
    roster: HashMap<String, RosterEntry>,
    drawing: DrawingDocument,
    prompts: VecDeque<String>,
    attempts: Vec<Attempt>,
    /// Highest applied sequence number per client instance
    applied: HashMap<Peer, u64>,
}

impl Store {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: SessionState::lobby(),
            roster: HashMap::new(),
            drawing: DrawingDocument::empty(),
            prompts: VecDeque::new(),
            attempts: Vec::new(),
            applied: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn drawing(&self) -> &DrawingDocument {
        &self.drawing
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Roster ordered by score.
    pub fn roster(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self.roster.values().cloned().collect();
        roster::sort_by_score(&mut entries);
        entries
    }

    /// Everything a new connection needs.
    pub fn welcome(&self, user_id: &str) -> ServerMessage {
        ServerMessage::Welcome {
            session: session_view(&self.session, user_id, &self.config),
            roster: self.roster(),
            drawing: self.drawing.clone(),
        }
    }

    /// Apply one message from `peer` (`None` until it said hello).
    pub fn apply(&mut self, peer: Option<&Peer>, message: ClientMessage) -> Reply {
        let mut reply = Reply::default();

        let peer = match (peer, &message) {
            (_, ClientMessage::Hello { user_id, .. }) => {
                reply.direct.push(self.welcome(user_id));
                return reply;
            }
            (Some(peer), _) => peer,
            (None, _) => {
                reply.direct.push(ServerMessage::Error {
                    message: StoreError::NoHello.to_string(),
                });
                return reply;
            }
        };

        let Some(seq) = message.seq() else {
            // Only resync is unsequenced after hello
            reply.direct.push(ServerMessage::DrawingReplaced {
                drawing: self.drawing.clone(),
            });
            return reply;
        };

        let last = self.applied.get(peer).copied().unwrap_or(0);
        if seq <= last {
            debug!("Duplicate command #{} from {}", seq, peer.user_id);
            reply.direct.push(ServerMessage::Ack { seq });
            return reply;
        }
        self.applied.insert(peer.clone(), seq);

        match self.execute(&peer.user_id, message, &mut reply.broadcast) {
            Ok(()) => reply.direct.push(ServerMessage::Ack { seq }),
            Err(e) => {
                info!("Rejected command #{} from {}: {}", seq, peer.user_id, e);
                reply.direct.push(ServerMessage::Rejected {
                    seq,
                    reason: e.to_string(),
                });
            }
        }
        reply
    }

    fn execute(
        &mut self,
        user_id: &str,
        message: ClientMessage,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        match message {
            ClientMessage::UpsertProfile { profile, .. } => self.upsert_profile(user_id, profile, out),
            ClientMessage::AppendStrokes { strokes, .. } => self.append_strokes(user_id, strokes, out),
            ClientMessage::ClearDrawing { signal, .. } => self.clear_drawing(user_id, signal, out),
            ClientMessage::SubmitGuess { guess, .. } => self.submit_guess(user_id, guess, out),
            ClientMessage::StartRound { prompts, .. } => self.start_round(user_id, prompts, out),
            ClientMessage::EndRound { .. } => {
                self.require_teacher(user_id, "end the round")?;
                if self.session.status != SessionStatus::InProgress {
                    return Err(StoreError::NoRound);
                }
                self.set_status(SessionStatus::End, out);
                Ok(())
            }
            ClientMessage::OpenLobby { .. } => {
                self.require_teacher(user_id, "return to the lobby")?;
                self.session.current_word = None;
                self.session.timer = 0;
                self.set_status(SessionStatus::Lobby, out);
                Ok(())
            }
            ClientMessage::Hello { .. } | ClientMessage::ResyncDrawing => Ok(()),
        }
    }

    fn upsert_profile(
        &mut self,
        user_id: &str,
        profile: ProfileUpsert,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        if profile.id != user_id {
            return Err(StoreError::ForeignProfile);
        }
        let role = self.config.is_teacher(user_id).then(|| TEACHER_ROLE.to_string());
        let entry = self.roster.entry(profile.id.clone()).or_insert_with(|| RosterEntry {
            id: profile.id.clone(),
            username: String::new(),
            current_points: 0,
            role,
        });
        // Merge: role is never taken from the write
        entry.username = profile.username;
        entry.current_points = profile.current_points;
        info!("Profile {} is now {:?}", entry.id, entry.username);

        out.push(Broadcast::Message(ServerMessage::RosterChanged {
            roster: self.roster(),
        }));
        Ok(())
    }

    fn require_drawer(&self, user_id: &str, what: &'static str) -> Result<(), StoreError> {
        if self.session.drawer_id.as_deref() == Some(user_id) {
            Ok(())
        } else {
            Err(StoreError::NotDrawer(what))
        }
    }

    fn require_teacher(&self, user_id: &str, what: &'static str) -> Result<(), StoreError> {
        if self.config.is_teacher(user_id) {
            Ok(())
        } else {
            Err(StoreError::NotTeacher(what))
        }
    }

    fn append_strokes(
        &mut self,
        user_id: &str,
        strokes: Vec<Stroke>,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        self.require_drawer(user_id, "draw")?;
        let offset = self.drawing.len();
        self.drawing.append(&strokes);
        debug!("Appended {} strokes at {}", strokes.len(), offset);
        out.push(Broadcast::Message(ServerMessage::DrawingAppended { offset, strokes }));
        Ok(())
    }

    fn clear_drawing(
        &mut self,
        user_id: &str,
        signal: ClearSignal,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        self.require_drawer(user_id, "clear the drawing")?;
        if !signal.cleared {
            return Err(StoreError::ClearFlagUnset);
        }
        self.replace_drawing(DrawingDocument::Cleared(signal), out);
        Ok(())
    }

    fn replace_drawing(&mut self, drawing: DrawingDocument, out: &mut Vec<Broadcast>) {
        self.drawing = drawing;
        out.push(Broadcast::Message(ServerMessage::DrawingReplaced {
            drawing: self.drawing.clone(),
        }));
    }

    fn submit_guess(
        &mut self,
        user_id: &str,
        guess: String,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        let is_drawer = self.session.drawer_id.as_deref() == Some(user_id);
        if self.session.status != SessionStatus::InProgress || is_drawer {
            return Err(StoreError::GuessingClosed);
        }
        let guess = guess.trim();
        if guess.is_empty() {
            return Ok(());
        }
        let username = self
            .roster
            .get(user_id)
            .map_or_else(|| user_id.to_string(), |e| e.username.clone());
        let attempt = Attempt {
            user_id: user_id.to_string(),
            username,
            guess: guess.to_string(),
            timestamp: now_millis(),
        };
        self.attempts.push(attempt.clone());
        out.push(Broadcast::Message(ServerMessage::AttemptPosted { attempt }));
        Ok(())
    }

    fn start_round(
        &mut self,
        user_id: &str,
        prompts: Vec<String>,
        out: &mut Vec<Broadcast>,
    ) -> Result<(), StoreError> {
        self.require_teacher(user_id, "start a round")?;
        if self.session.status != SessionStatus::Lobby {
            return Err(StoreError::NotInLobby);
        }
        let mut prompts: VecDeque<String> = prompts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let word = prompts.pop_front().ok_or(StoreError::NoPrompts)?;
        let drawer = self
            .roster()
            .into_iter()
            .find(|e| !e.is_teacher())
            .ok_or(StoreError::NoPlayers)?;

        if !self.drawing.is_empty() {
            self.replace_drawing(DrawingDocument::Cleared(ClearSignal::new(now_millis())), out);
        }

        info!("Round started: {} draws, {} prompts left", drawer.id, prompts.len());
        self.prompts = prompts;
        self.attempts.clear();
        self.session.drawer_id = Some(drawer.id);
        self.session.current_word = Some(word);
        self.session.timer = self.config.round_seconds;
        self.set_status(SessionStatus::InProgress, out);
        Ok(())
    }

    fn set_status(&mut self, status: SessionStatus, out: &mut Vec<Broadcast>) {
        info!("Session {:?} -> {:?}", self.session.status, status);
        self.session.status = status;
        out.push(Broadcast::Session(self.session.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use sketchguess_core::stroke::StrokeStyle;

    fn config() -> ServerConfig {
        ServerConfig {
            teachers: ["t1".to_string()].into_iter().collect(),
            ..ServerConfig::default()
        }
    }

    fn peer(id: &str) -> Peer {
        Peer {
            user_id: id.to_string(),
            instance: Uuid::new_v4(),
        }
    }

    fn stroke() -> Stroke {
        Stroke::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0), &StrokeStyle::default()).unwrap()
    }

    fn join(store: &mut Store, peer: &Peer, seq: u64, name: &str) {
        let profile = ProfileUpsert::join(&peer.user_id, name).unwrap();
        store.apply(Some(peer), ClientMessage::UpsertProfile { seq, profile });
    }

    /// Teacher t1 and player u1 joined, round started with u1 drawing.
    fn running() -> (Store, Peer, Peer) {
        let mut store = Store::new(config());
        let teacher = peer("t1");
        let player = peer("u1");
        join(&mut store, &teacher, 1, "Teacher");
        join(&mut store, &player, 1, "Player");
        store.apply(
            Some(&teacher),
            ClientMessage::StartRound {
                seq: 2,
                prompts: vec!["apple".to_string(), "pear".to_string()],
            },
        );
        (store, teacher, player)
    }

    #[test]
    fn test_hello_gets_welcome() {
        let mut store = Store::new(config());
        let reply = store.apply(
            None,
            ClientMessage::Hello {
                user_id: "u1".to_string(),
                instance: Uuid::new_v4(),
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Welcome { .. }));

        let reply = store.apply(None, ClientMessage::EndRound { seq: 1 });
        assert!(matches!(reply.direct[0], ServerMessage::Error { .. }));
    }

    #[test]
    fn test_roles_come_from_config_only() {
        let mut store = Store::new(config());
        join(&mut store, &peer("t1"), 1, "Teacher");
        join(&mut store, &peer("u1"), 1, "Player");

        let roster = store.roster();
        let teacher = roster.iter().find(|e| e.id == "t1").unwrap();
        let player = roster.iter().find(|e| e.id == "u1").unwrap();
        assert!(teacher.is_teacher());
        assert_eq!(player.role, None);
    }

    #[test]
    fn test_profile_merge_keeps_role() {
        let mut store = Store::new(config());
        let teacher = peer("t1");
        join(&mut store, &teacher, 1, "Teacher");
        join(&mut store, &teacher, 2, "Renamed");
        let entry = store.roster().into_iter().find(|e| e.id == "t1").unwrap();
        assert_eq!(entry.username, "Renamed");
        assert!(entry.is_teacher());
    }

    #[test]
    fn test_foreign_profile_rejected() {
        let mut store = Store::new(config());
        let profile = ProfileUpsert::join("someone-else", "Mallory").unwrap();
        let reply = store.apply(Some(&peer("u1")), ClientMessage::UpsertProfile { seq: 1, profile });
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { seq: 1, .. }));
        assert!(store.roster().is_empty());
    }

    #[test]
    fn test_start_round_picks_player_and_word() {
        let (store, _, _) = running();
        let session = store.session();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.drawer_id.as_deref(), Some("u1"));
        assert_eq!(session.current_word.as_deref(), Some("apple"));
        assert_eq!(session.timer, store.config().round_seconds);
    }

    #[test]
    fn test_start_round_rules() {
        let mut store = Store::new(config());
        let teacher = peer("t1");
        let player = peer("u1");
        join(&mut store, &teacher, 1, "Teacher");

        let reply = store.apply(
            Some(&teacher),
            ClientMessage::StartRound {
                seq: 2,
                prompts: vec!["cat".to_string()],
            },
        );
        assert_eq!(
            reply.direct,
            vec![ServerMessage::Rejected {
                seq: 2,
                reason: StoreError::NoPlayers.to_string(),
            }]
        );

        join(&mut store, &player, 1, "Player");
        let reply = store.apply(
            Some(&player),
            ClientMessage::StartRound {
                seq: 2,
                prompts: vec!["cat".to_string()],
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { .. }));

        let reply = store.apply(
            Some(&teacher),
            ClientMessage::StartRound {
                seq: 3,
                prompts: vec![" ".to_string()],
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { .. }));
        assert_eq!(store.session().status, SessionStatus::Lobby);
    }

    #[test]
    fn test_only_drawer_writes_drawing() {
        let (mut store, teacher, player) = running();

        let reply = store.apply(
            Some(&teacher),
            ClientMessage::AppendStrokes {
                seq: 3,
                strokes: vec![stroke()],
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { seq: 3, .. }));
        assert!(store.drawing().is_empty());

        let reply = store.apply(
            Some(&player),
            ClientMessage::AppendStrokes {
                seq: 2,
                strokes: vec![stroke(), stroke()],
            },
        );
        assert_eq!(reply.direct, vec![ServerMessage::Ack { seq: 2 }]);
        assert_eq!(
            reply.broadcast,
            vec![Broadcast::Message(ServerMessage::DrawingAppended {
                offset: 0,
                strokes: vec![stroke(), stroke()],
            })]
        );
        assert_eq!(store.drawing().len(), 2);
    }

    #[test]
    fn test_retried_append_applies_once() {
        let (mut store, _, player) = running();
        let append = ClientMessage::AppendStrokes {
            seq: 2,
            strokes: vec![stroke()],
        };
        store.apply(Some(&player), append.clone());
        let reply = store.apply(Some(&player), append);

        assert_eq!(reply.direct, vec![ServerMessage::Ack { seq: 2 }]);
        assert!(reply.broadcast.is_empty());
        assert_eq!(store.drawing().len(), 1);

        // A restarted client has a fresh namespace
        let restarted = peer("u1");
        store.apply(
            Some(&restarted),
            ClientMessage::AppendStrokes {
                seq: 1,
                strokes: vec![stroke()],
            },
        );
        assert_eq!(store.drawing().len(), 2);
    }

    #[test]
    fn test_clear_replaces_document() {
        let (mut store, _, player) = running();
        store.apply(
            Some(&player),
            ClientMessage::AppendStrokes {
                seq: 2,
                strokes: vec![stroke()],
            },
        );
        let reply = store.apply(
            Some(&player),
            ClientMessage::ClearDrawing {
                seq: 3,
                signal: ClearSignal::new(10),
            },
        );
        assert_eq!(
            reply.broadcast,
            vec![Broadcast::Message(ServerMessage::DrawingReplaced {
                drawing: DrawingDocument::Cleared(ClearSignal::new(10)),
            })]
        );

        // The next append starts a fresh log at offset 0
        let reply = store.apply(
            Some(&player),
            ClientMessage::AppendStrokes {
                seq: 4,
                strokes: vec![stroke()],
            },
        );
        assert!(matches!(
            reply.broadcast[0],
            Broadcast::Message(ServerMessage::DrawingAppended { offset: 0, .. })
        ));
    }

    #[test]
    fn test_word_is_masked_for_guessers() {
        let (store, _, _) = running();
        let config = store.config().clone();
        let broadcast = Broadcast::Session(store.session().clone());

        let word_for = |user: &str| match broadcast.render(user, &config) {
            ServerMessage::SessionChanged { session } => session.current_word,
            _ => panic!("expected a session message"),
        };
        assert_eq!(word_for("u1").as_deref(), Some("apple"));
        assert_eq!(word_for("t1").as_deref(), Some("apple"));
        assert_eq!(word_for("u2"), None);

        let mut ended = store.session().clone();
        ended.status = SessionStatus::End;
        assert_eq!(session_view(&ended, "u2", &config).current_word.as_deref(), Some("apple"));
    }

    #[test]
    fn test_guesses_are_relayed() {
        let (mut store, teacher, player) = running();
        let guesser = peer("u2");
        join(&mut store, &guesser, 1, "Guesser");

        let reply = store.apply(
            Some(&guesser),
            ClientMessage::SubmitGuess {
                seq: 2,
                guess: " apple ".to_string(),
            },
        );
        assert_eq!(reply.direct, vec![ServerMessage::Ack { seq: 2 }]);
        assert_eq!(store.attempts()[0].guess, "apple");
        assert_eq!(store.attempts()[0].username, "Guesser");

        let reply = store.apply(
            Some(&player),
            ClientMessage::SubmitGuess {
                seq: 2,
                guess: "apple".to_string(),
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { .. }));

        store.apply(Some(&teacher), ClientMessage::EndRound { seq: 3 });
        let reply = store.apply(
            Some(&guesser),
            ClientMessage::SubmitGuess {
                seq: 3,
                guess: "pear".to_string(),
            },
        );
        assert!(matches!(reply.direct[0], ServerMessage::Rejected { .. }));
    }

    #[test]
    fn test_round_lifecycle() {
        let (mut store, teacher, player) = running();
        store.apply(Some(&teacher), ClientMessage::EndRound { seq: 3 });
        assert_eq!(store.session().status, SessionStatus::End);

        store.apply(Some(&teacher), ClientMessage::OpenLobby { seq: 4 });
        assert_eq!(store.session().status, SessionStatus::Lobby);
        // The last drawer may still publish the lobby clear
        assert_eq!(store.session().drawer_id.as_deref(), Some("u1"));
        let reply = store.apply(
            Some(&player),
            ClientMessage::ClearDrawing {
                seq: 2,
                signal: ClearSignal::new(1),
            },
        );
        assert_eq!(reply.direct, vec![ServerMessage::Ack { seq: 2 }]);
    }

    #[test]
    fn test_clear_without_flag_is_rejected() {
        let (mut store, _, player) = running();
        store.apply(
            Some(&player),
            ClientMessage::AppendStrokes {
                seq: 2,
                strokes: vec![stroke()],
            },
        );
        let reply = store.apply(
            Some(&player),
            ClientMessage::ClearDrawing {
                seq: 3,
                signal: ClearSignal {
                    cleared: false,
                    timestamp: 1,
                },
            },
        );
        assert_eq!(
            reply.direct,
            vec![ServerMessage::Rejected {
                seq: 3,
                reason: StoreError::ClearFlagUnset.to_string(),
            }]
        );
        assert!(reply.broadcast.is_empty());
        assert_eq!(store.drawing().lines(), &[stroke()]);
    }

    #[test]
    fn test_resync_returns_document() {
        let (mut store, _, player) = running();
        store.apply(
            Some(&player),
            ClientMessage::AppendStrokes {
                seq: 2,
                strokes: vec![stroke()],
            },
        );
        let reply = store.apply(Some(&player), ClientMessage::ResyncDrawing);
        assert_eq!(
            reply.direct,
            vec![ServerMessage::DrawingReplaced {
                drawing: DrawingDocument::Lines {
                    lines: vec![stroke()],
                },
            }]
        );
    }
}
