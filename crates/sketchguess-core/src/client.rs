//! Game client controller.
//!
//! `GameClient` owns all local state for one participant and reacts to one
//! event at a time. Every reaction is a function of (state, event) and
//! returns the side effects the host must perform. Writes to the store never
//! happen directly; they are queued in the [`Outbox`] and drained by the host.

use std::time::{SystemTime, UNIX_EPOCH};

use kurbo::Point;

use crate::error::{ClientError, ClientResult};
use crate::history::{HistoryManager, HistoryOutcome};
use crate::outbox::{Command, Outbox};
use crate::protocol::{Attempt, ClientMessage, ServerMessage};
use crate::roster::{self, ProfileUpsert, RosterEntry};
use crate::session::{SessionMachine, SessionState, SessionStatus, ViewMode};
use crate::stroke::Stroke;
use crate::surface::Surface;
use crate::sync::{ClearSignal, DrawingDocument, DrawingSync, ReplayOutcome, SyncMode};
use crate::tools::{PointerEvent, PointerTracker, ToolConfig};

/// Button and form actions from the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Undo,
    Redo,
    Clear,
    Join { username: String },
    /// Newline separated prompt list
    StartRound { prompts: String },
    EndRound,
    ReturnToLobby,
    SubmitGuess { guess: String },
    SetColor(String),
    SetWidth(f64),
    SetEraser(bool),
}

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Session(SessionState),
    Roster(Vec<RosterEntry>),
    Drawing(DrawingDocument),
    DrawingAppended { offset: usize, strokes: Vec<Stroke> },
    Pointer(PointerEvent),
    Action(UiAction),
    Server(ServerMessage),
    /// Transport lost; unacknowledged commands will be resent.
    Disconnected,
}

/// Side effects for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Mode flags changed
    ModeChanged(ViewMode),
    /// The local surface was repainted
    SurfaceChanged,
    /// The roster changed (already sorted by score)
    RosterChanged(Vec<RosterEntry>),
    AttemptPosted(Attempt),
    /// User-visible message
    Notice(String),
    /// The local view of the log is broken; ask for the full document
    RequestResync,
}

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Single top-level controller for one participant.
pub struct GameClient<S: Surface> {
    surface: S,
    machine: SessionMachine,
    history: HistoryManager,
    sync: DrawingSync,
    tools: ToolConfig,
    pointer: PointerTracker,
    outbox: Outbox,
    roster: Vec<RosterEntry>,
    attempts: Vec<Attempt>,
    last_mode: Option<ViewMode>,
    clock: fn() -> u64,
}

impl<S: Surface> GameClient<S> {
    pub fn new(user_id: impl Into<String>, surface: S) -> Self {
        Self {
            surface,
            machine: SessionMachine::new(user_id),
            history: HistoryManager::default(),
            sync: DrawingSync::new(),
            tools: ToolConfig::new(),
            pointer: PointerTracker::default(),
            outbox: Outbox::new(),
            roster: Vec::new(),
            attempts: Vec::new(),
            last_mode: None,
            clock: system_millis,
        }
    }

    /// Use a different history capacity.
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history = HistoryManager::new(capacity);
        self
    }

    /// Use a different millisecond clock for clear signal timestamps.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn sync(&self) -> &DrawingSync {
        &self.sync
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn mode(&self) -> ViewMode {
        self.machine.mode()
    }

    /// Greeting that must open every connection.
    pub fn hello(&self) -> ClientMessage {
        ClientMessage::Hello {
            user_id: self.machine.local_user_id().to_string(),
            instance: self.outbox.instance(),
        }
    }

    /// Move buffered strokes into the outbox as one append.
    pub fn flush(&mut self) -> bool {
        match self.sync.take_batch() {
            Some(batch) => {
                log::debug!("Publishing batch of {} strokes", batch.len());
                self.outbox.push(Command::AppendStrokes(batch.strokes));
                true
            }
            None => false,
        }
    }

    /// Wire messages ready to send, in order.
    pub fn drain_outgoing(&mut self) -> Vec<ClientMessage> {
        self.outbox.take_unsent()
    }

    /// Feed a whole sequence of events, collecting the effects.
    pub fn run_feed<I>(&mut self, events: I) -> Vec<Effect>
    where
        I: IntoIterator<Item = ClientEvent>,
    {
        events.into_iter().flat_map(|event| self.handle(event)).collect()
    }

    /// React to one event.
    pub fn handle(&mut self, event: ClientEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        let result = match event {
            ClientEvent::Session(state) => self.on_session(state, &mut effects),
            ClientEvent::Roster(entries) => {
                self.on_roster(entries, &mut effects);
                Ok(())
            }
            ClientEvent::Drawing(document) => {
                let outcome = self.sync.on_document(&document, &mut self.surface);
                Self::replay_effects(outcome, &mut effects);
                Ok(())
            }
            ClientEvent::DrawingAppended { offset, strokes } => {
                let outcome = self.sync.on_appended(offset, &strokes, &mut self.surface);
                Self::replay_effects(outcome, &mut effects);
                Ok(())
            }
            ClientEvent::Pointer(pointer) => self.on_pointer(pointer, &mut effects),
            ClientEvent::Action(action) => self.on_action(action, &mut effects),
            ClientEvent::Server(message) => self.on_server(message, &mut effects),
            ClientEvent::Disconnected => {
                self.outbox.requeue();
                Ok(())
            }
        };

        if let Err(e) = result {
            log::warn!("{}", e);
            effects.push(Effect::Notice(e.to_string()));
        }

        let mode = self.machine.mode();
        if self.last_mode.as_ref() != Some(&mode) {
            self.last_mode = Some(mode.clone());
            effects.push(Effect::ModeChanged(mode));
        }
        effects
    }

    fn on_session(&mut self, state: SessionState, effects: &mut Vec<Effect>) -> ClientResult<()> {
        let was_drawer = self.machine.is_drawer();
        let transition = self.machine.observe_session(state);

        if transition.drawer_changed == Some(false) && was_drawer {
            self.pointer.end();
            if self.sync.pending() > 0 {
                // Unflushed strokes can no longer be published; the local
                // picture has diverged from the log
                log::warn!("Drawer role lost with {} unpublished strokes", self.sync.pending());
                self.sync.reset();
                self.surface.clear();
                effects.push(Effect::SurfaceChanged);
                effects.push(Effect::RequestResync);
            }
        }
        self.sync.set_mode(self.machine.sync_mode());

        if transition.drawer_changed.is_some() {
            self.history.reset();
        }

        match transition.entered {
            Some(SessionStatus::Lobby) => {
                self.pointer.end();
                self.history.reset();
                self.attempts.clear();
                if self.machine.is_drawer() {
                    self.sync.local_clear()?;
                    self.outbox.push(Command::ClearDrawing(self.clear_signal()));
                } else {
                    self.sync.reset();
                }
                self.surface.clear();
                effects.push(Effect::SurfaceChanged);
            }
            Some(SessionStatus::End) => {
                self.pointer.end();
                self.flush();
            }
            Some(SessionStatus::InProgress) => {
                self.history.reset();
                self.attempts.clear();
            }
            None => {}
        }

        // Baseline so the first stroke of a turn can be undone
        if (transition.entered.is_some() || transition.drawer_changed.is_some())
            && self.history.stack().is_empty()
        {
            self.history.record_state(self.machine.drawer_scope(), &self.surface)?;
        }
        Ok(())
    }

    fn on_roster(&mut self, mut entries: Vec<RosterEntry>, effects: &mut Vec<Effect>) {
        roster::sort_by_score(&mut entries);
        if self.machine.observe_roster(&entries) {
            log::info!("Teacher role is now {}", self.machine.is_teacher());
        }
        self.roster = entries;
        effects.push(Effect::RosterChanged(self.roster.clone()));
    }

    fn replay_effects(outcome: ReplayOutcome, effects: &mut Vec<Effect>) {
        if outcome.changed_surface() {
            effects.push(Effect::SurfaceChanged);
        }
        if let ReplayOutcome::Violation(reason) = outcome {
            effects.push(Effect::Notice(ClientError::ProtocolViolation(reason).to_string()));
            effects.push(Effect::RequestResync);
        }
    }

    fn on_pointer(&mut self, event: PointerEvent, effects: &mut Vec<Effect>) -> ClientResult<()> {
        match event {
            PointerEvent::Down { position } => {
                if self.machine.mode().drawing_enabled {
                    self.pointer.begin(position);
                }
            }
            PointerEvent::Move { position } => {
                if let Some((start, end)) = self.pointer.advance(position) {
                    self.draw_segment(start, end)?;
                    effects.push(Effect::SurfaceChanged);
                }
            }
            PointerEvent::Up | PointerEvent::Leave => {
                if self.pointer.end() {
                    self.flush();
                    self.history.record_state(self.machine.drawer_scope(), &self.surface)?;
                }
            }
        }
        Ok(())
    }

    fn draw_segment(&mut self, start: Point, end: Point) -> ClientResult<()> {
        if self.sync.mode() != SyncMode::Publishing {
            self.pointer.end();
            return Err(ClientError::PermissionDenied("only the drawer can draw".to_string()));
        }
        let stroke = Stroke::new(start, end, self.tools.style())?;
        self.sync.record_local(stroke, &mut self.surface)
    }

    fn on_action(&mut self, action: UiAction, effects: &mut Vec<Effect>) -> ClientResult<()> {
        match action {
            UiAction::Undo => {
                self.flush();
                let outcome = self.history.undo(self.machine.drawer_scope(), &mut self.surface)?;
                self.after_history(outcome, effects)?;
            }
            UiAction::Redo => {
                self.flush();
                let outcome = self.history.redo(self.machine.drawer_scope(), &mut self.surface)?;
                self.after_history(outcome, effects)?;
            }
            UiAction::Clear => {
                if !self.machine.is_drawer() {
                    return Err(ClientError::PermissionDenied(
                        "only the drawer can clear the drawing".to_string(),
                    ));
                }
                self.flush();
                self.sync.local_clear()?;
                self.surface.clear();
                self.outbox.push(Command::ClearDrawing(self.clear_signal()));
                self.history.record_state(self.machine.drawer_scope(), &self.surface)?;
                effects.push(Effect::SurfaceChanged);
            }
            UiAction::Join { username } => {
                let profile = ProfileUpsert::join(self.machine.local_user_id(), &username)?;
                self.outbox.push(Command::UpsertProfile(profile));
            }
            UiAction::StartRound { prompts } => {
                self.require_teacher("start a round")?;
                let prompts = parse_prompts(&prompts);
                if prompts.is_empty() {
                    effects.push(Effect::Notice("Enter at least one prompt".to_string()));
                    return Ok(());
                }
                self.outbox.push(Command::StartRound(prompts));
            }
            UiAction::EndRound => {
                self.require_teacher("end the round")?;
                self.outbox.push(Command::EndRound);
            }
            UiAction::ReturnToLobby => {
                self.require_teacher("return to the lobby")?;
                self.outbox.push(Command::OpenLobby);
            }
            UiAction::SubmitGuess { guess } => {
                if !self.machine.mode().guessing_enabled {
                    return Err(ClientError::PermissionDenied(
                        "guessing is not open".to_string(),
                    ));
                }
                let guess = guess.trim();
                if !guess.is_empty() {
                    self.outbox.push(Command::SubmitGuess(guess.to_string()));
                }
            }
            UiAction::SetColor(color) => self.tools.set_color(color),
            UiAction::SetWidth(width) => self.tools.set_width(width),
            UiAction::SetEraser(on) => self.tools.set_eraser(on),
        }
        Ok(())
    }

    /// Broadcast the effect of an undo or redo.
    fn after_history(&mut self, outcome: HistoryOutcome, effects: &mut Vec<Effect>) -> ClientResult<()> {
        if outcome.needs_clear_signal() {
            self.sync.local_clear()?;
            self.outbox.push(Command::ClearDrawing(self.clear_signal()));
            effects.push(Effect::SurfaceChanged);
        }
        Ok(())
    }

    fn on_server(&mut self, message: ServerMessage, effects: &mut Vec<Effect>) -> ClientResult<()> {
        match message {
            ServerMessage::Welcome {
                session,
                roster,
                drawing,
            } => {
                self.on_roster(roster, effects);
                self.on_session(session, effects)?;
                let outcome = self.sync.on_document(&drawing, &mut self.surface);
                Self::replay_effects(outcome, effects);
            }
            ServerMessage::SessionChanged { session } => self.on_session(session, effects)?,
            ServerMessage::RosterChanged { roster } => self.on_roster(roster, effects),
            ServerMessage::DrawingAppended { offset, strokes } => {
                let outcome = self.sync.on_appended(offset, &strokes, &mut self.surface);
                Self::replay_effects(outcome, effects);
            }
            ServerMessage::DrawingReplaced { drawing } => {
                let outcome = self.sync.on_document(&drawing, &mut self.surface);
                Self::replay_effects(outcome, effects);
            }
            ServerMessage::AttemptPosted { attempt } => {
                self.attempts.push(attempt.clone());
                effects.push(Effect::AttemptPosted(attempt));
            }
            ServerMessage::Ack { seq } => {
                self.outbox.ack(seq);
            }
            ServerMessage::Rejected { seq, reason } => {
                if let Some(command) = self.outbox.reject(seq) {
                    log::warn!("Command #{} rejected: {}", seq, reason);
                    if command.is_drawing_write() {
                        // The store's log no longer matches what we painted
                        effects.push(Effect::RequestResync);
                    }
                }
                effects.push(Effect::Notice(reason));
            }
            ServerMessage::Error { message } => {
                effects.push(Effect::Notice(ClientError::TransientPublish(message).to_string()));
            }
        }
        Ok(())
    }

    fn require_teacher(&self, what: &str) -> ClientResult<()> {
        if self.machine.is_teacher() {
            Ok(())
        } else {
            Err(ClientError::PermissionDenied(format!("only a teacher can {}", what)))
        }
    }

    fn clear_signal(&self) -> ClearSignal {
        ClearSignal::new((self.clock)())
    }
}

/// Split a prompt list: one per line, trimmed, blanks dropped.
pub fn parse_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn fixed_clock() -> u64 {
        1_700_000_000_000
    }

    fn client(user: &str) -> GameClient<RecordingSurface> {
        GameClient::new(user, RecordingSurface::new()).with_clock(fixed_clock)
    }

    fn in_progress(drawer: &str) -> SessionState {
        SessionState {
            status: SessionStatus::InProgress,
            drawer_id: Some(drawer.to_string()),
            current_word: Some("house".to_string()),
            timer: 60,
        }
    }

    fn teacher(id: &str) -> RosterEntry {
        RosterEntry {
            id: id.to_string(),
            username: "Teacher".to_string(),
            current_points: 0,
            role: Some("teacher".to_string()),
        }
    }

    fn drag(client: &mut GameClient<RecordingSurface>, points: &[(f64, f64)]) -> Vec<Effect> {
        let mut events = Vec::new();
        let (first, rest) = points.split_first().unwrap();
        events.push(ClientEvent::Pointer(PointerEvent::Down {
            position: Point::new(first.0, first.1),
        }));
        for p in rest {
            events.push(ClientEvent::Pointer(PointerEvent::Move {
                position: Point::new(p.0, p.1),
            }));
        }
        events.push(ClientEvent::Pointer(PointerEvent::Up));
        client.run_feed(events)
    }

    fn sent_types(client: &mut GameClient<RecordingSurface>) -> Vec<String> {
        client
            .drain_outgoing()
            .iter()
            .map(|m| serde_json::to_value(m).unwrap()["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_drawer_publishes_one_batch_per_drag() {
        let mut drawer = client("u1");
        drawer.handle(ClientEvent::Session(in_progress("u1")));

        drag(&mut drawer, &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(drawer.surface().visible().len(), 3);

        let messages = drawer.drain_outgoing();
        assert_eq!(messages.len(), 1);
        let ClientMessage::AppendStrokes { strokes, .. } = &messages[0] else {
            panic!("expected an append");
        };
        assert_eq!(strokes.len(), 3);

        // A fresh viewer replays exactly those three
        let mut viewer = client("u2");
        viewer.handle(ClientEvent::Session(in_progress("u1")));
        viewer.handle(ClientEvent::Drawing(DrawingDocument::Lines {
            lines: strokes.clone(),
        }));
        assert_eq!(viewer.sync().cursor().last_seen_length, 3);
        assert!(viewer.surface().same_picture(drawer.surface()));
    }

    #[test]
    fn test_non_drawer_never_writes_the_drawing() {
        let mut viewer = client("u2");
        viewer.handle(ClientEvent::Session(in_progress("u1")));

        drag(&mut viewer, &[(0.0, 0.0), (5.0, 5.0)]);
        let effects = viewer.run_feed([
            ClientEvent::Action(UiAction::Undo),
            ClientEvent::Action(UiAction::Redo),
            ClientEvent::Action(UiAction::Clear),
        ]);
        assert!(effects.iter().any(|e| matches!(e, Effect::Notice(_))));

        viewer.handle(ClientEvent::Session(SessionState::lobby()));
        assert!(viewer.outbox().unsent().all(|c| !c.is_drawing_write()));
        assert_eq!(viewer.surface().applied_count(), 0);
    }

    #[test]
    fn test_undo_sends_clear_and_viewer_resets_to_zero() {
        let mut drawer = client("u1");
        let mut viewer = client("u2");
        drawer.handle(ClientEvent::Session(in_progress("u1")));
        viewer.handle(ClientEvent::Session(in_progress("u1")));

        drag(&mut drawer, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        drag(&mut drawer, &[(0.0, 5.0), (1.0, 5.0), (2.0, 5.0)]);

        let mut log = DrawingDocument::empty();
        for message in drawer.drain_outgoing() {
            if let ClientMessage::AppendStrokes { strokes, .. } = message {
                log.append(&strokes);
            }
        }
        viewer.handle(ClientEvent::Drawing(log));
        assert_eq!(viewer.sync().cursor().last_seen_length, 5);

        drawer.handle(ClientEvent::Action(UiAction::Undo));
        assert_eq!(drawer.surface().visible().len(), 3);

        let messages = drawer.drain_outgoing();
        let signal = messages
            .iter()
            .find_map(|m| match m {
                ClientMessage::ClearDrawing { signal, .. } => Some(*signal),
                _ => None,
            })
            .expect("undo must emit a clear signal");
        assert_eq!(signal, ClearSignal::new(fixed_clock()));

        viewer.handle(ClientEvent::Drawing(DrawingDocument::Cleared(signal)));
        assert_eq!(viewer.sync().cursor().last_seen_length, 0);
        assert!(viewer.surface().visible().is_empty());
    }

    #[test]
    fn test_undo_without_strokes_sends_nothing() {
        let mut drawer = client("u1");
        drawer.handle(ClientEvent::Session(in_progress("u1")));
        assert_eq!(drawer.history().stack().pointer(), Some(0));

        drawer.handle(ClientEvent::Action(UiAction::Undo));
        assert!(drawer.drain_outgoing().is_empty());
    }

    #[test]
    fn test_redo_after_undo() {
        let mut drawer = client("u1");
        drawer.handle(ClientEvent::Session(in_progress("u1")));
        drag(&mut drawer, &[(0.0, 0.0), (4.0, 4.0)]);
        drawer.drain_outgoing();

        drawer.handle(ClientEvent::Action(UiAction::Undo));
        assert!(drawer.surface().visible().is_empty());
        drawer.handle(ClientEvent::Action(UiAction::Redo));
        assert_eq!(drawer.surface().visible().len(), 1);
        assert_eq!(sent_types(&mut drawer), vec!["clear_drawing", "clear_drawing"]);
    }

    #[test]
    fn test_clear_button_flushes_first() {
        let mut drawer = client("u1");
        drawer.handle(ClientEvent::Session(in_progress("u1")));
        drawer.run_feed([
            ClientEvent::Pointer(PointerEvent::Down {
                position: Point::new(0.0, 0.0),
            }),
            ClientEvent::Pointer(PointerEvent::Move {
                position: Point::new(9.0, 9.0),
            }),
            ClientEvent::Action(UiAction::Clear),
        ]);
        assert_eq!(sent_types(&mut drawer), vec!["append_strokes", "clear_drawing"]);
        assert!(drawer.surface().visible().is_empty());
        assert_eq!(drawer.sync().cursor().last_seen_length, 0);
    }

    #[test]
    fn test_lobby_entry_clears_and_only_drawer_signals() {
        let mut drawer = client("u1");
        let mut viewer = client("u2");
        for c in [&mut drawer, &mut viewer] {
            c.handle(ClientEvent::Session(in_progress("u1")));
        }
        drag(&mut drawer, &[(0.0, 0.0), (1.0, 1.0)]);
        drawer.drain_outgoing();

        let mut lobby = SessionState::lobby();
        lobby.drawer_id = Some("u1".to_string());
        drawer.handle(ClientEvent::Session(lobby.clone()));
        viewer.handle(ClientEvent::Session(lobby));

        assert!(drawer.surface().visible().is_empty());
        assert_eq!(sent_types(&mut drawer), vec!["clear_drawing"]);
        assert!(viewer.drain_outgoing().is_empty());
        assert_eq!(viewer.surface().clear_count(), 1);
        assert!(!drawer.mode().drawing_enabled);
    }

    #[test]
    fn test_guess_feed_resets_with_each_round() {
        let attempt = |guess: &str| {
            ClientEvent::Server(ServerMessage::AttemptPosted {
                attempt: Attempt {
                    user_id: "u3".to_string(),
                    username: "Guesser".to_string(),
                    guess: guess.to_string(),
                    timestamp: 1,
                },
            })
        };
        let mut viewer = client("u2");
        viewer.handle(ClientEvent::Session(in_progress("u1")));
        viewer.handle(attempt("tree"));

        // The word is revealed in END, guesses stay visible
        let mut end = in_progress("u1");
        end.status = SessionStatus::End;
        viewer.handle(ClientEvent::Session(end));
        assert_eq!(viewer.attempts().len(), 1);

        viewer.handle(ClientEvent::Session(SessionState::lobby()));
        assert!(viewer.attempts().is_empty());

        viewer.handle(attempt("late"));
        viewer.handle(ClientEvent::Session(in_progress("u1")));
        assert!(viewer.attempts().is_empty());

        viewer.handle(attempt("roof"));
        assert_eq!(viewer.attempts()[0].guess, "roof");
    }

    #[test]
    fn test_mode_flags_for_drawer_and_viewer() {
        let mut drawer = client("u1");
        let mut viewer = client("u2");
        drawer.handle(ClientEvent::Session(SessionState::lobby()));
        viewer.handle(ClientEvent::Session(SessionState::lobby()));

        let effects = drawer.handle(ClientEvent::Session(in_progress("u1")));
        let Some(Effect::ModeChanged(mode)) = effects.last() else {
            panic!("expected a mode change");
        };
        assert!(mode.drawing_enabled && mode.word_visible && !mode.guessing_enabled);

        viewer.handle(ClientEvent::Session(in_progress("u1")));
        let mode = viewer.mode();
        assert!(!mode.drawing_enabled && !mode.word_visible && mode.guessing_enabled);
    }

    #[test]
    fn test_teacher_actions_need_roster_role() {
        let mut t = client("t1");
        t.handle(ClientEvent::Session(SessionState::lobby()));

        let effects = t.handle(ClientEvent::Action(UiAction::StartRound {
            prompts: "cat\ndog".to_string(),
        }));
        assert!(matches!(effects.first(), Some(Effect::Notice(_))));
        assert!(t.outbox().is_empty());

        let effects = t.handle(ClientEvent::Roster(vec![teacher("t1")]));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ModeChanged(mode) if mode.teacher_controls_visible
        )));

        t.handle(ClientEvent::Action(UiAction::StartRound {
            prompts: " cat \n\n dog\n".to_string(),
        }));
        let messages = t.drain_outgoing();
        assert_eq!(
            messages,
            vec![ClientMessage::StartRound {
                seq: 1,
                prompts: vec!["cat".to_string(), "dog".to_string()],
            }]
        );
    }

    #[test]
    fn test_start_round_needs_prompts() {
        let mut t = client("t1");
        t.handle(ClientEvent::Roster(vec![teacher("t1")]));
        let effects = t.handle(ClientEvent::Action(UiAction::StartRound {
            prompts: " \n ".to_string(),
        }));
        assert!(effects.iter().any(|e| matches!(e, Effect::Notice(_))));
        assert!(t.outbox().is_empty());
    }

    #[test]
    fn test_join_validates_username() {
        let mut c = client("u1");
        let effects = c.handle(ClientEvent::Action(UiAction::Join {
            username: "al".to_string(),
        }));
        assert!(matches!(effects.first(), Some(Effect::Notice(_))));

        c.handle(ClientEvent::Action(UiAction::Join {
            username: " alice ".to_string(),
        }));
        assert_eq!(sent_types(&mut c), vec!["upsert_profile"]);
    }

    #[test]
    fn test_guess_only_while_guessing() {
        let mut viewer = client("u2");
        viewer.handle(ClientEvent::Action(UiAction::SubmitGuess {
            guess: "house".to_string(),
        }));
        assert!(viewer.outbox().is_empty());

        viewer.handle(ClientEvent::Session(in_progress("u1")));
        viewer.run_feed([
            ClientEvent::Action(UiAction::SubmitGuess {
                guess: "   ".to_string(),
            }),
            ClientEvent::Action(UiAction::SubmitGuess {
                guess: " house ".to_string(),
            }),
        ]);
        let messages = viewer.drain_outgoing();
        assert_eq!(
            messages,
            vec![ClientMessage::SubmitGuess {
                seq: 1,
                guess: "house".to_string(),
            }]
        );
    }

    #[test]
    fn test_ack_and_disconnect_requeue() {
        let mut drawer = client("u1");
        drawer.handle(ClientEvent::Session(in_progress("u1")));
        drag(&mut drawer, &[(0.0, 0.0), (1.0, 1.0)]);
        drag(&mut drawer, &[(0.0, 2.0), (1.0, 2.0)]);
        assert_eq!(drawer.drain_outgoing().len(), 2);

        drawer.handle(ClientEvent::Server(ServerMessage::Ack { seq: 1 }));
        drawer.handle(ClientEvent::Disconnected);

        let resent = drawer.drain_outgoing();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].seq(), Some(2));
    }

    #[test]
    fn test_gap_requests_resync() {
        let mut viewer = client("u2");
        viewer.handle(ClientEvent::Session(in_progress("u1")));
        let stroke = Stroke::new(Point::ZERO, Point::new(1.0, 1.0), &Default::default()).unwrap();

        let effects = viewer.handle(ClientEvent::Server(ServerMessage::DrawingAppended {
            offset: 4,
            strokes: vec![stroke],
        }));
        assert!(effects.contains(&Effect::RequestResync));
        assert_eq!(viewer.sync().cursor().last_seen_length, 0);
    }

    #[test]
    fn test_welcome_applies_every_feed() {
        let mut viewer = client("u2");
        let stroke = Stroke::new(Point::ZERO, Point::new(1.0, 1.0), &Default::default()).unwrap();
        viewer.handle(ClientEvent::Server(ServerMessage::Welcome {
            session: in_progress("u1"),
            roster: vec![teacher("t1")],
            drawing: DrawingDocument::Lines {
                lines: vec![stroke.clone(), stroke],
            },
        }));
        assert_eq!(viewer.roster().len(), 1);
        assert!(viewer.mode().guessing_enabled);
        assert_eq!(viewer.surface().visible().len(), 2);
    }

    #[test]
    fn test_drawer_hand_over_keeps_cursor() {
        let mut c = client("u1");
        c.handle(ClientEvent::Session(in_progress("u1")));
        drag(&mut c, &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        c.drain_outgoing();

        c.handle(ClientEvent::Session(in_progress("u3")));
        assert_eq!(c.sync().mode(), SyncMode::Following);
        assert_eq!(c.sync().cursor().last_seen_length, 2);
        assert!(c.history().stack().is_empty());
    }

    #[test]
    fn test_parse_prompts() {
        assert_eq!(parse_prompts("a\r\n b \n\n"), vec!["a", "b"]);
        assert!(parse_prompts("").is_empty());
    }
}
