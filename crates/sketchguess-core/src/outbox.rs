//! Outbound command queue.
//!
//! Every write to the store goes through here as an explicit command with a
//! sequence number. Commands stay queued until the store acknowledges them,
//! and are sent again after a reconnect. The store deduplicates by
//! `(instance, seq)`, so a retried append can never land twice.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::protocol::ClientMessage;
use crate::roster::ProfileUpsert;
use crate::stroke::Stroke;
use crate::sync::ClearSignal;

/// A write the store should perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpsertProfile(ProfileUpsert),
    AppendStrokes(Vec<Stroke>),
    ClearDrawing(ClearSignal),
    SubmitGuess(String),
    StartRound(Vec<String>),
    EndRound,
    OpenLobby,
}

impl Command {
    /// Whether this command writes to the drawing log.
    pub fn is_drawing_write(&self) -> bool {
        matches!(self, Command::AppendStrokes(_) | Command::ClearDrawing(_))
    }
}

#[derive(Debug, Clone)]
struct Queued {
    seq: u64,
    command: Command,
    in_flight: bool,
}

/// FIFO of unacknowledged commands.
#[derive(Debug, Clone)]
pub struct Outbox {
    instance: Uuid,
    next_seq: u64,
    queue: VecDeque<Queued>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::with_instance(Uuid::new_v4())
    }

    pub fn with_instance(instance: Uuid) -> Self {
        Self {
            instance,
            next_seq: 1,
            queue: VecDeque::new(),
        }
    }

    /// Namespace for this client's sequence numbers.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Queue a command. Returns its sequence number.
    pub fn push(&mut self, command: Command) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        log::debug!("Queued command #{}: {:?}", seq, command);
        self.queue.push_back(Queued {
            seq,
            command,
            in_flight: false,
        });
        seq
    }

    /// Wire messages for every command not yet sent, in queue order.
    pub fn take_unsent(&mut self) -> Vec<ClientMessage> {
        self.queue
            .iter_mut()
            .filter(|q| !q.in_flight)
            .map(|q| {
                q.in_flight = true;
                ClientMessage::from_command(q.seq, q.command.clone())
            })
            .collect()
    }

    /// The store applied (or had already applied) `seq`.
    pub fn ack(&mut self, seq: u64) -> bool {
        self.remove(seq).is_some()
    }

    /// The store refused `seq`; it is dropped, never retried.
    pub fn reject(&mut self, seq: u64) -> Option<Command> {
        self.remove(seq)
    }

    /// Mark everything in flight as unsent again (connection lost).
    pub fn requeue(&mut self) -> usize {
        let mut count = 0;
        for q in self.queue.iter_mut().filter(|q| q.in_flight) {
            q.in_flight = false;
            count += 1;
        }
        if count > 0 {
            log::warn!("Requeued {} unacknowledged commands", count);
        }
        count
    }

    /// Commands not yet handed to the transport.
    pub fn unsent(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter().filter(|q| !q.in_flight).map(|q| &q.command)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn remove(&mut self, seq: u64) -> Option<Command> {
        let index = self.queue.iter().position(|q| q.seq == seq)?;
        self.queue.remove(index).map(|q| q.command)
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
