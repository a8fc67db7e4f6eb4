//! Event boundary between connections and sessions.
//!
//! The gateway turns inbound events (connect, move, disconnect) into
//! registry and session calls, and turns their results into
//! [`ServerEvent`]s pushed onto per-participant outboxes. It never
//! broadcasts: every event names the participant it is for.

use crate::protocol::{ClientMessage, FinalOutcome, MovePayload, ServerEvent};
use crate::registry::{Pairing, Release, SessionRegistry};
use crate::session::{MoveResult, ParticipantId, Session, SessionStatus};
use crate::sync::lock;
use crate::{ErrorKind, GameError};
use noughts::Mark;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Outbound channel of one connection. The transport drains it onto the socket.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Routes events between connections and the session registry.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    registry: SessionRegistry,
    outboxes: Arc<Mutex<HashMap<ParticipantId, Outbox>>>,
}

impl Gateway {
    /// Creates a gateway over `registry`.
    #[instrument(skip(registry))]
    pub fn new(registry: SessionRegistry) -> Self {
        info!("Creating gateway");
        Self {
            registry,
            outboxes: Arc::default(),
        }
    }

    /// Returns the registry behind this gateway.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Returns the number of connected participants.
    pub fn connections(&self) -> usize {
        lock(&self.outboxes).len()
    }

    /// Registers a new connection and pairs it with a waiting opponent.
    ///
    /// A lone participant receives `waiting`. On pairing both sides receive
    /// `paired` with their mark, then the empty board. These are queued
    /// inside the pairing critical section, so a departure racing the
    /// pairing can only ever be reported after them.
    #[instrument(skip(self, outbox))]
    pub fn connect(&self, participant: ParticipantId, outbox: Outbox) {
        lock(&self.outboxes).insert(participant, outbox);
        info!(connections = self.connections(), "Participant connected");

        let mut failed = Vec::new();
        let result = self
            .registry
            .enqueue_or_pair_with(participant, |pairing, session| {
                self.announce(participant, pairing, session, &mut failed)
            });
        self.drop_failed(failed);

        if let Err(e) = result {
            self.reject(participant, &e);
        }
    }

    /// Handles a raw text frame from `participant`.
    ///
    /// Unparseable frames are answered with `rejected { MalformedPayload }`
    /// to the sender and change nothing.
    ///
    /// # Errors
    ///
    /// Returns the error that was reported to the sender.
    #[instrument(skip(self, text))]
    pub fn handle_text(
        &self,
        participant: ParticipantId,
        text: &str,
    ) -> Result<MoveResult, GameError> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Move(MovePayload { index })) => self.handle_move(participant, index),
            Err(e) => {
                let err =
                    GameError::new(ErrorKind::MalformedPayload, format!("Bad message: {}", e));
                self.reject(participant, &err);
                Err(err)
            }
        }
    }

    /// Applies a move from `participant` at `index`.
    ///
    /// On success both participants receive `boardUpdate`, followed by
    /// `gameResult` if the move finished the game. The events are queued
    /// while the session is still locked, so two accepted moves can never
    /// reach a participant out of order.
    ///
    /// # Errors
    ///
    /// Returns the error that was reported to the sender.
    #[instrument(skip(self))]
    pub fn handle_move(
        &self,
        participant: ParticipantId,
        index: i64,
    ) -> Result<MoveResult, GameError> {
        let mut failed = Vec::new();
        let result = self.try_move(participant, index, &mut failed);
        self.drop_failed(failed);

        if let Err(e) = &result {
            self.reject(participant, e);
        }
        result
    }

    fn try_move(
        &self,
        participant: ParticipantId,
        index: i64,
        failed: &mut Vec<ParticipantId>,
    ) -> Result<MoveResult, GameError> {
        let session = self.registry.lookup(participant)?;
        // Negative indices reach the session as an index past the board so
        // that status and turn are still checked first.
        let slot = usize::try_from(index).unwrap_or(usize::MAX);

        let mut guard = lock(&session);
        let result = guard
            .apply_move(participant, slot)
            .map_err(|e| match e.kind {
                ErrorKind::OutOfRange if index < 0 => GameError::new(
                    ErrorKind::OutOfRange,
                    format!("Position {} is out of range (must be 0-8)", index),
                ),
                _ => e,
            })?;

        self.deliver_board(&guard, result.next_turn, failed);
        if let Some(outcome) = FinalOutcome::from_outcome(result.outcome) {
            info!(session_id = %guard.id(), ?outcome, "Game over");
            for who in guard.participants() {
                self.deliver(who, ServerEvent::GameResult { outcome }, failed);
            }
        }

        Ok(result)
    }

    /// Handles a closed connection.
    ///
    /// The participant's outbox is dropped and their session released; an
    /// opponent left behind in a live game receives `opponentLeft`, queued
    /// while the abandoned session is still locked.
    #[instrument(skip(self))]
    pub fn disconnect(&self, participant: ParticipantId) {
        lock(&self.outboxes).remove(&participant);

        let mut failed = Vec::new();
        let release = self.registry.release_with(participant, |release| {
            if let Release::Abandoned {
                session_id,
                remaining: Some(remaining),
            } = release
            {
                info!(%session_id, %remaining, "Notifying opponent of departure");
                self.deliver(*remaining, ServerEvent::OpponentLeft, &mut failed);
            }
        });
        self.drop_failed(failed);

        debug!(?release, "Participant released");
        info!(connections = self.connections(), "Participant disconnected");
    }

    /// Abandons every live session, notifies its participants, and closes
    /// all outboxes.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let notify = self.registry.shutdown();
        let mut outboxes = lock(&self.outboxes);
        for participant in notify {
            if let Some(outbox) = outboxes.get(&participant) {
                let _ = outbox.send(ServerEvent::OpponentLeft);
            }
        }
        info!(connections = outboxes.len(), "Closing all connections");
        outboxes.clear();
    }

    /// Sends `rejected` for `err` to `participant` only.
    pub fn reject(&self, participant: ParticipantId, err: &GameError) {
        warn!(%participant, reason = %err.kind, message = %err.message, "Rejecting event");
        let mut failed = Vec::new();
        self.deliver(
            participant,
            ServerEvent::Rejected {
                reason: err.kind,
                message: err.message.clone(),
            },
            &mut failed,
        );
        self.drop_failed(failed);
    }

    fn announce(
        &self,
        participant: ParticipantId,
        pairing: &Pairing,
        session: &Session,
        failed: &mut Vec<ParticipantId>,
    ) {
        match pairing {
            Pairing::Waiting { session_id, .. } => {
                self.deliver(
                    participant,
                    ServerEvent::Waiting {
                        session_id: *session_id,
                    },
                    failed,
                );
            }
            Pairing::Paired {
                session_id,
                waiter,
                joiner,
                ..
            } => {
                if *session.status() != SessionStatus::InProgress {
                    warn!(%session_id, status = %session.status(), "Paired session is not running");
                    return;
                }
                for (who, mark) in [(*waiter, Mark::X), (*joiner, Mark::O)] {
                    self.deliver(
                        who,
                        ServerEvent::Paired {
                            mark,
                            session_id: *session_id,
                        },
                        failed,
                    );
                }
                self.deliver_board(session, Some(*session.turn()), failed);
            }
            Pairing::Existing { session_id, .. } => {
                debug!(%session_id, "Connect for participant with a live session");
            }
        }
    }

    fn deliver_board(
        &self,
        session: &Session,
        next_turn: Option<Mark>,
        failed: &mut Vec<ParticipantId>,
    ) {
        let board = session.board().cells();
        for who in session.participants() {
            self.deliver(who, ServerEvent::BoardUpdate { board, next_turn }, failed);
        }
    }

    /// Queues `event` for `participant`. A closed outbox is recorded in
    /// `failed` so the caller can release it once no session lock is held.
    fn deliver(
        &self,
        participant: ParticipantId,
        event: ServerEvent,
        failed: &mut Vec<ParticipantId>,
    ) {
        let outboxes = lock(&self.outboxes);
        let Some(outbox) = outboxes.get(&participant) else {
            debug!(%participant, event = event.name(), "No outbox for participant");
            return;
        };

        debug!(%participant, event = event.name(), "Delivering event");
        if outbox.send(event).is_err() {
            warn!(%participant, "Outbox closed, treating as disconnect");
            failed.push(participant);
        }
    }

    fn drop_failed(&self, failed: Vec<ParticipantId>) {
        for participant in failed {
            if lock(&self.outboxes).contains_key(&participant) {
                self.disconnect(participant);
            }
        }
    }
}
