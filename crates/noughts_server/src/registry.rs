//! Pairing and lookup of sessions by participant.

use crate::session::{Departure, ParticipantId, Session, SessionId, SessionStatus};
use crate::sync::lock;
use crate::{ErrorKind, GameError};
use noughts::Mark;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// A session shared between the registry and in-flight events.
///
/// The mutex is the serialization point for everything that touches the
/// session: joins, moves, disconnects and the events they emit.
pub type SharedSession = Arc<Mutex<Session>>;

/// Result of [`SessionRegistry::enqueue_or_pair`].
#[derive(Debug, Clone)]
pub enum Pairing {
    /// No opponent was waiting; a new session waits for one.
    Waiting {
        /// The new session.
        session_id: SessionId,
        /// Shared handle to it.
        session: SharedSession,
    },
    /// Paired with the longest-waiting participant.
    Paired {
        /// The session both now play in.
        session_id: SessionId,
        /// Shared handle to it.
        session: SharedSession,
        /// The participant who was waiting (X).
        waiter: ParticipantId,
        /// The participant who just joined (O).
        joiner: ParticipantId,
    },
    /// The participant already has a live session.
    Existing {
        /// That session.
        session_id: SessionId,
        /// Shared handle to it.
        session: SharedSession,
        /// The participant's mark in it.
        mark: Mark,
    },
}

impl Pairing {
    /// Returns the session the participant ended up in.
    pub fn session(&self) -> &SharedSession {
        match self {
            Pairing::Waiting { session, .. }
            | Pairing::Paired { session, .. }
            | Pairing::Existing { session, .. } => session,
        }
    }

    /// Returns the session id.
    pub fn session_id(&self) -> SessionId {
        match self {
            Pairing::Waiting { session_id, .. }
            | Pairing::Paired { session_id, .. }
            | Pairing::Existing { session_id, .. } => *session_id,
        }
    }
}

/// Result of [`SessionRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The participant was not registered.
    Unknown,
    /// The participant was waiting; the pending session is gone.
    CancelledWaiting,
    /// The participant left a live game, which is now abandoned.
    Abandoned {
        /// The abandoned session.
        session_id: SessionId,
        /// The participant who must be told.
        remaining: Option<ParticipantId>,
    },
    /// The participant's session had already finished.
    Finished,
}

/// Counts reported by [`SessionRegistry::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Participants waiting for an opponent.
    pub waiting: usize,
    /// Sessions held by the registry, terminal ones included until evicted.
    pub sessions: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Participants waiting for an opponent, oldest first.
    waiting: VecDeque<(ParticipantId, SessionId)>,
    /// Session each participant belongs to.
    participants: HashMap<ParticipantId, SessionId>,
    sessions: HashMap<SessionId, SharedSession>,
}

/// Maps participants to sessions and pairs waiting participants.
///
/// Cloning is cheap and every clone shares the same state. Locks are
/// always taken registry first, then session, never the other way round.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session registry");
        Self::default()
    }

    /// Pairs `participant` with the longest-waiting opponent, or queues them.
    ///
    /// The check and the pairing happen under one lock, so two participants
    /// arriving together either share one session or each get their own
    /// waiting session.
    ///
    /// # Errors
    ///
    /// Propagates a failed join on the waiting session, after putting the
    /// waiter back at the head of the queue.
    pub fn enqueue_or_pair(&self, participant: ParticipantId) -> Result<Pairing, GameError> {
        self.enqueue_or_pair_with(participant, |_, _| {})
    }

    /// Like [`enqueue_or_pair`](Self::enqueue_or_pair), calling `announce`
    /// with the result while both the registry and the session are locked.
    ///
    /// Whatever `announce` queues is therefore ordered before any later
    /// release, move or second pairing that touches the same session.
    ///
    /// # Errors
    ///
    /// As [`enqueue_or_pair`](Self::enqueue_or_pair). `announce` is not
    /// called on error.
    #[instrument(skip(self, announce))]
    pub fn enqueue_or_pair_with<F>(
        &self,
        participant: ParticipantId,
        announce: F,
    ) -> Result<Pairing, GameError>
    where
        F: FnOnce(&Pairing, &Session),
    {
        let mut state = lock(&self.state);

        if let Some(session_id) = state.participants.get(&participant).copied() {
            if let Some(session) = state.sessions.get(&session_id).cloned() {
                let guard = lock(&session);
                if !guard.is_terminal()
                    && let Some(mark) = guard.mark_of(participant)
                {
                    debug!(%session_id, "Participant already has a live session");
                    let pairing = Pairing::Existing {
                        session_id,
                        session: Arc::clone(&session),
                        mark,
                    };
                    announce(&pairing, &guard);
                    return Ok(pairing);
                }
            }
            state.participants.remove(&participant);
        }

        if let Some((waiter, session_id)) = state.waiting.pop_front() {
            let Some(session) = state.sessions.get(&session_id).cloned() else {
                warn!(%waiter, %session_id, "Waiting entry without a session");
                state.participants.remove(&waiter);
                return Err(GameError::new(
                    ErrorKind::NotFound,
                    format!("Session {} not found", session_id),
                ));
            };

            let mut guard = lock(&session);
            if let Err(e) = guard.join(participant) {
                state.waiting.push_front((waiter, session_id));
                return Err(e);
            }

            state.participants.insert(participant, session_id);
            info!(%session_id, %waiter, joiner = %participant, "Paired participants");
            let pairing = Pairing::Paired {
                session_id,
                session: Arc::clone(&session),
                waiter,
                joiner: participant,
            };
            announce(&pairing, &guard);
            return Ok(pairing);
        }

        let session_id = SessionId::new();
        let session = Arc::new(Mutex::new(Session::new(session_id, participant)));
        state.sessions.insert(session_id, Arc::clone(&session));
        state.participants.insert(participant, session_id);
        state.waiting.push_back((participant, session_id));
        info!(%session_id, waiting = state.waiting.len(), "Participant waiting for opponent");

        let pairing = Pairing::Waiting {
            session_id,
            session: Arc::clone(&session),
        };
        announce(&pairing, &lock(&session));
        Ok(pairing)
    }

    /// Returns the session `participant` belongs to.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] if the participant has no session.
    #[instrument(skip(self))]
    pub fn lookup(&self, participant: ParticipantId) -> Result<SharedSession, GameError> {
        let state = lock(&self.state);
        state
            .participants
            .get(&participant)
            .and_then(|session_id| state.sessions.get(session_id))
            .cloned()
            .ok_or_else(|| {
                debug!(%participant, "Participant has no session");
                GameError::new(
                    ErrorKind::NotFound,
                    format!("Participant {} has no session", participant),
                )
            })
    }

    /// Removes `participant`, cancelling a pending pairing or abandoning
    /// their live session.
    ///
    /// The opponent of an abandoned session keeps their mapping, so their
    /// later moves are rejected as `GameNotInProgress` rather than `NotFound`
    /// until the session is evicted.
    pub fn release(&self, participant: ParticipantId) -> Release {
        self.release_with(participant, |_| {})
    }

    /// Like [`release`](Self::release), calling `on_abandon` while the
    /// abandoned session is still locked.
    ///
    /// `on_abandon` only runs for [`Release::Abandoned`].
    #[instrument(skip(self, on_abandon))]
    pub fn release_with<F>(&self, participant: ParticipantId, on_abandon: F) -> Release
    where
        F: FnOnce(&Release),
    {
        let mut state = lock(&self.state);

        let Some(session_id) = state.participants.remove(&participant) else {
            debug!(%participant, "Release of unknown participant");
            return Release::Unknown;
        };

        if let Some(slot) = state.waiting.iter().position(|(p, _)| *p == participant) {
            state.waiting.remove(slot);
            if let Some(session) = state.sessions.remove(&session_id) {
                lock(&session).abandon();
            }
            info!(%session_id, "Cancelled pending pairing");
            return Release::CancelledWaiting;
        }

        let Some(session) = state.sessions.get(&session_id).cloned() else {
            return Release::Unknown;
        };
        let mut guard = lock(&session);
        match guard.disconnect(participant) {
            Ok(Departure::Abandoned { remaining }) => {
                let release = Release::Abandoned {
                    session_id,
                    remaining,
                };
                on_abandon(&release);
                release
            }
            Ok(Departure::AlreadyOver) => Release::Finished,
            Err(e) => {
                warn!(error = %e, "Mapped participant missing from session");
                Release::Unknown
            }
        }
    }

    /// Evicts sessions that have been terminal for at least `grace`.
    ///
    /// Returns the number of sessions removed.
    pub fn evict_finished(&self, grace: Duration) -> usize {
        self.evict_finished_at(Instant::now(), grace)
    }

    /// Evicts sessions that were terminal for at least `grace` as of `now`.
    #[instrument(skip(self))]
    pub fn evict_finished_at(&self, now: Instant, grace: Duration) -> usize {
        let mut state = lock(&self.state);

        let expired: Vec<SessionId> = state
            .sessions
            .iter()
            .filter(|(_, session)| {
                lock(session)
                    .finished_at()
                    .is_some_and(|at| now.saturating_duration_since(at) >= grace)
            })
            .map(|(id, _)| *id)
            .collect();

        if expired.is_empty() {
            return 0;
        }

        for session_id in &expired {
            state.sessions.remove(session_id);
        }
        state
            .participants
            .retain(|_, session_id| !expired.contains(session_id));
        state
            .waiting
            .retain(|(_, session_id)| !expired.contains(session_id));

        info!(evicted = expired.len(), remaining = state.sessions.len(), "Evicted finished sessions");
        expired.len()
    }

    /// Abandons every live session and empties the registry.
    ///
    /// Returns the participants of the sessions that were abandoned.
    #[instrument(skip(self))]
    pub fn shutdown(&self) -> Vec<ParticipantId> {
        let mut state = lock(&self.state);

        let mut notify = Vec::new();
        for session in state.sessions.values() {
            let mut guard = lock(session);
            if guard.abandon() {
                notify.extend(guard.participants());
            }
        }

        info!(sessions = state.sessions.len(), notified = notify.len(), "Registry shut down");
        state.sessions.clear();
        state.participants.clear();
        state.waiting.clear();
        notify
    }

    /// Returns the status of `participant`'s session, if any.
    pub fn status_of(&self, participant: ParticipantId) -> Option<SessionStatus> {
        self.lookup(participant)
            .ok()
            .map(|session| *lock(&session).status())
    }

    /// Returns current counts.
    pub fn stats(&self) -> RegistryStats {
        let state = lock(&self.state);
        RegistryStats {
            waiting: state.waiting.len(),
            sessions: state.sessions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_participant_waits() {
        let registry = SessionRegistry::new();
        let p1 = ParticipantId::new();

        let pairing = registry.enqueue_or_pair(p1).unwrap();
        assert!(matches!(pairing, Pairing::Waiting { .. }));
        assert_eq!(registry.stats(), RegistryStats { waiting: 1, sessions: 1 });
        assert_eq!(
            registry.status_of(p1),
            Some(SessionStatus::WaitingForSecondPlayer)
        );
    }

    #[test]
    fn test_enqueue_twice_returns_existing() {
        let registry = SessionRegistry::new();
        let p1 = ParticipantId::new();

        let first = registry.enqueue_or_pair(p1).unwrap();
        let again = registry.enqueue_or_pair(p1).unwrap();
        assert!(matches!(again, Pairing::Existing { mark: Mark::X, .. }));
        assert_eq!(first.session_id(), again.session_id());
        assert_eq!(registry.stats().waiting, 1);
    }

    #[test]
    fn test_release_waiting_cancels_pairing() {
        let registry = SessionRegistry::new();
        let p1 = ParticipantId::new();
        let p2 = ParticipantId::new();

        let pending = registry.enqueue_or_pair(p1).unwrap();
        assert_eq!(registry.release(p1), Release::CancelledWaiting);
        assert_eq!(
            lock(pending.session()).status(),
            &SessionStatus::Abandoned
        );

        // p2 must not be paired with the departed p1
        assert!(matches!(
            registry.enqueue_or_pair(p2).unwrap(),
            Pairing::Waiting { .. }
        ));
    }

    #[test]
    fn test_release_unknown() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.release(ParticipantId::new()), Release::Unknown);
    }

    #[test]
    fn test_evict_keeps_live_sessions() {
        let registry = SessionRegistry::new();
        let p1 = ParticipantId::new();
        let p2 = ParticipantId::new();
        registry.enqueue_or_pair(p1).unwrap();
        registry.enqueue_or_pair(p2).unwrap();

        assert_eq!(registry.evict_finished(Duration::ZERO), 0);
        assert_eq!(registry.stats().sessions, 1);
    }
}
