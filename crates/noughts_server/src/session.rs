//! A single two-participant game.

use crate::{ErrorKind, GameError};
use derive_getters::Getters;
use derive_new::new;
use noughts::{Board, BoardError, Mark, Move, Outcome, Position};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Opaque identifier for one connected participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque identifier for one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum SessionStatus {
    /// Only the X participant has joined.
    WaitingForSecondPlayer,
    /// Both participants joined; moves are accepted.
    InProgress,
    /// X completed a line.
    WonByX,
    /// O completed a line.
    WonByO,
    /// Board filled with no line.
    Draw,
    /// A participant left before the game finished.
    Abandoned,
}

impl SessionStatus {
    /// Returns true once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::WonByX | SessionStatus::WonByO | SessionStatus::Draw | SessionStatus::Abandoned
        )
    }
}

/// Result of joining a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Joined {
    /// Mark bound to the participant for the session's lifetime.
    pub mark: Mark,
    /// Session status after the join.
    pub status: SessionStatus,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MoveResult {
    /// Board after the move.
    pub board: Board,
    /// Evaluation of that board.
    pub outcome: Outcome,
    /// Mark to move next, `None` once the game is over.
    pub next_turn: Option<Mark>,
}

/// What a disconnect did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The session was live and is now abandoned.
    Abandoned {
        /// The participant still connected, if the session was paired.
        remaining: Option<ParticipantId>,
    },
    /// The session had already finished; nothing changed.
    AlreadyOver,
}

/// A tic-tac-toe game between two participants.
///
/// The first participant is bound to X and moves first; the second is bound
/// to O. The board and status only change through [`Session::apply_move`],
/// apart from the terminal `Abandoned` transition on disconnect.
#[derive(Debug, Clone, Getters)]
pub struct Session {
    /// Session ID.
    id: SessionId,
    /// Participant playing X.
    player_x: ParticipantId,
    /// Participant playing O, once paired.
    player_o: Option<ParticipantId>,
    /// Current board.
    board: Board,
    /// Mark to move.
    turn: Mark,
    /// Lifecycle status.
    status: SessionStatus,
    /// Accepted moves in order.
    history: Vec<Move>,
    /// When the session became terminal.
    finished_at: Option<Instant>,
}

impl Session {
    /// Creates a session waiting for an opponent, with `creator` as X.
    #[instrument]
    pub fn new(id: SessionId, creator: ParticipantId) -> Self {
        info!(session_id = %id, participant = %creator, "Creating new game session");
        Self {
            id,
            player_x: creator,
            player_o: None,
            board: Board::new(),
            turn: Mark::X,
            status: SessionStatus::WaitingForSecondPlayer,
            history: Vec::new(),
            finished_at: None,
        }
    }

    /// Returns the mark bound to `participant`, if they are in this session.
    pub fn mark_of(&self, participant: ParticipantId) -> Option<Mark> {
        if participant == self.player_x {
            Some(Mark::X)
        } else if Some(participant) == self.player_o {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Returns the other participant, if paired.
    pub fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        match self.mark_of(participant)? {
            Mark::X => self.player_o,
            Mark::O => Some(self.player_x),
        }
    }

    /// Returns the participants in mark order (X first).
    pub fn participants(&self) -> Vec<ParticipantId> {
        std::iter::once(self.player_x).chain(self.player_o).collect()
    }

    /// Returns true once the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Joins the session.
    ///
    /// The creator re-joining is a no-op; a second distinct participant is
    /// bound to O and starts the game with X to move.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::SessionFull`] if two other participants already joined.
    /// - [`ErrorKind::GameNotInProgress`] if the session was abandoned before pairing.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn join(&mut self, participant: ParticipantId) -> Result<Joined, GameError> {
        if let Some(mark) = self.mark_of(participant) {
            debug!(%mark, "Participant already in session");
            return Ok(Joined::new(mark, self.status));
        }

        if self.player_o.is_some() {
            warn!(%participant, "Session already has 2 players");
            return Err(GameError::new(
                ErrorKind::SessionFull,
                "Session already has 2 players",
            ));
        }

        if self.status != SessionStatus::WaitingForSecondPlayer {
            warn!(%participant, status = %self.status, "Session is no longer open");
            return Err(GameError::new(
                ErrorKind::GameNotInProgress,
                format!("Session is {}", self.status),
            ));
        }

        info!(%participant, mark = "O", "Registering participant as O");
        self.player_o = Some(participant);
        self.status = SessionStatus::InProgress;
        self.turn = Mark::X;
        Ok(Joined::new(Mark::O, self.status))
    }

    /// Applies a move for `participant` at board `index`.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`ErrorKind::NotFound`] if the participant is not in this session.
    /// - [`ErrorKind::GameNotInProgress`] unless the status is `InProgress`.
    /// - [`ErrorKind::NotYourTurn`] if the participant's mark is not to move.
    /// - [`ErrorKind::OutOfRange`] or [`ErrorKind::CellOccupied`] from the board.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_move(
        &mut self,
        participant: ParticipantId,
        index: usize,
    ) -> Result<MoveResult, GameError> {
        let mark = self.mark_of(participant).ok_or_else(|| {
            warn!(%participant, "Unknown participant attempted move");
            GameError::new(
                ErrorKind::NotFound,
                format!("Participant {} is not in session {}", participant, self.id),
            )
        })?;

        if self.status != SessionStatus::InProgress {
            warn!(%participant, status = %self.status, "Move outside of a running game");
            return Err(GameError::new(
                ErrorKind::GameNotInProgress,
                format!("Game is not in progress ({})", self.status),
            ));
        }

        if mark != self.turn {
            warn!(
                %participant,
                expected_mark = %self.turn,
                player_mark = %mark,
                "Player tried to move out of turn"
            );
            return Err(GameError::new(
                ErrorKind::NotYourTurn,
                format!("Not your turn. Waiting for player {}", self.turn),
            ));
        }

        let (position, board) = Position::from_index(index)
            .ok_or(BoardError::OutOfRange(index))
            .and_then(|position| self.board.place(index, mark).map(|board| (position, board)))
            .map_err(|e| {
                warn!(%participant, index, error = %e, "Invalid move");
                GameError::from(e)
            })?;

        self.board = board;
        self.history.push(Move::new(mark, position));

        let outcome = self.board.evaluate();
        let next_turn = match outcome {
            Outcome::InProgress => {
                self.turn = mark.opponent();
                Some(self.turn)
            }
            Outcome::Won(winner) => {
                self.finish(match winner {
                    Mark::X => SessionStatus::WonByX,
                    Mark::O => SessionStatus::WonByO,
                });
                None
            }
            Outcome::Draw => {
                self.finish(SessionStatus::Draw);
                None
            }
        };

        debug!(
            %participant,
            position = %position,
            status = %self.status,
            board = %self.board.display(),
            "Move completed successfully"
        );

        Ok(MoveResult::new(self.board.clone(), outcome, next_turn))
    }

    /// Records that `participant` disconnected.
    ///
    /// A waiting or running session becomes `Abandoned`; finished sessions
    /// are left as they are.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] if the participant is not in this session.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn disconnect(&mut self, participant: ParticipantId) -> Result<Departure, GameError> {
        if self.mark_of(participant).is_none() {
            return Err(GameError::new(
                ErrorKind::NotFound,
                format!("Participant {} is not in session {}", participant, self.id),
            ));
        }

        if !self.abandon() {
            debug!(%participant, status = %self.status, "Participant left a finished session");
            return Ok(Departure::AlreadyOver);
        }

        let remaining = self.opponent_of(participant);
        info!(%participant, ?remaining, "Session abandoned");
        Ok(Departure::Abandoned { remaining })
    }

    /// Marks a live session `Abandoned`. Returns false if it was already terminal.
    pub fn abandon(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(SessionStatus::Abandoned);
        true
    }

    fn finish(&mut self, status: SessionStatus) {
        info!(session_id = %self.id, %status, moves = self.history.len(), "Session finished");
        self.status = status;
        self.finished_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paired() -> (Session, ParticipantId, ParticipantId) {
        let p1 = ParticipantId::new();
        let p2 = ParticipantId::new();
        let mut session = Session::new(SessionId::new(), p1);
        session.join(p2).unwrap();
        (session, p1, p2)
    }

    #[test]
    fn test_creator_waits_as_x() {
        let p1 = ParticipantId::new();
        let mut session = Session::new(SessionId::new(), p1);
        assert_eq!(session.status(), &SessionStatus::WaitingForSecondPlayer);
        assert_eq!(
            session.join(p1).unwrap(),
            Joined::new(Mark::X, SessionStatus::WaitingForSecondPlayer)
        );
    }

    #[test]
    fn test_second_join_starts_game() {
        let (session, p1, p2) = paired();
        assert_eq!(session.status(), &SessionStatus::InProgress);
        assert_eq!(session.turn(), &Mark::X);
        assert_eq!(session.mark_of(p1), Some(Mark::X));
        assert_eq!(session.mark_of(p2), Some(Mark::O));
        assert_eq!(session.participants(), vec![p1, p2]);
    }

    #[test]
    fn test_third_join_rejected() {
        let (mut session, _, _) = paired();
        let err = session.join(ParticipantId::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionFull);
    }

    #[test]
    fn test_waiting_session_rejects_moves() {
        let p1 = ParticipantId::new();
        let mut session = Session::new(SessionId::new(), p1);
        let err = session.apply_move(p1, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::GameNotInProgress);
    }

    #[test]
    fn test_stranger_move_not_found() {
        let (mut session, _, _) = paired();
        let err = session.apply_move(ParticipantId::new(), 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_rejected_move_changes_nothing() {
        let (mut session, _, p2) = paired();
        let before = session.clone();
        assert!(session.apply_move(p2, 0).is_err());
        assert_eq!(session.board(), before.board());
        assert_eq!(session.turn(), before.turn());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_abandon_from_waiting() {
        let p1 = ParticipantId::new();
        let mut session = Session::new(SessionId::new(), p1);
        assert_eq!(
            session.disconnect(p1).unwrap(),
            Departure::Abandoned { remaining: None }
        );
        assert!(session.finished_at().is_some());

        let err = session.join(ParticipantId::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::GameNotInProgress);
    }

    #[test]
    fn test_disconnect_after_finish_is_noop() {
        let (mut session, p1, p2) = paired();
        for (who, index) in [(p1, 0), (p2, 3), (p1, 1), (p2, 4), (p1, 2)] {
            session.apply_move(who, index).unwrap();
        }
        assert_eq!(session.disconnect(p2).unwrap(), Departure::AlreadyOver);
        assert_eq!(session.status(), &SessionStatus::WonByX);
    }
}
