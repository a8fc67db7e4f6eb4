//! Error types for sessions, the registry and configuration.

use derive_more::{Display, Error};
use noughts::BoardError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Why an inbound event was rejected.
///
/// These are the reason codes carried by the `rejected` event, serialized
/// by variant name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, strum::EnumIter,
)]
pub enum ErrorKind {
    /// The targeted index is not a square on the board.
    OutOfRange,
    /// The targeted square already holds a mark.
    CellOccupied,
    /// The sender's mark is not the one to move.
    NotYourTurn,
    /// The session is waiting, finished or abandoned.
    GameNotInProgress,
    /// The session already has two participants.
    SessionFull,
    /// Unknown participant or session.
    NotFound,
    /// The inbound message could not be parsed.
    MalformedPayload,
}

/// Game error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{}: {} at {}:{}", kind, message, file, line)]
pub struct GameError {
    /// Reason code reported to the client.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GameError {
    /// Creates a new game error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<BoardError> for GameError {
    #[track_caller]
    fn from(err: BoardError) -> Self {
        let kind = match err {
            BoardError::OutOfRange(_) => ErrorKind::OutOfRange,
            BoardError::CellOccupied(_) => ErrorKind::CellOccupied,
        };
        Self::new(kind, err.to_string())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
