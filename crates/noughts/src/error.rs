//! Board-level errors.

use crate::Position;

/// Error returned when a placement is rejected by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BoardError {
    /// The index does not name a square (must be 0-8).
    #[display("Position {} is out of range (must be 0-8)", _0)]
    OutOfRange(#[error(not(source))] usize),

    /// The square is already occupied.
    #[display("Square {} is already occupied", _0)]
    CellOccupied(#[error(not(source))] Position),
}
