//! Moves as first-class values.

use crate::{Mark, Position};
use serde::{Deserialize, Serialize};

/// A mark placed at a position.
///
/// Sessions keep these in order of acceptance, so the history can be
/// replayed against an empty [`Board`](crate::Board) to reproduce the
/// current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// The mark being placed.
    pub mark: Mark,
    /// Where it was placed.
    pub position: Position,
}

impl Move {
    /// Creates a new move.
    pub fn new(mark: Mark, position: Position) -> Self {
        Self { mark, position }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.mark, self.position.label())
    }
}
