//! Core domain types for tic-tac-toe.

use crate::{BoardError, Position, rules};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

/// The symbol a participant plays as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Mark {
    /// Mark X (moves first).
    X,
    /// Mark O (moves second).
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square holding a mark.
    Occupied(Mark),
}

impl Square {
    /// Returns the mark in this square, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Square::Empty => None,
            Square::Occupied(mark) => Some(mark),
        }
    }
}

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No line is complete and at least one square is empty.
    InProgress,
    /// The mark completed a line.
    Won(Mark),
    /// Every square is filled and no line is complete.
    Draw,
}

impl Outcome {
    /// Returns true for `Won` and `Draw`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "In progress"),
            Outcome::Won(mark) => write!(f, "Player {} wins", mark),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

/// 3x3 tic-tac-toe board.
///
/// Boards are values: [`Board::place`] returns a new board and leaves the
/// receiver untouched, so a session can only change its board by
/// swapping in the result of an accepted placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
        }
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Square {
        self.squares[pos.to_index()]
    }

    /// Checks if the square at `index` is empty. Out-of-range indices are never empty.
    pub fn is_empty(&self, index: usize) -> bool {
        matches!(self.squares.get(index), Some(Square::Empty))
    }

    /// Returns all squares.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Returns the squares as optional marks, the shape sent to clients.
    pub fn cells(&self) -> [Option<Mark>; 9] {
        self.squares.map(Square::mark)
    }

    /// Checks if every square is occupied.
    pub fn is_full(&self) -> bool {
        rules::is_full(self)
    }

    /// Returns the empty positions.
    pub fn valid_moves(&self) -> Vec<Position> {
        Position::valid_moves(self)
    }

    /// Places `mark` at `index`, returning the updated board.
    ///
    /// # Errors
    ///
    /// - [`BoardError::OutOfRange`] if `index` is not in 0-8.
    /// - [`BoardError::CellOccupied`] if the square already holds a mark.
    #[instrument(skip(self))]
    pub fn place(&self, index: usize, mark: Mark) -> Result<Board, BoardError> {
        let pos = Position::from_index(index).ok_or(BoardError::OutOfRange(index))?;
        if self.get(pos) != Square::Empty {
            return Err(BoardError::CellOccupied(pos));
        }

        let mut next = self.clone();
        next.squares[index] = Square::Occupied(mark);
        trace!(position = %pos, %mark, "Placed mark");
        Ok(next)
    }

    /// Evaluates the board against the fixed winning lines.
    #[instrument(skip(self))]
    pub fn evaluate(&self) -> Outcome {
        if let Some(winner) = rules::check_winner(self) {
            Outcome::Won(winner)
        } else if rules::is_full(self) {
            Outcome::Draw
        } else {
            Outcome::InProgress
        }
    }

    /// Formats the board as a human-readable string.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let pos = row * 3 + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => (pos + 1).to_string(),
                    Square::Occupied(mark) => mark.to_string(),
                };
                result.push_str(&symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
