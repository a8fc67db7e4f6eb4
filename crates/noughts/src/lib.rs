//! Pure tic-tac-toe board logic.
//!
//! This crate owns the board value type and the rules that evaluate it.
//! It knows nothing about players, connections or sessions: the server
//! crate binds participants to [`Mark`]s and drives a [`Board`] through
//! validated moves.
//!
//! # Example
//!
//! ```
//! use noughts::{Board, Mark, Outcome};
//!
//! let board = Board::new()
//!     .place(0, Mark::X)?
//!     .place(4, Mark::X)?
//!     .place(8, Mark::X)?;
//! assert_eq!(board.evaluate(), Outcome::Won(Mark::X));
//! # Ok::<(), noughts::BoardError>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod error;
mod position;
pub mod rules;
mod types;

// Crate-level exports - Board types
pub use types::{Board, Mark, Outcome, Square};

// Crate-level exports - Positions and moves
pub use action::Move;
pub use position::Position;

// Crate-level exports - Errors
pub use error::BoardError;
