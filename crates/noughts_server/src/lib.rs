//! Noughts server library - authoritative two-player tic-tac-toe.
//!
//! Browsers connect over a WebSocket. The server pairs connections into
//! isolated sessions, validates every move, enforces turn order, and sends
//! each result only to the two participants of the session it belongs to.
//!
//! # Architecture
//!
//! - **Session**: one game, its board, participants, turn and status
//! - **SessionRegistry**: FIFO pairing and participant → session lookup
//! - **Gateway**: inbound events → sessions, outbound events → outboxes
//! - **Transport**: axum WebSocket adapter in front of the gateway
//!
//! # Example
//!
//! ```no_run
//! use noughts_server::{ServerConfig, run};
//!
//! # async fn example() -> anyhow::Result<()> {
//! run(ServerConfig::default()).await
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod gateway;
mod protocol;
mod registry;
mod server;
mod session;
mod sync;
mod transport;

// Crate-level exports - Errors
pub use error::{ConfigError, ErrorKind, GameError};

// Crate-level exports - Configuration
pub use config::ServerConfig;

// Crate-level exports - Sessions
pub use registry::{Pairing, RegistryStats, Release, SessionRegistry, SharedSession};
pub use session::{Departure, Joined, MoveResult, ParticipantId, Session, SessionId, SessionStatus};

// Crate-level exports - Gateway and wire protocol
pub use gateway::{Gateway, Outbox};
pub use protocol::{ClientMessage, FinalOutcome, MovePayload, ServerEvent};

// Crate-level exports - Server
pub use server::{router, run, serve, spawn_reaper};
pub use transport::ws_handler;
