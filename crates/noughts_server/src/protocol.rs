//! WebSocket protocol: JSON messages between browsers and the server.
//!
//! Every frame is an envelope `{"event": <name>, "data": <payload>}`.

use crate::ErrorKind;
use crate::session::SessionId;
use noughts::{Mark, Outcome};
use serde::{Deserialize, Serialize};

/// Client → server message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Place the sender's mark. Any `player` field sent alongside is ignored;
    /// the server decides who is moving.
    #[serde(alias = "makeMove")]
    Move(MovePayload),
}

/// Payload of a `move` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    /// Board index, 0-8 row-major. Signed so that negative indices are
    /// reported as out of range rather than as malformed.
    pub index: i64,
}

/// Final result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FinalOutcome {
    /// A mark completed a line.
    Won {
        /// The winning mark.
        winner: Mark,
    },
    /// Board filled with no line.
    Draw,
}

impl FinalOutcome {
    /// Converts a board outcome, `None` while the game is running.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::InProgress => None,
            Outcome::Won(winner) => Some(FinalOutcome::Won { winner }),
            Outcome::Draw => Some(FinalOutcome::Draw),
        }
    }
}

/// Server → client event, always addressed to specific participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Queued until an opponent connects.
    Waiting {
        /// The pending session.
        session_id: SessionId,
    },
    /// Paired with an opponent.
    Paired {
        /// The recipient's mark.
        mark: Mark,
        /// The session both participants play in.
        session_id: SessionId,
    },
    /// The board after an accepted move (or the empty board at pairing).
    BoardUpdate {
        /// Squares in row-major order.
        board: [Option<Mark>; 9],
        /// Mark to move, `null` once the game is over.
        next_turn: Option<Mark>,
    },
    /// The game finished with a win or draw.
    GameResult {
        /// How it ended.
        outcome: FinalOutcome,
    },
    /// The opponent disconnected before the game finished.
    OpponentLeft,
    /// The recipient's last message was not applied.
    Rejected {
        /// Reason code.
        reason: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

impl ServerEvent {
    /// Returns the wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Waiting { .. } => "waiting",
            ServerEvent::Paired { .. } => "paired",
            ServerEvent::BoardUpdate { .. } => "boardUpdate",
            ServerEvent::GameResult { .. } => "gameResult",
            ServerEvent::OpponentLeft => "opponentLeft",
            ServerEvent::Rejected { .. } => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_move_deserialize() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"move","data":{"index":4}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move(MovePayload { index: 4 }));
    }

    #[test]
    fn test_legacy_make_move_accepted() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"makeMove","data":{"index":2,"player":"O"}}"#)
                .unwrap();
        assert_eq!(msg, ClientMessage::Move(MovePayload { index: 2 }));
    }

    #[test]
    fn test_negative_index_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"move","data":{"index":-1}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move(MovePayload { index: -1 }));
    }

    #[test]
    fn test_malformed_moves_fail() {
        for text in [
            r#"{"event":"move","data":{"index":"4"}}"#,
            r#"{"event":"move","data":{"index":4.5}}"#,
            r#"{"event":"move","data":{}}"#,
            r#"{"event":"jump","data":{"index":4}}"#,
            r#"not json"#,
        ] {
            assert!(serde_json::from_str::<ClientMessage>(text).is_err(), "{text}");
        }
    }

    #[test]
    fn test_board_update_serialize() {
        let mut board = [None; 9];
        board[4] = Some(Mark::X);
        let evt = ServerEvent::BoardUpdate {
            board,
            next_turn: Some(Mark::O),
        };
        let value = serde_json::to_value(&evt).unwrap();
        assert_eq!(value["event"], "boardUpdate");
        assert_eq!(value["data"]["board"][4], "X");
        assert_eq!(value["data"]["board"][0], json!(null));
        assert_eq!(value["data"]["nextTurn"], "O");
    }

    #[test]
    fn test_game_result_serialize() {
        let evt = ServerEvent::GameResult {
            outcome: FinalOutcome::Won { winner: Mark::X },
        };
        assert_eq!(
            serde_json::to_value(&evt).unwrap(),
            json!({"event": "gameResult", "data": {"outcome": {"kind": "won", "winner": "X"}}})
        );
    }

    #[test]
    fn test_opponent_left_has_no_payload() {
        let json = serde_json::to_string(&ServerEvent::OpponentLeft).unwrap();
        assert_eq!(json, r#"{"event":"opponentLeft"}"#);
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ServerEvent::OpponentLeft);
    }

    #[test]
    fn test_rejected_carries_reason_code() {
        let evt = ServerEvent::Rejected {
            reason: ErrorKind::CellOccupied,
            message: "Square Center is already occupied".to_string(),
        };
        let value = serde_json::to_value(&evt).unwrap();
        assert_eq!(value["data"]["reason"], "CellOccupied");
        assert_eq!(evt.name(), "rejected");
    }

    #[test]
    fn test_final_outcome_from_outcome() {
        assert_eq!(FinalOutcome::from_outcome(Outcome::InProgress), None);
        assert_eq!(
            FinalOutcome::from_outcome(Outcome::Draw),
            Some(FinalOutcome::Draw)
        );
    }
}
