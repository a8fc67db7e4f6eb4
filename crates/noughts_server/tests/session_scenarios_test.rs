//! Game scenarios played directly against a session.

use noughts::{Mark, Outcome};
use noughts_server::{Departure, ErrorKind, ParticipantId, Session, SessionId, SessionStatus};

fn paired() -> (Session, ParticipantId, ParticipantId) {
    let p1 = ParticipantId::new();
    let p2 = ParticipantId::new();
    let mut session = Session::new(SessionId::new(), p1);
    session.join(p2).expect("Second join");
    (session, p1, p2)
}

#[test]
fn test_occupied_square_then_valid_move() {
    let (mut session, p1, p2) = paired();
    assert_eq!(session.mark_of(p1), Some(Mark::X));
    assert_eq!(session.status(), &SessionStatus::InProgress);
    assert_eq!(session.turn(), &Mark::X);

    let result = session.apply_move(p1, 4).expect("Center is free");
    assert_eq!(result.next_turn, Some(Mark::O));

    let err = session.apply_move(p2, 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CellOccupied);

    let result = session.apply_move(p2, 0).expect("Corner is free");
    assert_eq!(result.next_turn, Some(Mark::X));
    assert_eq!(session.history().len(), 2);
}

#[test]
fn test_top_row_win_ends_game() {
    let (mut session, p1, p2) = paired();
    for (who, index) in [(p1, 0), (p2, 3), (p1, 1), (p2, 4)] {
        session.apply_move(who, index).expect("Valid move");
    }

    let result = session.apply_move(p1, 2).expect("Winning move");
    assert_eq!(result.outcome, Outcome::Won(Mark::X));
    assert_eq!(result.next_turn, None);
    assert_eq!(result.board.evaluate(), Outcome::Won(Mark::X));
    assert_eq!(session.status(), &SessionStatus::WonByX);

    for (who, index) in [(p2, 5), (p1, 8)] {
        let err = session.apply_move(who, index).unwrap_err();
        assert_eq!(err.kind, ErrorKind::GameNotInProgress);
    }
}

#[test]
fn test_o_can_win() {
    let (mut session, p1, p2) = paired();
    for (who, index) in [(p1, 0), (p2, 2), (p1, 1), (p2, 4), (p1, 8)] {
        session.apply_move(who, index).expect("Valid move");
    }
    let result = session.apply_move(p2, 6).expect("Winning move");
    assert_eq!(result.outcome, Outcome::Won(Mark::O));
    assert_eq!(session.status(), &SessionStatus::WonByO);
}

#[test]
fn test_full_board_draws_once() {
    let (mut session, p1, p2) = paired();
    // X O X / X O O / O X X
    let moves = [(p1, 0), (p2, 1), (p1, 2), (p2, 4), (p1, 3), (p2, 5), (p1, 7), (p2, 6)];
    for (who, index) in moves {
        let result = session.apply_move(who, index).expect("Valid move");
        assert_eq!(result.outcome, Outcome::InProgress);
    }

    let result = session.apply_move(p1, 8).expect("Last square");
    assert_eq!(result.outcome, Outcome::Draw);
    assert_eq!(session.status(), &SessionStatus::Draw);

    let final_board = session.board().clone();
    for who in [p1, p2] {
        for index in 0..9 {
            let err = session.apply_move(who, index).unwrap_err();
            assert_eq!(err.kind, ErrorKind::GameNotInProgress);
        }
    }
    assert_eq!(session.board(), &final_board);
    assert_eq!(session.status(), &SessionStatus::Draw);
}

#[test]
fn test_turns_alternate_until_terminal() {
    let (mut session, p1, p2) = paired();
    let order = [4, 0, 8, 2, 1, 7, 6, 3, 5];

    let mut expected = Mark::X;
    for index in order {
        let who = if expected == Mark::X { p1 } else { p2 };
        let result = session.apply_move(who, index).expect("Valid move");
        match result.next_turn {
            Some(next) => {
                assert_eq!(next, expected.opponent());
                expected = next;
            }
            None => {
                assert!(result.outcome.is_terminal());
                break;
            }
        }
    }
    assert!(session.is_terminal());
}

#[test]
fn test_out_of_turn_rejected() {
    let (mut session, _, p2) = paired();
    let err = session.apply_move(p2, 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotYourTurn);
}

#[test]
fn test_out_of_range_rejected() {
    let (mut session, p1, _) = paired();
    let err = session.apply_move(p1, 9).unwrap_err();
    assert_eq!(err.kind, ErrorKind::OutOfRange);
    assert_eq!(session.turn(), &Mark::X);
}

#[test]
fn test_disconnect_abandons_running_game() {
    let (mut session, p1, p2) = paired();
    session.apply_move(p1, 4).expect("Valid move");

    assert_eq!(
        session.disconnect(p2).expect("Known participant"),
        Departure::Abandoned { remaining: Some(p1) }
    );
    assert_eq!(session.status(), &SessionStatus::Abandoned);

    let err = session.apply_move(p1, 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GameNotInProgress);

    // Terminal: a second disconnect changes nothing.
    assert_eq!(
        session.disconnect(p1).expect("Known participant"),
        Departure::AlreadyOver
    );
}
