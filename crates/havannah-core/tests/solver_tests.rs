//! End-to-end solver scenarios.

use havannah_core::{Board, Move, Player, Solution, SolverAb, SolverDfpn};

/// White to move on a size-4 board; d1 finishes the top bridge.
fn three_stones_to_win() -> Board {
    let mut board = Board::new(4).unwrap();
    for (m, p) in [
        (Move::new(0, 0), Player::P1),
        (Move::new(3, 3), Player::P2),
        (Move::new(1, 0), Player::P1),
        (Move::new(4, 4), Player::P2),
        (Move::new(2, 0), Player::P1),
        (Move::new(5, 5), Player::P2),
    ] {
        assert!(board.place_as(m, p));
    }
    assert_eq!(board.to_play(), Player::P1);
    board
}

#[test]
fn alpha_beta_nominates_the_winning_move() {
    let board = three_stones_to_win();
    let mut solver = SolverAb::new();
    assert_eq!(solver.solve(&board, 0.0, 3), Solution::Win(Player::P1));
    assert_eq!(solver.best_move, Some(Move::new(3, 0)));
    assert_eq!(solver.max_depth, 1);
}

#[test]
fn dfpn_solves_the_forced_win() {
    let mut solver = SolverDfpn::new(three_stones_to_win());
    assert_eq!(solver.solve(0.0, 64), Solution::Win(Player::P1));
    assert_eq!(solver.best_move, Some(Move::new(3, 0)));
}

#[test]
fn dfpn_outcome_is_stable_across_reruns() {
    // the ties double-run must give the same answer when repeated
    let mut solver = SolverDfpn::new(three_stones_to_win());
    let first = solver.solve(0.0, 64);
    let second = solver.solve(0.0, 64);
    assert_eq!(first, second);
    assert_eq!(first, Solution::Win(Player::P1));
}

#[test]
fn dfpn_and_alpha_beta_agree_on_a_lost_defence() {
    // black to move, white threatening both c1 and a3 on a size-3 board
    let mut board = Board::new(3).unwrap();
    for (m, p) in [
        (Move::new(0, 0), Player::P1),
        (Move::new(3, 3), Player::P2),
        (Move::new(1, 0), Player::P1),
        (Move::new(4, 4), Player::P2),
        (Move::new(0, 1), Player::P1),
    ] {
        assert!(board.place_as(m, p));
    }
    assert_eq!(board.to_play(), Player::P2);

    let mut ab = SolverAb::new();
    assert_eq!(ab.solve(&board, 0.0, 5), Solution::Win(Player::P1));

    let mut dfpn = SolverDfpn::new(board);
    assert_eq!(dfpn.solve(0.0, 64), Solution::Win(Player::P1));
}

#[test]
fn solvers_report_finished_games_without_searching() {
    let mut board = Board::new(4).unwrap();
    for m in [
        Move::new(0, 0),
        Move::new(3, 0),
        Move::new(1, 0),
        Move::new(2, 0),
    ] {
        board.place_as(m, Player::P1);
    }

    let mut ab = SolverAb::new();
    assert_eq!(ab.solve(&board, 0.0, 10), Solution::Win(Player::P1));
    assert_eq!(ab.nodes_seen, 0);

    let mut dfpn = SolverDfpn::new(board);
    assert_eq!(dfpn.solve(0.0, 64), Solution::Win(Player::P1));
    assert_eq!(dfpn.nodes_seen, 0);
}

#[test]
fn dfpn_tree_follows_the_game() {
    let mut solver = SolverDfpn::new(three_stones_to_win());
    assert_eq!(solver.solve(0.0, 64), Solution::Win(Player::P1));

    let winning = solver.best_move.unwrap();
    assert!(solver.play(winning));
    assert!(solver.board().won().is_decided());
    // the game is over: a fresh solve answers from the board alone
    assert_eq!(solver.solve(0.0, 64), Solution::Win(Player::P1));
}
