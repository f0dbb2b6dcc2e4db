//! Board scenarios exercised through the public API.

use havannah_core::{Board, Move, Outcome, Player};

#[test]
fn first_stone_in_the_corner() {
    let mut board = Board::new(4).unwrap();
    assert_eq!(board.to_play(), Player::P1);
    assert!(board.place(Move::new(0, 0)));
    assert_eq!(board.to_play(), Player::P2);
    assert_eq!(board.get(Move::new(0, 0)), Some(Player::P1));
    assert_eq!(board.won(), Outcome::Unknown);
    // the new stone threatens nothing yet
    assert_eq!(board.moves_remain(), board.num_cells() - 1);
}

#[test]
fn bridge_connects_two_corners() {
    let mut board = Board::new(4).unwrap();
    // white walks the top edge from corner to corner
    for (i, m) in [
        Move::new(0, 0),
        Move::new(3, 0),
        Move::new(1, 0),
        Move::new(2, 0),
    ]
    .into_iter()
    .enumerate()
    {
        assert_eq!(board.won(), Outcome::Unknown, "won before move {i}");
        assert!(board.place_as(m, Player::P1));
    }
    assert_eq!(board.won(), Outcome::Win(Player::P1));
}

#[test]
fn fork_touches_three_edges() {
    let mut board = Board::new(4).unwrap();
    for m in [
        Move::new(2, 0), // edge 0
        Move::new(2, 1),
        Move::new(3, 2),
        Move::new(6, 4), // edge 2
        Move::new(5, 4),
        Move::new(4, 3),
        Move::new(1, 4), // edge 4
        Move::new(1, 3),
        Move::new(2, 3),
    ] {
        assert!(board.place_as(m, Player::P2));
        assert_eq!(board.won(), Outcome::Unknown);
    }
    assert!(board.place_as(Move::new(3, 3), Player::P2));
    assert_eq!(board.won(), Outcome::Win(Player::P2));
}

#[test]
fn ring_around_an_empty_hub() {
    let mut board = Board::new(4).unwrap();
    let ring = [
        Move::new(2, 2),
        Move::new(3, 2),
        Move::new(4, 3),
        Move::new(4, 4),
        Move::new(3, 4),
        Move::new(2, 3),
    ];
    for &m in &ring[..5] {
        assert!(board.place_as(m, Player::P1));
        assert_eq!(board.won(), Outcome::Unknown);
    }
    assert!(board.place_as(ring[5], Player::P1));
    assert_eq!(board.won(), Outcome::Win(Player::P1));
}

#[test]
fn outcome_latches_and_blocks_further_play() {
    let mut board = Board::new(4).unwrap();
    for m in [
        Move::new(0, 0),
        Move::new(3, 0),
        Move::new(1, 0),
        Move::new(2, 0),
    ] {
        board.place_as(m, Player::P1);
    }
    let won = board.won();
    assert_eq!(won, Outcome::Win(Player::P1));
    assert!(!board.place(Move::new(3, 3)));
    assert!(!board.place_as(Move::new(3, 3), Player::P2));
    assert_eq!(board.won(), won);
    assert_eq!(board.moves().count(), 0);
}

#[test]
fn replayed_games_are_identical() {
    let moves = [
        Move::new(3, 3),
        Move::new(0, 0),
        Move::new(2, 2),
        Move::new(6, 6),
        Move::new(4, 4),
        Move::new(1, 1),
    ];
    let mut a = Board::new(4).unwrap();
    let mut b = Board::new(4).unwrap();
    for &m in &moves {
        assert!(a.place(m));
    }
    for &m in &moves {
        assert!(b.place(m));
    }
    assert_eq!(a, b);
}

/// Deterministic pseudo-random playouts: every game ends in a decided
/// state, the decision latches, and a win is credited to the player
/// who just moved.
#[test]
fn playouts_always_terminate_decided() {
    for seed in 0..20u64 {
        let mut rng = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
        let mut board = Board::new(4).unwrap();
        let mut last_mover = None;

        loop {
            let legal: Vec<Move> = board.moves().collect();
            if legal.is_empty() {
                break;
            }
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let m = legal[(rng >> 33) as usize % legal.len()];
            let mover = board.to_play();
            assert!(board.place(m));
            last_mover = Some(mover);
            if board.won().is_decided() {
                break;
            }
        }

        let outcome = board.won();
        assert!(outcome.is_decided(), "seed {seed} never finished");
        match outcome {
            Outcome::Win(p) => assert_eq!(Some(p), last_mover, "seed {seed}"),
            Outcome::Draw => {
                assert_eq!(board.moves_remain(), 0, "seed {seed} drew early")
            }
            Outcome::Unknown => unreachable!(),
        }
        assert_eq!(board.moves().count(), 0);
    }
}
