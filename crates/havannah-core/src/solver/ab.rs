//! Iterative-deepening alpha-beta
//!
//! Values live in {-2, -1, 0, 1, 2}: +-2 proven win/loss for the side
//! to move, +-1 at-least/at-most a draw, 0 unknown. At the last two
//! plies the search stops cloning boards and probes `test_win` for
//! both sides instead; two distinct immediate winning replies for the
//! opponent make the position a proven loss, since a double threat
//! cannot be parried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::Solution;
use crate::board::Board;
use crate::timer::Timer;
use crate::types::{Move, Outcome};

/// Iterative-deepening negamax solver.
pub struct SolverAb {
    timeout: Arc<AtomicBool>,
    pub outcome: Solution,
    pub best_move: Option<Move>,
    pub max_depth: i32,
    pub nodes_seen: u64,
}

impl Default for SolverAb {
    fn default() -> Self {
        SolverAb::new()
    }
}

impl SolverAb {
    pub fn new() -> SolverAb {
        SolverAb {
            timeout: Arc::new(AtomicBool::new(false)),
            outcome: Solution::Unknown,
            best_move: None,
            max_depth: 0,
            nodes_seen: 0,
        }
    }

    /// The cancellation flag an external deadline may set.
    pub fn timeout_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.timeout)
    }

    pub fn reset(&mut self) {
        self.outcome = Solution::Unknown;
        self.best_move = None;
        self.max_depth = 0;
        self.nodes_seen = 0;
        self.timeout.store(false, Ordering::Release);
    }

    /// Deepen up to `mdepth` plies within `time` seconds (0 = no limit).
    pub fn solve(&mut self, board: &Board, time: f64, mdepth: i32) -> Solution {
        self.reset();

        match board.won() {
            Outcome::Win(p) => {
                self.outcome = Solution::Win(p);
                return self.outcome;
            }
            Outcome::Draw => {
                self.outcome = Solution::Draw;
                return self.outcome;
            }
            Outcome::Unknown => {}
        }

        let _timer = (time > 0.0)
            .then(|| Timer::new(Duration::from_secs_f64(time), self.timeout_flag()));
        let start = Instant::now();
        let turn = board.to_play();

        self.max_depth = 1;
        while self.max_depth < mdepth && !self.timeout.load(Ordering::Acquire) {
            debug!("starting depth {}", self.max_depth);

            let ret = self.run_negamax(board, -2, 2);
            if ret != 0 {
                self.outcome = match ret {
                    -2 => {
                        self.best_move = None;
                        Solution::Win(turn.other())
                    }
                    2 => Solution::Win(turn),
                    _ => Solution::Draw,
                };
                info!(
                    "solved as {} at depth {} in {} msec, {} nodes",
                    self.outcome,
                    self.max_depth,
                    start.elapsed().as_millis(),
                    self.nodes_seen
                );
                return self.outcome;
            }
            self.max_depth += 1;
        }

        info!("gave up after {} msec", start.elapsed().as_millis());
        self.outcome
    }

    /// Root-level negamax that also tracks the best move.
    fn run_negamax(&mut self, board: &Board, mut alpha: i32, beta: i32) -> i32 {
        for m in board.move_list() {
            self.nodes_seen += 1;

            let mut next = board.clone();
            next.place(m);

            let value = -negamax(
                &mut next,
                self.max_depth - 1,
                -beta,
                -alpha,
                &mut self.nodes_seen,
                &self.timeout,
            );

            if value > alpha {
                alpha = value;
                self.best_move = Some(m);
            }
            if alpha >= beta {
                return beta;
            }
        }
        alpha
    }
}

/// Fixed-depth negamax over the {-2..2} value lattice, from the view
/// of the side to move. Also used by the proof-number solver to seed
/// fresh leaves.
pub(crate) fn negamax(
    board: &mut Board,
    depth: i32,
    mut alpha: i32,
    beta: i32,
    nodes_seen: &mut u64,
    timeout: &AtomicBool,
) -> i32 {
    match board.won() {
        // the previous mover ended the game
        Outcome::Win(_) => return -2,
        Outcome::Draw => return -1,
        Outcome::Unknown => {}
    }

    if depth <= 0 || timeout.load(Ordering::Relaxed) {
        return 0;
    }

    let to_play = board.to_play();
    let mut losses = 0;
    for m in board.move_list() {
        *nodes_seen += 1;

        let value = if depth <= 2 {
            // probe instead of applying the move
            if board
                .test_win(m, to_play.other())
                .winner()
                .is_some()
            {
                losses += 1;
            }
            match board.test_win(m, to_play) {
                Outcome::Unknown => 0,
                Outcome::Draw => 1,
                Outcome::Win(_) => 2,
            }
        } else {
            let mut next = board.clone();
            next.place(m);
            -negamax(&mut next, depth - 1, -beta, -alpha, nodes_seen, timeout)
        };

        if value > alpha {
            alpha = value;
        }
        if alpha >= beta {
            return beta;
        }
    }

    if losses >= 2 {
        return -2;
    }
    alpha
}
