//! Havannah engine core
//!
//! Board representation with incremental win detection, a lower-bound
//! distance heuristic, and two solvers (iterative-deepening alpha-beta
//! and depth-first proof-number search) backed by a compacting arena
//! for the search tree.

pub mod board;
pub mod lbdist;
pub mod solver;
pub mod timer;
pub mod tree;
pub mod types;

pub use board::Board;
pub use lbdist::LbDists;
pub use solver::{PnsNode, Solution, SolverAb, SolverDfpn};
pub use timer::Timer;
pub use tree::{Children, CompactTree};
pub use types::{Coords, Move, MoveParseError, Outcome, Player, NEIGHBOURS};
