//! Basic types
//!
//! The small value types shared by every other module: the player to
//! move, the game outcome, and the axial board coordinate.

mod hex;
mod outcome;
mod player;

pub use hex::{Coords, Move, MoveParseError, NEIGHBOURS};
pub use outcome::Outcome;
pub use player::Player;
