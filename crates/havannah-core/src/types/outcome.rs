//! Game outcome

use super::Player;

/// Result of a game in progress or finished.
///
/// The wire encoding matches the board's cell encoding: -1 unknown,
/// 0 draw, 1/2 the winning player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unknown,
    Draw,
    Win(Player),
}

impl Outcome {
    /// True once the game is decided (win or draw).
    #[inline]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Outcome::Unknown)
    }

    /// The winner, if there is one.
    #[inline]
    pub const fn winner(self) -> Option<Player> {
        match self {
            Outcome::Win(p) => Some(p),
            _ => None,
        }
    }

    /// Wire encoding: -1 unknown, 0 draw, 1/2 winner.
    #[inline]
    pub const fn as_i8(self) -> i8 {
        match self {
            Outcome::Unknown => -1,
            Outcome::Draw => 0,
            Outcome::Win(p) => p.index() as i8,
        }
    }

    pub const fn from_i8(n: i8) -> Option<Outcome> {
        match n {
            -1 => Some(Outcome::Unknown),
            0 => Some(Outcome::Draw),
            1 => Some(Outcome::Win(Player::P1)),
            2 => Some(Outcome::Win(Player::P2)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Unknown => write!(f, "none"),
            Outcome::Draw => write!(f, "draw"),
            Outcome::Win(p) => write!(f, "{p}"),
        }
    }
}
