//! Game session state
//!
//! The board plus its move history. Undo replays the history from a
//! fresh board, which keeps the union-find state byte-identical to
//! never having played the undone moves.

use havannah_core::board::InvalidSize;
use havannah_core::{Board, Move, Player};

pub struct Game {
    size: u8,
    hist: Vec<Move>,
    board: Board,
}

impl Game {
    pub fn new(size: u8) -> Result<Game, InvalidSize> {
        Ok(Game {
            size,
            hist: Vec::new(),
            board: Board::new(size)?,
        })
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn to_play(&self) -> Player {
        self.board.to_play()
    }

    #[inline]
    pub fn hist(&self) -> &[Move] {
        &self.hist
    }

    pub fn valid(&self, m: Move) -> bool {
        self.board.valid_move(m)
    }

    pub fn play(&mut self, m: Move) -> bool {
        if self.board.place(m) {
            self.hist.push(m);
            true
        } else {
            false
        }
    }

    /// Drop the last `n` moves by replaying the rest.
    pub fn undo(&mut self, n: usize) {
        let keep = self.hist.len().saturating_sub(n);
        self.hist.truncate(keep);
        self.board = Board::new(self.size).expect("size was valid at construction");
        for i in 0..self.hist.len() {
            self.board.place(self.hist[i]);
        }
    }

    pub fn clear(&mut self) {
        self.hist.clear();
        self.board = Board::new(self.size).expect("size was valid at construction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_records_history() {
        let mut game = Game::new(4).unwrap();
        assert!(game.play(Move::new(0, 0)));
        assert!(game.play(Move::new(3, 3)));
        assert!(!game.play(Move::new(0, 0)));
        assert_eq!(game.hist(), &[Move::new(0, 0), Move::new(3, 3)]);
    }

    #[test]
    fn test_undo_restores_board_exactly() {
        let mut game = Game::new(4).unwrap();
        game.play(Move::new(0, 0));
        let snapshot = game.board().clone();
        game.play(Move::new(3, 3));
        game.play(Move::new(1, 1));

        game.undo(2);
        assert_eq!(game.board(), &snapshot);
        assert_eq!(game.hist().len(), 1);
        assert_eq!(game.to_play(), Player::P2);
    }

    #[test]
    fn test_undo_past_start_clears() {
        let mut game = Game::new(4).unwrap();
        game.play(Move::new(0, 0));
        game.undo(5);
        assert_eq!(game.hist().len(), 0);
        assert_eq!(game.to_play(), Player::P1);
    }
}
