//! Lower bound on the moves left to win
//!
//! A rough lower bound on the number of additional moves a player
//! needs, computed by flood-filling from every corner and edge for
//! each side. Crossing between two stones the player already owns is
//! free, so the fill is a Dijkstra over edge costs 0/1 rather than a
//! plain breadth-first search.

use crate::board::Board;
use crate::types::{Move, Player, NEIGHBOURS};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Unreachable cells stay far, far away.
const FAR: u32 = 1000;

/// Corners are regions 0..6, edges 6..12.
const NUM_REGIONS: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq)]
struct MoveDist {
    pos: Move,
    dist: u32,
}

// min-heap ordering
impl Ord for MoveDist {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .cmp(&self.dist)
            .then_with(|| (other.pos.y, other.pos.x).cmp(&(self.pos.y, self.pos.x)))
    }
}

impl PartialOrd for MoveDist {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Distance tables `[region][player][cell]` for one board position.
pub struct LbDists {
    size_d: usize,
    dists: Vec<u32>,
}

impl LbDists {
    /// Flood the 12 regions for both players.
    pub fn new(board: &Board) -> LbDists {
        let size_d = board.diameter() as usize;
        let mut lb = LbDists {
            size_d,
            dists: vec![FAR; NUM_REGIONS * 2 * size_d * size_d],
        };

        let m = board.size() as i8 - 1;
        let e = board.diameter() as i8 - 1;

        for player in [Player::P1, Player::P2] {
            let mut queue = BinaryHeap::new();

            // corners
            for (region, corner) in [
                (0, Move::new(0, 0)),
                (1, Move::new(m, 0)),
                (2, Move::new(e, m)),
                (3, Move::new(e, e)),
                (4, Move::new(m, e)),
                (5, Move::new(0, m)),
            ] {
                lb.seed(board, &mut queue, corner, region, player);
                lb.flood(board, &mut queue, region, player);
            }

            // edges
            for region in 6..12 {
                for k in 1..m {
                    let seed = match region {
                        6 => Move::new(k, 0),
                        7 => Move::new(m + k, k),
                        8 => Move::new(e, m + k),
                        9 => Move::new(m + k, e),
                        10 => Move::new(k, m + k),
                        _ => Move::new(0, k),
                    };
                    lb.seed(board, &mut queue, seed, region, player);
                }
                lb.flood(board, &mut queue, region, player);
            }
        }
        lb
    }

    #[inline]
    fn idx(&self, region: usize, player: Player, pos: Move) -> usize {
        ((region * 2 + player.index() as usize - 1) * self.size_d + pos.y as usize) * self.size_d
            + pos.x as usize
    }

    fn seed(
        &mut self,
        board: &Board,
        queue: &mut BinaryHeap<MoveDist>,
        pos: Move,
        region: usize,
        player: Player,
    ) {
        // boundary cells held by the opponent do not connect
        if board.get(pos) != Some(player.other()) {
            let i = self.idx(region, player, pos);
            self.dists[i] = 0;
            queue.push(MoveDist { pos, dist: 0 });
        }
    }

    fn flood(
        &mut self,
        board: &Board,
        queue: &mut BinaryHeap<MoveDist>,
        region: usize,
        player: Player,
    ) {
        while let Some(cur) = queue.pop() {
            let colour = board.get(cur.pos);
            for &n in &NEIGHBOURS {
                let pos = cur.pos + n;
                if !board.on_board2(pos) || board.get(pos) == Some(player.other()) {
                    continue;
                }
                let mut dist = cur.dist + 1;
                // sliding between the player's own stones is free
                if colour == Some(player) && board.get(pos) == Some(player) {
                    dist -= 1;
                }
                let i = self.idx(region, player, pos);
                if self.dists[i] > dist {
                    self.dists[i] = dist;
                    queue.push(MoveDist { pos, dist });
                }
            }
        }
    }

    /// Lower bound for `player` winning through `pos`: the cheaper of
    /// reaching the two nearest corners or the three nearest edges.
    pub fn get_player(&self, pos: Move, player: Player) -> u32 {
        let mut list: SmallVec<[u32; 6]> = (0..6)
            .map(|r| self.dists[self.idx(r, player, pos)])
            .collect();
        partial_sort(&mut list, 2);
        let corners = list[0].saturating_add(list[1]);

        let mut list: SmallVec<[u32; 6]> = (6..12)
            .map(|r| self.dists[self.idx(r, player, pos)])
            .collect();
        partial_sort(&mut list, 3);
        let edges = list[0].saturating_add(list[1]).saturating_add(list[2]);

        corners.min(edges)
    }

    /// Lower bound for either player through `pos`.
    pub fn get(&self, pos: Move) -> u32 {
        self.get_player(pos, Player::P1)
            .min(self.get_player(pos, Player::P2))
    }
}

/// Selection-sort the smallest `max` entries to the front.
fn partial_sort(list: &mut [u32], max: usize) {
    for i in 0..max {
        let mut mini = i;
        for j in i + 1..list.len() {
            if list[mini] > list[j] {
                mini = j;
            }
        }
        list.swap(i, mini);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sort_prefix() {
        let mut list = [5, 3, 9, 1, 7, 2];
        partial_sort(&mut list, 3);
        assert_eq!(&list[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_empty_board_corner_bound() {
        let board = Board::new(3).unwrap();
        let dists = LbDists::new(&board);
        // a corner stone is two moves from the cheapest bridge
        assert_eq!(dists.get_player(Move::new(0, 0), Player::P1), 2);
        // both players see the same empty board
        assert_eq!(
            dists.get_player(Move::new(0, 0), Player::P1),
            dists.get_player(Move::new(0, 0), Player::P2)
        );
        assert_eq!(dists.get(Move::new(0, 0)), 2);
    }

    #[test]
    fn test_own_stones_slide_free() {
        let mut with_stones = Board::new(4).unwrap();
        // a wall along the top edge towards both corners
        with_stones.place_as(Move::new(1, 0), Player::P1);
        with_stones.place_as(Move::new(2, 0), Player::P1);

        let empty = LbDists::new(&Board::new(4).unwrap());
        let filled = LbDists::new(&with_stones);
        // the wall brings the remaining bridge cost down
        assert!(
            filled.get_player(Move::new(1, 0), Player::P1)
                < empty.get_player(Move::new(1, 0), Player::P1)
        );
    }

    #[test]
    fn test_opponent_cells_unreachable() {
        let mut board = Board::new(4).unwrap();
        board.place_as(Move::new(3, 3), Player::P2);
        let dists = LbDists::new(&board);
        assert!(dists.get_player(Move::new(3, 3), Player::P1) >= FAR);
    }

    #[test]
    fn test_opponent_stones_block() {
        let mut board = Board::new(3).unwrap();
        // black seals the corner off from its neighbours
        board.place_as(Move::new(1, 0), Player::P2);
        board.place_as(Move::new(1, 1), Player::P2);
        board.place_as(Move::new(0, 1), Player::P2);
        let dists = LbDists::new(&board);
        // corner region 0 reaches only its own cell for white now
        assert_eq!(dists.dists[dists.idx(0, Player::P1, Move::new(0, 0))], 0);
        assert!(dists.dists[dists.idx(0, Player::P1, Move::new(2, 2))] >= FAR);
    }

    #[test]
    fn test_lower_bound_is_sound() {
        // white to win needs at least lb more stones; a completed
        // bridge needs zero
        let mut board = Board::new(3).unwrap();
        board.place_as(Move::new(0, 0), Player::P1);
        board.place_as(Move::new(1, 0), Player::P1);
        let dists = LbDists::new(&board);
        // one more stone at the far corner finishes the bridge
        assert!(dists.get_player(Move::new(1, 0), Player::P1) <= 1);
    }
}
