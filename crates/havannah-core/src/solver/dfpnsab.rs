//! Depth-first proof-number search with alpha-beta leaf probes
//!
//! Each node carries (phi, delta): the cost to prove the side to move
//! wins and the cost to prove the opponent does. The search descends
//! into the child with the smallest delta under per-node thresholds,
//! expanding fresh leaves through a one-ply negamax probe and seeding
//! their proof numbers from its value. Solved subtrees are released
//! eagerly; when the node budget runs out a garbage-collection sweep
//! reclaims every solved subtree and the search resumes.
//!
//! Havannah has draws, so a position is solved by running the search
//! twice, once with ties awarded to each player, and combining the two
//! answers into win / loss / draw / the partial outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::ab::negamax;
use super::{PnsNode, Solution};
use crate::board::Board;
use crate::lbdist::LbDists;
use crate::timer::Timer;
use crate::tree::CompactTree;
use crate::types::{Move, Outcome, Player};

/// Depth-first proof-number solver over a compacting arena.
pub struct SolverDfpn {
    timeout: Arc<AtomicBool>,
    pub outcome: Solution,
    pub best_move: Option<Move>,
    pub max_depth: i32,
    pub nodes_seen: u64,
    /// Weight unknown children by the remaining-moves lower bound
    /// instead of by the probe's node count.
    pub use_lbdist: bool,
    board: Board,
    tree: CompactTree<PnsNode>,
    root: Box<PnsNode>,
    nodes: i64,
    max_nodes: i64,
}

impl SolverDfpn {
    pub fn new(board: Board) -> SolverDfpn {
        SolverDfpn {
            timeout: Arc::new(AtomicBool::new(false)),
            outcome: Solution::Unknown,
            best_move: None,
            max_depth: 0,
            nodes_seen: 0,
            use_lbdist: false,
            board,
            tree: CompactTree::new(),
            root: Box::new(PnsNode::new(Move::new(0, 0))),
            nodes: 0,
            max_nodes: 0,
        }
    }

    /// The cancellation flag an external deadline may set.
    pub fn timeout_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.timeout)
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Live nodes in the search tree.
    #[inline]
    pub fn nodes(&self) -> i64 {
        self.nodes
    }

    pub fn reset(&mut self) {
        self.outcome = Solution::Unknown;
        self.best_move = None;
        self.max_depth = 0;
        self.nodes_seen = 0;
        self.timeout.store(false, Ordering::Release);
    }

    /// Install a new root position, discarding the whole tree.
    pub fn set_board(&mut self, board: Board) {
        self.board = board;
        self.clear_mem();
    }

    /// Play a move on the root board, advancing the root to the played
    /// child so its subtree survives. Everything else is released.
    pub fn play(&mut self, m: Move) -> bool {
        if !self.board.place(m) {
            return false;
        }
        self.reset();

        let before = self.nodes;
        let kept = {
            let Self {
                ref tree,
                ref mut root,
                ref mut nodes,
                ..
            } = *self;

            // pull the played child's scalars and subtree aside
            let mut keep = PnsNode::new(m);
            {
                let kids = root.children.as_mut_slice();
                if let Some(c) = kids.iter_mut().find(|c| c.mv == m) {
                    keep.phi = c.phi;
                    keep.delta = c.delta;
                    keep.children.swap(&mut c.children);
                }
            }

            *nodes -= root.dealloc_subtree(tree) as i64;
            root.set(keep.mv, keep.phi, keep.delta);
            root.children.swap(&mut keep.children);
            debug_assert_eq!(*nodes, root.size() as i64);
            *nodes
        };

        if before > 0 {
            debug!("tree nodes before: {before}, after: {kept}");
        }
        if kept == 0 {
            self.clear_mem();
        }
        true
    }

    /// Drop the tree and hand the arena's memory back to the OS.
    pub fn clear_mem(&mut self) {
        self.reset();
        self.clear_root();
        self.tree.compact(0.0, 0.0);
    }

    fn clear_root(&mut self) {
        let Self {
            ref tree,
            ref mut root,
            ref mut nodes,
            ..
        } = *self;
        *nodes -= root.dealloc_subtree(tree) as i64;
        debug_assert_eq!(*nodes, 0);
        **root = PnsNode::new(Move::new(0, 0));
        *nodes = 0;
    }

    /// Solve the root position within `time` seconds (0 = no limit) and
    /// `mem_mib` MiB of tree nodes.
    pub fn solve(&mut self, time: f64, mem_mib: u64) -> Solution {
        self.reset();

        match self.board.won() {
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

        let turn = self.board.to_play();
        let other = turn.other();

        // first run: ties count against the side to move
        let ret1 = self.run_dfpnsab(other, mem_mib);
        if ret1 == 1 {
            self.outcome = Solution::Win(turn);
        } else {
            let ret2 = self.run_dfpnsab(turn, mem_mib);
            if ret2 == -1 {
                self.outcome = Solution::Win(other);
            } else {
                self.outcome = match (ret1, ret2) {
                    (-1, 1) => Solution::Draw,
                    (-1, 0) => Solution::WinOrDraw(other),
                    (0, 1) => Solution::WinOrDraw(turn),
                    _ => Solution::Unknown,
                };
            }
        }

        info!(
            "finished as {} in {} msec, {} nodes seen",
            self.outcome,
            start.elapsed().as_millis(),
            self.nodes_seen
        );
        self.outcome
    }

    /// One proof-number run with ties awarded to `ties`.
    /// Returns 1 = the side to move wins, -1 = loses, 0 = unknown.
    fn run_dfpnsab(&mut self, ties: Player, mem_mib: u64) -> i32 {
        // proof numbers seeded under one tie assignment do not carry
        // over to the other: start from a fresh root
        self.clear_root();
        self.max_nodes =
            (mem_mib * 1024 * 1024 / std::mem::size_of::<PnsNode>() as u64) as i64;
        debug!(
            "ties to {ties}, max nodes: {}, max memory: {mem_mib} MiB",
            self.max_nodes
        );

        while !self.timeout.load(Ordering::Acquire) && !self.root.terminal() {
            let in_memory = {
                let Self {
                    ref board,
                    ref tree,
                    ref mut root,
                    ref timeout,
                    ref mut nodes,
                    ref mut nodes_seen,
                    ref mut max_depth,
                    max_nodes,
                    use_lbdist,
                    ..
                } = *self;
                let mut worker = DfpnWorker {
                    tree,
                    timeout: timeout.as_ref(),
                    ties,
                    use_lbdist,
                    max_nodes,
                    nodes,
                    nodes_seen,
                    max_depth,
                };
                worker.dfpnsab(board, root, 0, PnsNode::INF / 2, PnsNode::INF / 2)
            };

            if !in_memory {
                let before = self.nodes;
                self.garbage_collect();
                info!(
                    "garbage collection cleaned up {} nodes, {} of {} MiB still in use",
                    before - self.nodes,
                    self.nodes * std::mem::size_of::<PnsNode>() as i64 / 1024 / 1024,
                    mem_mib
                );
                if self.nodes >= self.max_nodes {
                    break;
                }
            }
        }

        if self.root.phi == 0 {
            for c in self.root.children.as_slice() {
                if c.delta == 0 {
                    self.best_move = Some(c.mv);
                }
            }
            return 1;
        }
        if self.root.delta == 0 {
            return -1;
        }
        0
    }

    /// Post-order sweep releasing the children of every solved node.
    fn garbage_collect(&mut self) {
        let Self {
            ref tree,
            ref mut root,
            ref mut nodes,
            ..
        } = *self;
        *nodes -= gc_solved(tree, root);
    }
}

fn gc_solved(tree: &CompactTree<PnsNode>, node: &mut PnsNode) -> i64 {
    let mut freed = 0;
    for c in node.children.as_mut_slice() {
        if c.children.empty() {
            continue;
        }
        if c.terminal() {
            freed += c.dealloc_subtree(tree) as i64;
        } else {
            freed += gc_solved(tree, c);
        }
    }
    freed
}

/// Borrowed view of the solver used by the recursion, so the root node
/// and the bookkeeping fields can be held mutably at the same time.
struct DfpnWorker<'a> {
    tree: &'a CompactTree<PnsNode>,
    timeout: &'a AtomicBool,
    ties: Player,
    use_lbdist: bool,
    max_nodes: i64,
    nodes: &'a mut i64,
    nodes_seen: &'a mut u64,
    max_depth: &'a mut i32,
}

impl DfpnWorker<'_> {
    /// Returns false when the node budget is exhausted.
    fn dfpnsab(
        &mut self,
        board: &Board,
        node: &mut PnsNode,
        depth: i32,
        tp: u32,
        td: u32,
    ) -> bool {
        if depth > *self.max_depth {
            *self.max_depth = depth;
        }

        if node.children.empty() {
            if *self.nodes >= self.max_nodes {
                return false;
            }

            let moves = board.move_list();
            *self.nodes += node.children.alloc(moves.len() as u16, self.tree) as i64;
            *self.nodes_seen += moves.len() as u64;

            let mover_holds_ties = board.to_play() == self.ties;
            let dists = self.use_lbdist.then(|| LbDists::new(board));
            let kids = node.children.as_mut_slice();
            for (child, m) in kids.iter_mut().zip(moves) {
                let mut next = board.clone();
                next.place(m);

                let before = *self.nodes_seen;
                // one ply goes a surprisingly long way; deeper probes
                // cost more than they narrow
                let value = -negamax(&mut next, 1, -2, 2, self.nodes_seen, self.timeout);
                let weight = match &dists {
                    Some(d) => d.get(m).max(1),
                    None => 1 + (*self.nodes_seen - before) as u32,
                };

                child.set_from_probe(m, value, mover_holds_ties, true, weight);
            }

            update_pd_num(node);
            return true;
        }

        let mut in_memory = true;
        loop {
            let (i1, c1_mv, tpc, tdc) = {
                let kids = node.children.as_slice();
                let mut i1 = 0;
                let mut i2 = 0;
                for (i, c) in kids.iter().enumerate() {
                    if c.delta <= kids[i1].delta {
                        i2 = i1;
                        i1 = i;
                    }
                }
                let tpc = (td + kids[i1].phi)
                    .wrapping_sub(node.delta)
                    .min(PnsNode::INF / 2);
                let tdc = (kids[i2].delta + 1).min(tp);
                (i1, kids[i1].mv, tpc, tdc)
            };

            let mut next = board.clone();
            next.place(c1_mv);

            let child = &mut node.children.as_mut_slice()[i1];
            in_memory = self.dfpnsab(&next, child, depth + 1, tpc, tdc);

            // a solved child's subtree is dead weight
            if child.terminal() {
                *self.nodes -= child.dealloc_subtree(self.tree) as i64;
            }

            update_pd_num(node);

            if self.timeout.load(Ordering::Relaxed)
                || !in_memory
                || node.phi >= tp
                || node.delta >= td
            {
                break;
            }
        }
        in_memory
    }
}

/// phi is the cheapest child delta; delta the sum of child phis,
/// saturated so the threshold arithmetic stays inside 32 bits.
fn update_pd_num(node: &mut PnsNode) {
    let mut phi = PnsNode::INF;
    let mut delta: u64 = 0;
    for c in node.children.as_slice() {
        phi = phi.min(c.delta);
        delta += c.phi as u64;
    }
    node.phi = phi;
    node.delta = delta.min(PnsNode::INF as u64) as u32;
}
