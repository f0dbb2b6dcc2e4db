//! Proof-number search node

use crate::tree::{Children, CompactTree, TreeNode};
use crate::types::Move;

/// A search-tree node carrying proof numbers.
///
/// `phi` is the cost of proving the side to move wins, `delta` the
/// cost of proving the opponent does. The node is terminal once either
/// reaches zero. Children live in a contiguous arena block behind the
/// relocatable handle.
pub struct PnsNode {
    pub phi: u32,
    pub delta: u32,
    pub mv: Move,
    pub children: Children<PnsNode>,
}

impl Default for PnsNode {
    fn default() -> Self {
        PnsNode::new(Move::new(0, 0))
    }
}

impl TreeNode for PnsNode {
    fn children(&self) -> &Children<PnsNode> {
        &self.children
    }
}

impl PnsNode {
    /// Sentinels at the top of the (phi, delta) range. They sit just
    /// below 2^30 so the threshold arithmetic cannot overflow 32 bits.
    pub const LOSS: u32 = (1 << 30) - 1;
    pub const DRAW: u32 = (1 << 30) - 2;
    pub const INF: u32 = (1 << 30) - 3;

    pub fn new(mv: Move) -> PnsNode {
        PnsNode {
            phi: 1,
            delta: 1,
            mv,
            children: Children::new(),
        }
    }

    /// Overwrite the scalars, keeping the (empty) child handle.
    pub fn set(&mut self, mv: Move, phi: u32, delta: u32) {
        debug_assert!(self.children.empty(), "overwriting a node with children");
        self.mv = mv;
        self.phi = phi;
        self.delta = delta;
    }

    /// Seed (phi, delta) from an alpha-beta probe value in -2..=2,
    /// seen from the parent's mover.
    ///
    /// `weight` biases unknown children so narrow subtrees get searched
    /// first. With a tie assignment active, draw-ish probe results
    /// collapse to a win for whichever side holds the ties.
    pub fn set_from_probe(
        &mut self,
        mv: Move,
        value: i32,
        mover_holds_ties: bool,
        ties_assigned: bool,
        weight: u32,
    ) {
        let mut value = value;
        if ties_assigned && (value == 1 || value == -1) {
            value = if mover_holds_ties { 2 } else { -2 };
        }
        let (phi, delta) = match value {
            0 => (weight, weight),
            2 => (Self::LOSS, 0),
            -2 => (0, Self::LOSS),
            // a plain draw, no assignment
            _ => (0, Self::DRAW),
        };
        self.set(mv, phi, delta);
    }

    #[inline]
    pub fn terminal(&self) -> bool {
        self.phi == 0 || self.delta == 0
    }

    /// Nodes in the subtree below this one.
    pub fn size(&self) -> u64 {
        let mut num = self.children.num() as u64;
        for c in self.children.as_slice() {
            num += c.size();
        }
        num
    }

    /// Free the whole subtree below this node, children-first so every
    /// block is empty of handles by the time it is returned. Returns
    /// the number of nodes released.
    pub fn dealloc_subtree(&mut self, ct: &CompactTree<PnsNode>) -> u64 {
        let mut num = 0;
        for c in self.children.as_mut_slice() {
            num += c.dealloc_subtree(ct);
        }
        num + self.children.dealloc(ct) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_conversion_without_ties() {
        let mut n = PnsNode::new(Move::new(0, 0));
        n.set_from_probe(Move::new(1, 1), 0, false, false, 5);
        assert_eq!((n.phi, n.delta), (5, 5));
        assert!(!n.terminal());

        n.set_from_probe(Move::new(1, 1), 2, false, false, 1);
        assert_eq!((n.phi, n.delta), (PnsNode::LOSS, 0));
        assert!(n.terminal());

        n.set_from_probe(Move::new(1, 1), -2, false, false, 1);
        assert_eq!((n.phi, n.delta), (0, PnsNode::LOSS));

        n.set_from_probe(Move::new(1, 1), 1, false, false, 1);
        assert_eq!((n.phi, n.delta), (0, PnsNode::DRAW));
    }

    #[test]
    fn test_probe_conversion_assigns_ties() {
        let mut n = PnsNode::new(Move::new(0, 0));
        // mover holds the ties: a draw-ish value becomes a win
        n.set_from_probe(Move::new(1, 1), 1, true, true, 1);
        assert_eq!((n.phi, n.delta), (PnsNode::LOSS, 0));
        // opponent holds them: it becomes a loss
        n.set_from_probe(Move::new(1, 1), -1, false, true, 1);
        assert_eq!((n.phi, n.delta), (0, PnsNode::LOSS));
    }

    #[test]
    fn test_subtree_size_and_dealloc() {
        let ct = CompactTree::new();
        let mut root = Box::new(PnsNode::new(Move::new(0, 0)));
        root.children.alloc(3, &ct);
        root.children.as_mut_slice()[1].children.alloc(2, &ct);
        assert_eq!(root.size(), 5);

        assert_eq!(root.dealloc_subtree(&ct), 5);
        assert_eq!(root.size(), 0);
        assert_eq!(ct.mem_in_use(), 0);
    }
}
