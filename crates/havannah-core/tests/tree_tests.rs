//! Arena behaviour exercised through the search-node API.

use havannah_core::tree::CompactTree;
use havannah_core::{Move, PnsNode};

#[test]
fn subtree_alloc_and_release_round_trip() {
    let tree: CompactTree<PnsNode> = CompactTree::new();
    let mut root = Box::new(PnsNode::new(Move::new(0, 0)));

    root.children.alloc(5, &tree);
    for (i, c) in root.children.as_mut_slice().iter_mut().enumerate() {
        c.set(Move::new(i as i8, 0), i as u32 + 1, 1);
    }
    root.children.as_mut_slice()[2].children.alloc(3, &tree);

    assert_eq!(root.size(), 8);
    assert!(tree.mem_in_use() > 0);

    assert_eq!(root.dealloc_subtree(&tree), 8);
    assert_eq!(tree.mem_in_use(), 0);
    assert!(root.children.empty());
}

#[test]
fn swap_twice_is_identity() {
    let tree: CompactTree<PnsNode> = CompactTree::new();
    let mut a = Box::new(PnsNode::new(Move::new(0, 0)));
    let mut b = Box::new(PnsNode::new(Move::new(1, 1)));
    a.children.alloc(2, &tree);
    b.children.alloc(7, &tree);
    a.children.as_mut_slice()[0].phi = 42;

    a.children.swap(&mut b.children);
    assert_eq!(a.children.num(), 7);
    assert_eq!(b.children.num(), 2);
    assert_eq!(b.children.as_slice()[0].phi, 42);

    a.children.swap(&mut b.children);
    assert_eq!(a.children.num(), 2);
    assert_eq!(a.children.as_slice()[0].phi, 42);

    a.dealloc_subtree(&tree);
    b.dealloc_subtree(&tree);
}

#[test]
fn compaction_preserves_a_live_tree() {
    let mut tree: CompactTree<PnsNode> = CompactTree::new();
    let mut root = Box::new(PnsNode::new(Move::new(0, 0)));
    let mut scratch = Box::new(PnsNode::new(Move::new(0, 0)));

    // interleave two trees, then drop one to leave holes behind
    root.children.alloc(6, &tree);
    scratch.children.alloc(6, &tree);
    for (i, c) in root.children.as_mut_slice().iter_mut().enumerate() {
        c.set(Move::new(i as i8, 1), 10 + i as u32, 20 + i as u32);
    }
    root.children.as_mut_slice()[4].children.alloc(2, &tree);
    root.children.as_mut_slice()[4].children.as_mut_slice()[1].phi = 7;

    scratch.dealloc_subtree(&tree);
    let live_before = root.size();

    tree.compact(0.0, 0.0);

    assert_eq!(root.size(), live_before);
    let kids = root.children.as_slice();
    for (i, c) in kids.iter().enumerate() {
        assert_eq!(c.mv, Move::new(i as i8, 1));
        assert_eq!(c.phi, 10 + i as u32);
        assert_eq!(c.delta, 20 + i as u32);
    }
    assert_eq!(kids[4].children.as_slice()[1].phi, 7);

    root.dealloc_subtree(&tree);
    assert_eq!(tree.mem_in_use(), 0);
}
