pub(crate) mod agg;
pub(crate) mod color;
pub(crate) mod node;
pub(crate) mod piece;
pub(crate) mod pieces;

use std::ops::Range;
use std::sync::Arc;

use self::agg::Agg;
use self::color::Color;
use self::node::internal_node::InternalNode;
use self::node::Node;
use self::piece::Piece;
use super::buffers::BufferPool;

/// Order-statistic red-black tree over immutable `Piece`s. Positions are
/// expressed in the document's internal (post-sentinel) coordinate
/// space; see `PieceTree` for the +1 external-to-internal bias.
#[derive(Clone, Debug)]
pub(crate) struct Tree {
    pub(crate) root: Arc<Node>,
    pub(crate) node_count: u64,
}

impl Tree {
    #[inline]
    pub fn new() -> Tree {
        Tree {
            root: Arc::new(Node::Leaf),
            node_count: 0,
        }
    }

    #[inline(always)]
    pub fn max_height(&self) -> usize {
        #[inline(always)]
        fn log2(n: u64) -> usize {
            (u64::BITS - n.leading_zeros()) as usize
        }

        2 * log2(self.node_count + 1)
    }

    /// Insert `piece` at internal offset `pos`. When `allow_append` is
    /// set, a piece directly abutting an existing add-buffer piece is
    /// merged into it rather than inserted as a new node (spec §4.3.2
    /// continuous-append coalescing).
    #[inline]
    pub fn insert(&mut self, buffers: &BufferPool, pos: u64, piece: Piece, allow_append: bool) {
        let inserted = insert_rec(buffers, &mut self.root, pos, piece, true, allow_append);
        self.node_count += inserted.nodes;
    }

    /// Remove `range` (internal offsets) from the tree.
    pub fn remove(&mut self, buffers: &BufferPool, range: Range<u64>) {
        self.remove_capturing(buffers, range);
    }

    /// Remove `range`, returning the (possibly partial) pieces actually
    /// deleted, in order. Used by the delete mutation to record a
    /// `DeleteChange` capable of exact undo (spec §4.5 `DeleteChange`).
    pub fn remove_capturing(&mut self, buffers: &BufferPool, range: Range<u64>) -> Vec<Piece> {
        let mut removed_len = 0;
        let len = range.end - range.start;
        let mut captured = Vec::new();

        while removed_len < len {
            let removed = remove_rec(buffers, &mut self.root, range.start, len - removed_len, true);

            if removed.node {
                self.node_count -= 1;
            }

            removed_len += removed.piece.length;
            captured.push(removed.piece);

            if let Some(p) = removed.reinsert {
                removed_len -= p.length;

                let inserted = insert_rec(buffers, &mut self.root, range.start, p, true, true);
                self.node_count += inserted.nodes;
            }
        }

        captured
    }

    /// Descend to the node containing internal offset `target`, returning
    /// the root-to-node path and the node's own internal start offset.
    pub fn find_node(&self, mut target: u64) -> (Vec<&InternalNode>, u64) {
        let mut pos = 0;
        let mut stack = Vec::with_capacity(self.max_height());
        let mut node = self.root.as_ref();

        if node.is_leaf() {
            return (stack, pos);
        }

        loop {
            let n = node.internal_ref().unwrap();

            let node_left_len = n.left_agg.len;
            let node_piece = &n.piece;

            pos += node_left_len;

            if node_left_len > target {
                stack.push(n);
                pos -= node_left_len;
                node = &n.left;
            } else if node_left_len == target
                || node_left_len + node_piece.length > target
                || node_left_len + node_piece.length == target && n.right.is_leaf()
            {
                stack.push(n);
                return (stack, pos);
            } else {
                stack.push(n);
                target -= node_left_len + node_piece.length;
                pos += node_piece.length;
                node = &n.right;
            }
        }
    }

    /// Like `find_node`, but also returns the line-feed count preceding
    /// the located node. Used by the mutation engine to emit
    /// `start_line_feed_count` for diffs (spec §4.3.2/§4.3.3).
    pub fn find_node_with_lf(&self, mut target: u64) -> (Vec<&InternalNode>, u64, u64) {
        let mut pos = 0;
        let mut lf_before = 0;
        let mut stack = Vec::with_capacity(self.max_height());
        let mut node = self.root.as_ref();

        if node.is_leaf() {
            return (stack, pos, lf_before);
        }

        loop {
            let n = node.internal_ref().unwrap();
            let node_left_len = n.left_agg.len;
            let node_piece = &n.piece;

            if node_left_len > target {
                stack.push(n);
                node = &n.left;
            } else if node_left_len == target
                || node_left_len + node_piece.length > target
                || node_left_len + node_piece.length == target && n.right.is_leaf()
            {
                stack.push(n);
                pos += node_left_len;
                lf_before += n.left_agg.line_feeds;
                return (stack, pos, lf_before);
            } else {
                stack.push(n);
                pos += node_left_len + node_piece.length;
                lf_before += n.left_agg.line_feeds + node_piece.line_feed_count;
                target -= node_left_len + node_piece.length;
                node = &n.right;
            }
        }
    }

    /// Descend to the node that starts line number `line` (1-based, a
    /// line-feed-bearing node's position counts as starting the *next*
    /// line). Returns the root-to-node path, the node's internal start
    /// offset and the line-feed count preceding it.
    pub fn find_node_by_line(&self, mut line: u64) -> (Vec<&InternalNode>, u64, u64) {
        let mut pos = 0;
        let mut lf_before = 0;
        let mut stack = Vec::with_capacity(self.max_height());
        let mut node = self.root.as_ref();

        if node.is_leaf() {
            return (stack, pos, lf_before);
        }

        loop {
            let n = node.internal_ref().unwrap();
            let left_lf = n.left_agg.line_feeds;
            let left_len = n.left_agg.len;
            let piece_lf = n.piece.line_feed_count;

            if left_lf >= line {
                stack.push(n);
                node = &n.left;
            } else if left_lf + piece_lf >= line {
                stack.push(n);
                pos += left_len;
                lf_before += left_lf;
                return (stack, pos, lf_before);
            } else {
                stack.push(n);
                pos += left_len + n.piece.length;
                lf_before += left_lf + piece_lf;
                line -= left_lf + piece_lf;
                node = &n.right;
            }
        }
    }

    /// Whole-tree aggregate. `PieceTree` caches the running total instead
    /// of calling this on every query; kept for validation and for
    /// rebuilding the cache after a bulk construction.
    pub fn total(&self) -> Agg {
        fn rec(node: &Arc<Node>) -> Agg {
            match node.as_ref() {
                Node::Internal(n) => n.left_agg + Agg::of_piece(&n.piece) + rec(&n.right),
                _ => Agg::default(),
            }
        }
        rec(&self.root)
    }
}

struct Inserted {
    nodes: u64,
    agg: Agg,
}

fn insert_rec(
    buffers: &BufferPool,
    node: &mut Arc<Node>,
    mut index: u64,
    piece: Piece,
    at_root: bool,
    allow_append: bool,
) -> Inserted {
    if node.is_leaf() {
        let ins_agg = Agg::of_piece(&piece);
        let node_color = if at_root { Color::Black } else { Color::Red };
        *node = Arc::new(Node::new(node_color, piece));

        return Inserted {
            nodes: 1,
            agg: ins_agg,
        };
    }

    let node = Arc::make_mut(node).internal().unwrap();
    let node_left_len = node.left_agg.len;
    let node_piece_len = node.piece.length;

    let inserted = if node_left_len > index {
        let ret = insert_rec(buffers, &mut node.left, index, piece, false, allow_append);
        node.left_agg += ret.agg;
        ret
    } else if node_left_len == index {
        let ins_agg = Agg::of_piece(&piece);
        node.insert_left(piece);
        node.left_agg += ins_agg;
        Inserted {
            nodes: 1,
            agg: ins_agg,
        }
    } else if node_left_len + node_piece_len == index {
        let can_coalesce = allow_append
            && node.piece.buffer_index == 0
            && piece.buffer_index == 0
            && node.piece.line_feed_count == 0
            && node.piece.meta.is_none()
            && piece.meta.is_none()
            && node.piece.structural == piece.structural
            && node.piece.start + node.piece.length == piece.start;

        if can_coalesce {
            node.piece.length += piece.length;
            node.piece.line_feed_count += piece.line_feed_count;
            // No node is added here, only an existing one grows, but the
            // size/line-feed delta still needs to reach the ancestors'
            // `left_agg`.
            let mut agg = Agg::of_piece(&piece);
            agg.nodes = 0;
            Inserted { nodes: 0, agg }
        } else {
            let ins_agg = Agg::of_piece(&piece);
            node.insert_right(piece);
            Inserted {
                nodes: 1,
                agg: ins_agg,
            }
        }
    } else if node_left_len + node_piece_len > index {
        let offset = index - node_left_len;
        let left_lf = buffers.count_line_feeds(node.piece.buffer_index, node.piece.start, offset);
        let right_piece = node.piece.split_left(offset, left_lf);

        // Splitting the existing piece adds a node for its own
        // remainder plus a node for the newly inserted piece — two new
        // nodes total, even though only `piece`'s content is actually
        // new (the size/line-feed delta is still just `piece`'s).
        let mut agg = Agg::of_piece(&piece);
        agg.nodes = 2;
        node.insert_right(right_piece);
        node.insert_right(piece);

        Inserted { nodes: 2, agg }
    } else {
        index -= node_left_len + node_piece_len;
        insert_rec(buffers, &mut node.right, index, piece, false, allow_append)
    };

    if inserted.nodes > 0 {
        node.balance();
    }

    if at_root {
        node.color = Color::Black;
    }

    inserted
}

struct Removed {
    piece: Piece,
    node: bool,
    reinsert: Option<Piece>,
}

fn remove_rec(
    buffers: &BufferPool,
    node: &mut Arc<Node>,
    mut index: u64,
    len: u64,
    at_root: bool,
) -> Removed {
    if node.is_leaf() {
        unreachable!("remove_rec found leaf node");
    }

    let node_ref = Arc::make_mut(node);
    let n = node_ref.internal().unwrap();
    let n_left_len = n.left_agg.len;
    let n_piece_len = n.piece.length;

    let (removed, remove_cur_node) = if n_left_len > index {
        let removed = remove_rec(buffers, &mut n.left, index, len, false);
        n.left_agg -= Agg::of_piece(&removed.piece);
        (removed, false)
    } else if n_left_len == index {
        if len >= n_piece_len {
            let remove = Removed {
                piece: n.piece.clone(),
                node: true,
                reinsert: None,
            };
            (remove, true)
        } else {
            let lf = buffers.count_line_feeds(n.piece.buffer_index, n.piece.start, len);
            let rem_p = n.piece.split_right(len, lf);
            let remove = Removed {
                piece: rem_p,
                node: false,
                reinsert: None,
            };
            (remove, false)
        }
    } else if n_left_len + n_piece_len > index {
        let offset = index - n_left_len;
        let left_lf = buffers.count_line_feeds(n.piece.buffer_index, n.piece.start, offset);
        let mut right_p = n.piece.split_left(offset, left_lf);

        // `right_p` is everything from `index` to the piece's end, which
        // may be longer than what's actually being deleted. Split again
        // at `len` so `rem_p` covers exactly the deleted slice and the
        // leftover tail (if any) is what gets reinserted.
        let (rem_p, ins_p) = if len >= right_p.length {
            (right_p, None)
        } else {
            let lf = buffers.count_line_feeds(right_p.buffer_index, right_p.start, len);
            let removed_p = right_p.split_right(len, lf);
            (removed_p, Some(right_p))
        };

        let remove = Removed {
            piece: rem_p,
            node: false,
            reinsert: ins_p,
        };
        (remove, false)
    } else {
        index -= n_left_len + n_piece_len;
        let remove = remove_rec(buffers, &mut n.right, index, len, false);
        (remove, false)
    };

    if remove_cur_node {
        node_ref.remove();
    } else if removed.node {
        n.bubble();
    }

    if at_root {
        if let Node::Internal(n) = node_ref {
            n.color = Color::Black;
        } else {
            *node = Arc::new(Node::Leaf);
        }
    }

    removed
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::piece_tree::PieceTree;

    fn is_black_height_balanced(node: &Arc<Node>) -> bool {
        fn black_height(node: &Arc<Node>) -> Result<u64, ()> {
            match node.as_ref() {
                Node::Leaf => Ok(1),
                Node::BBLeaf => Ok(2),
                Node::Internal(node) => {
                    let left = black_height(&node.left)?;
                    let right = black_height(&node.right)?;
                    if left == right {
                        Ok(left + if node.color == Color::Black { 1 } else { 0 })
                    } else {
                        Err(())
                    }
                }
            }
        }

        black_height(node).is_ok()
    }

    fn left_aggs_match(node: &Arc<Node>) -> bool {
        fn subtree_agg(node: &Arc<Node>) -> Result<Agg, ()> {
            match node.as_ref() {
                Node::Leaf | Node::BBLeaf => Ok(Agg::default()),
                Node::Internal(node) => {
                    let left = subtree_agg(&node.left)?;
                    let right = subtree_agg(&node.right)?;
                    if left == node.left_agg {
                        Ok(left + Agg::of_piece(&node.piece) + right)
                    } else {
                        Err(())
                    }
                }
            }
        }

        subtree_agg(node).is_ok()
    }

    fn red_nodes_have_black_children(node: &Arc<Node>) -> bool {
        let self_ok = if node.color() == Color::Red {
            let node = node.internal_ref().unwrap();
            node.left.color() == Color::Black && node.right.color() == Color::Black
        } else {
            true
        };

        if let Node::Internal(n) = node.as_ref() {
            self_ok
                && red_nodes_have_black_children(&n.left)
                && red_nodes_have_black_children(&n.right)
        } else {
            self_ok
        }
    }

    pub(crate) fn is_valid_tree(tree: &Tree) -> Result<(), &'static str> {
        let root = &tree.root;
        if root.color() != Color::Black {
            return Err("root is not black");
        }
        if !is_black_height_balanced(root) {
            return Err("black height unbalanced");
        }
        if !red_nodes_have_black_children(root) {
            return Err("red node has red child");
        }
        if !left_aggs_match(root) {
            return Err("left aggregates are invalid");
        }
        Ok(())
    }

    #[test]
    fn insert_at_start() {
        let mut pt = PieceTree::new();
        pt.insert(0, "abcde").unwrap();
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
        pt.insert(0, "ab").unwrap();
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
    }

    #[test]
    fn insert_at_middle() {
        let mut pt = PieceTree::new();
        pt.insert(0, "abcde").unwrap();
        pt.insert(2, "ab").unwrap();
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
    }

    #[test]
    fn insert_at_end() {
        let mut pt = PieceTree::new();
        pt.insert(0, "abcde").unwrap();
        pt.insert(5, "ab").unwrap();
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
    }

    #[test]
    fn remove_start_middle_end() {
        let mut pt = PieceTree::new();
        pt.insert(0, "abcdefghij").unwrap();
        pt.delete(2, 5);
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
        pt.delete(0, 1);
        assert_eq!(Ok(()), is_valid_tree(&pt.tree));
    }

    #[test]
    fn remove_complex_middle() {
        let mut pt = PieceTree::new();
        pt.insert(0, "abcde").unwrap();
        pt.insert(2, "fg").unwrap();
        pt.insert(0, "hi").unwrap();
        pt.insert(9, "jk").unwrap();

        while pt.len() > 0 {
            let pos = pt.len() / 2;
            pt.delete(pos, 1);
            assert_eq!(Ok(()), is_valid_tree(&pt.tree));
        }
    }

    /// Seeded random insert/delete churn, the live version of the
    /// teacher's own commented-out `bug_finder`/`fuzz_found_bug_1`
    /// fuzz harness at the bottom of `buffer/src/piece_tree/tree.rs`.
    /// Checks all four spec §8 structural invariants after every step.
    #[test]
    fn random_insert_delete_keeps_tree_valid() {
        use rand_chacha::rand_core::{RngCore, SeedableRng};

        let seed = 67_319;
        let mut gen = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let mut pt = PieceTree::new();
        let mut model = String::new();

        for _ in 0..600 {
            let op = gen.next_u32() % 3;
            let len = pt.len();

            if op < 2 || len == 0 {
                let at = if len == 0 { 0 } else { (gen.next_u64() % (len + 1)) as i64 };
                let text = if gen.next_u32() % 5 == 0 { "line\nbreak\n" } else { "x" };
                pt.insert(at, text).unwrap();

                let byte_at = model.char_indices().nth(at as usize).map_or(model.len(), |(b, _)| b);
                model.insert_str(byte_at, text);
            } else {
                let at = (gen.next_u64() % (len + 1)) as i64;
                let del_len = (gen.next_u64() % 5 + 1).min(len - at as u64);
                pt.delete(at, del_len);

                let byte_at = model.char_indices().nth(at as usize).map_or(model.len(), |(b, _)| b);
                let byte_end = model
                    .char_indices()
                    .nth((at as u64 + del_len) as usize)
                    .map_or(model.len(), |(b, _)| b);
                model.replace_range(byte_at..byte_end, "");
            }

            assert_eq!(Ok(()), is_valid_tree(&pt.tree), "seed {seed}");
            let total = pt.tree.total();
            assert_eq!(total.len, pt.len() + 1, "cached length drifted from tree, seed {seed}");
            assert_eq!(
                total.line_feeds,
                pt.line_feed_count,
                "cached line-feed count drifted from tree, seed {seed}"
            );
        }

        assert_eq!(pt.get_text(), model);
    }
}
