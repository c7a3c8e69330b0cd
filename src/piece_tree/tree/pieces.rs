use std::ops::Range;

use super::node::internal_node::InternalNode;
use super::node::Node;
use super::piece::Piece;
use crate::piece_tree::PieceTree;

pub(crate) type Pieces<'a> = BoundedPieceIter<'a>;

/// Piece iterator bounded to an offset range. Used by range reads and by
/// diff emission, which only ever care about the pieces touching the
/// edited span.
#[derive(Debug, Clone)]
pub(crate) struct BoundedPieceIter<'a> {
    range: Range<u64>,
    iter: PieceIter<'a>,
}

impl<'a> BoundedPieceIter<'a> {
    #[inline]
    pub fn new(pt: &'a PieceTree, at: u64) -> BoundedPieceIter<'a> {
        let iter = PieceIter::new(pt, at);
        BoundedPieceIter {
            range: 0..pt.internal_len(),
            iter,
        }
    }

    #[inline]
    pub fn new_from_slice(pt: &'a PieceTree, at: u64, range: Range<u64>) -> BoundedPieceIter<'a> {
        let iter = PieceIter::new(pt, range.start + at);
        BoundedPieceIter { range, iter }
    }

    #[inline]
    fn shrink_to_range(&self, (mut p_start, mut piece): (u64, Piece)) -> Option<(u64, Piece)> {
        let p_end = p_start + piece.length;
        let Range { start, end } = self.range;

        if p_start < start {
            let diff = start - p_start;
            let lf = 0; // buffer-backed recount happens above the tree layer
            piece.split_right(diff, lf);
            p_start += diff;
        }

        if end < p_end {
            let keep = piece.length.saturating_sub(p_end - end);
            piece.split_left(keep, piece.line_feed_count.min(keep));
        }

        if piece.length == 0 {
            return None;
        }

        Some((p_start - start, piece))
    }

    #[inline]
    pub fn get(&self) -> Option<(u64, Piece)> {
        let pos_piece = self.iter.get()?;
        self.shrink_to_range(pos_piece)
    }

    #[inline]
    pub fn next(&mut self) -> Option<(u64, Piece)> {
        let (p_start, _) = self.iter.get()?;
        let Range { end, .. } = self.range;
        if end < p_start {
            return None;
        }

        let pos_piece = self.iter.next()?;
        self.shrink_to_range(pos_piece)
    }

    #[inline]
    pub fn prev(&mut self) -> Option<(u64, Piece)> {
        if let Some((p_start, _)) = self.iter.get() {
            let Range { start, .. } = self.range;
            if p_start <= start {
                return None;
            }
        }

        let pos_piece = self.iter.prev()?;
        self.shrink_to_range(pos_piece)
    }
}

/// Traverses pieces in the tree, in order, starting at internal offset
/// `at`.
#[derive(Debug, Clone)]
pub(crate) struct PieceIter<'a> {
    pt: &'a PieceTree,
    stack: Vec<&'a InternalNode>,
    pos: u64,
}

impl<'a> PieceIter<'a> {
    #[inline]
    pub(crate) fn new(pt: &'a PieceTree, at: u64) -> Self {
        let (stack, pos) = if at == pt.internal_len() {
            (Vec::with_capacity(pt.tree.max_height()), at)
        } else {
            pt.tree.find_node(at)
        };
        PieceIter { pt, stack, pos }
    }

    pub fn tree_next(&mut self) -> Option<&Piece> {
        let mut node = *self.stack.last()?;

        if let Node::Internal(right) = node.right.as_ref() {
            self.stack.push(right);
            node = right;

            while let Node::Internal(left) = node.left.as_ref() {
                self.stack.push(left);
                node = left;
            }

            Some(&node.piece)
        } else {
            self.stack.pop()?;

            while !self.stack.is_empty() {
                let left = self.stack.last()?.left.as_ref();

                if left
                    .internal_ref()
                    .map_or(false, |left| std::ptr::eq(left, node))
                {
                    return Some(&self.stack.last()?.piece);
                }

                node = self.stack.pop()?;
            }

            None
        }
    }

    fn tree_prev(&mut self) -> Option<&Piece> {
        let mut node = *self.stack.last()?;

        if let Node::Internal(left) = node.left.as_ref() {
            self.stack.push(left);
            node = left;

            while let Node::Internal(right) = node.right.as_ref() {
                self.stack.push(right);
                node = right;
            }

            Some(&node.piece)
        } else {
            self.stack.pop()?;

            while !self.stack.is_empty() {
                let right = self.stack.last()?.right.as_ref();

                if right
                    .internal_ref()
                    .map_or(false, |right| std::ptr::eq(right, node))
                {
                    return Some(&self.stack.last()?.piece);
                }

                node = self.stack.pop()?;
            }

            None
        }
    }

    #[inline(always)]
    pub fn get(&self) -> Option<(u64, Piece)> {
        let piece = self.stack.last().map(|&node| node.piece.clone())?;
        Some((self.pos(), piece))
    }

    #[inline]
    pub fn next(&mut self) -> Option<(u64, Piece)> {
        let prev_len = self.get()?.1.length;

        if let Some(p) = self.tree_next().cloned() {
            self.pos += prev_len;
            Some((self.pos, p))
        } else {
            self.pos = self.pt.internal_len();
            None
        }
    }

    #[inline]
    pub fn prev(&mut self) -> Option<(u64, Piece)> {
        if self.pos == 0 {
            return None;
        }

        if let Some(p) = self.tree_prev().cloned() {
            self.pos -= p.length;
            Some((self.pos, p))
        } else {
            let (stack, index) = self.pt.tree.find_node(self.pt.internal_len());
            self.stack = stack;
            self.pos = index;
            self.get()
        }
    }

    #[inline(always)]
    pub fn pos(&self) -> u64 {
        self.pos
    }
}
