use std::ops::{Add, AddAssign, Sub, SubAssign};

use super::piece::Piece;

/// Subtree aggregate: generalizes the teacher's single `left_subtree_len`
/// field to the three aggregates spec §3 requires per node
/// (size/line-feed-count/node-count), so the same rotation code that
/// kept `left_subtree_len` consistent keeps all three consistent too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Agg {
    pub(crate) len: u64,
    pub(crate) line_feeds: u64,
    pub(crate) nodes: u64,
}

impl Agg {
    pub fn of_piece(piece: &Piece) -> Agg {
        Agg {
            len: piece.length,
            line_feeds: piece.line_feed_count,
            nodes: 1,
        }
    }
}

impl Add for Agg {
    type Output = Agg;
    fn add(self, rhs: Agg) -> Agg {
        Agg {
            len: self.len + rhs.len,
            line_feeds: self.line_feeds + rhs.line_feeds,
            nodes: self.nodes + rhs.nodes,
        }
    }
}

impl Sub for Agg {
    type Output = Agg;
    fn sub(self, rhs: Agg) -> Agg {
        Agg {
            len: self.len - rhs.len,
            line_feeds: self.line_feeds - rhs.line_feeds,
            nodes: self.nodes - rhs.nodes,
        }
    }
}

impl AddAssign for Agg {
    fn add_assign(&mut self, rhs: Agg) {
        *self = *self + rhs;
    }
}

impl SubAssign for Agg {
    fn sub_assign(&mut self, rhs: Agg) {
        *self = *self - rhs;
    }
}
