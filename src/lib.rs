mod error;
mod piece_tree;

pub use error::PieceTreeError;
pub use piece_tree::{
    Diff, DiffKind, Line, LinePiece, Meta, Patch, PatchOp, PieceInfo, PieceTree, PieceTreeBuilder,
    PublicPieceType, BEFORE_FIRST_LINE,
};
