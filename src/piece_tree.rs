//! The engine's external interface (spec §6): a piece tree plus its
//! buffer pool and change history, exposed as one type so callers never
//! see the internal tree/mutation/meta split.

mod buffers;
mod builder;
mod change;
mod diff;
mod line;
mod meta;
mod mutation;
mod tree;

use std::ops::Range;

use self::buffers::BufferPool;
use self::change::{Change, ChangeStack};
use self::tree::piece::{Piece, PieceType};
use self::tree::pieces::BoundedPieceIter;
use self::tree::Tree;
use crate::error::PieceTreeError;

pub use self::builder::PieceTreeBuilder;
pub use self::diff::{Diff, DiffKind};
pub use self::line::{Line, LinePiece};
pub use self::meta::{Meta, Patch, PatchOp};
pub use self::tree::piece::PieceType as PublicPieceType;

/// Magic offset spec §9 names for `format`'s "before the first line"
/// case, kept for source parity. Prefer `format_before_first_line`.
pub const BEFORE_FIRST_LINE: i64 = -10_000;

/// A decoded, read-only view of one piece (spec §6 `get_pieces()`).
/// Plain text, not the internal `buffer_index`/`start` slice, since
/// those are an implementation detail external consumers never see.
#[derive(Clone, Debug, PartialEq)]
pub struct PieceInfo {
    pub text: String,
    pub length: u64,
    pub line_feed_count: u64,
    pub meta: Option<Meta>,
    pub piece_type: PieceType,
    pub structural: bool,
}

/// The piece-tree engine: an order-statistic red-black tree over an
/// append-only buffer pool, with per-piece metadata and a reversible
/// change history (spec §1-§5).
#[derive(Debug)]
pub struct PieceTree {
    tree: Tree,
    buffers: BufferPool,
    /// External length, excluding the leading sentinel.
    len: u64,
    /// Real line-feed count, excluding the sentinel (spec §3: total
    /// line count is this plus one).
    line_feed_count: u64,
    changes: ChangeStack,
}

impl PieceTree {
    #[inline]
    pub fn new() -> PieceTree {
        PieceTreeBuilder::new().build()
    }

    #[inline]
    pub(crate) fn internal_len(&self) -> u64 {
        self.len + 1
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get_length(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn get_line_count(&self) -> u64 {
        self.line_feed_count + 1
    }

    /// External offset `<= 0` clamps to internal offset 1 (just past the
    /// sentinel); out of range at the top clamps to `internal_len()`
    /// (spec §4.3.1).
    fn clamp_offset(&self, offset: i64) -> u64 {
        if offset <= 0 {
            1
        } else {
            (offset as u64 + 1).min(self.internal_len())
        }
    }

    /// Like `clamp_offset`, but recognises `BEFORE_FIRST_LINE` as
    /// internal offset 0 (spec §4.3.1, §9).
    fn clamp_offset_for_format(&self, offset: i64) -> u64 {
        if offset == BEFORE_FIRST_LINE {
            0
        } else {
            self.clamp_offset(offset)
        }
    }

    fn query_range(&self, from: i64, to: i64) -> (u64, u64) {
        let start = self.clamp_offset(from);
        let end = self.clamp_offset(to).max(start);
        (start, end)
    }

    /// Internal offset where 1-based line `line` begins, anchored on
    /// the (line-1)-th real line-feed node (the sentinel itself stands
    /// in for line 1's start and is never counted in `line_feed_count`
    /// — see DESIGN.md).
    fn line_start_offset(&self, line: u64) -> u64 {
        if line <= 1 {
            return 1.min(self.internal_len());
        }

        let rank = line - 1;
        if rank > self.line_feed_count {
            return self.internal_len();
        }

        let (stack, pos, _) = self.tree.find_node_by_line(rank);
        match stack.last() {
            Some(node) => pos + node.piece.length,
            None => self.internal_len(),
        }
    }

    /// `(start, end)` internal offsets spanning line `line`'s content
    /// plus its trailing real line-feed, if any. `None` when `line` is
    /// out of `[1, get_line_count()]` (spec §7: line helpers return an
    /// empty diff list for an out-of-range line).
    fn line_range_internal(&self, line: i64) -> Option<(u64, u64)> {
        if line < 1 {
            return None;
        }
        let line = line as u64;
        let count = self.get_line_count();
        if line > count {
            return None;
        }

        let start = self.line_start_offset(line);
        let end = if line < count {
            self.line_start_offset(line + 1)
        } else {
            self.internal_len()
        };
        Some((start, end))
    }

    fn content_end(&self, line: u64, end_incl: u64) -> u64 {
        if line < self.get_line_count() {
            end_incl.saturating_sub(1)
        } else {
            end_incl
        }
    }

    fn walk_range<F: FnMut(u64, &Piece)>(&self, range: Range<u64>, mut f: F) {
        let mut iter = BoundedPieceIter::new_from_slice(self, 0, range);
        let mut cur = iter.get();
        while let Some((pos, piece)) = cur {
            f(pos, &piece);
            cur = iter.next();
        }
    }

    // ---- mutation core, shared by offset-level and line-level API ----

    fn insert_core(
        &mut self,
        internal: u64,
        text: &str,
        meta: Option<Meta>,
    ) -> Result<Vec<Diff>, PieceTreeError> {
        let (diffs, change) = mutation::insert(&mut self.tree, &mut self.buffers, internal, text, meta)?;
        self.len += change.length;
        self.line_feed_count += diffs.iter().filter(|d| d.kind == DiffKind::Insert).count() as u64;
        self.changes.push(Change::Insert(change));
        Ok(diffs)
    }

    fn delete_core(&mut self, internal: u64, length: u64) -> Vec<Diff> {
        let (diffs, change) = mutation::delete(&mut self.tree, &mut self.buffers, internal, length);
        let removed_len: u64 = change.captured.iter().map(|c| c.length).sum();
        self.len -= removed_len;
        self.line_feed_count -= diffs.iter().filter(|d| d.kind == DiffKind::Remove).count() as u64;
        self.changes.push(Change::Delete(change));
        diffs
    }

    fn format_core(
        &mut self,
        internal: u64,
        length: u64,
        meta: &Meta,
        filter: Option<PieceType>,
    ) -> Vec<Diff> {
        let (diffs, change) = mutation::format(&mut self.tree, &mut self.buffers, internal, length, meta, filter);
        self.changes.push(Change::Format(change));
        diffs
    }

    fn invert_change(&mut self, change: &Change) -> Vec<Diff> {
        match change {
            Change::Insert(c) => {
                let diffs = mutation::delete(&mut self.tree, &mut self.buffers, c.offset, c.length).0;
                self.len -= c.length;
                self.line_feed_count -= diffs.iter().filter(|d| d.kind == DiffKind::Remove).count() as u64;
                diffs
            }
            Change::Delete(c) => {
                let diffs = mutation::reinsert_captured(&mut self.tree, &self.buffers, c.offset, &c.captured);
                let added_len: u64 = c.captured.iter().map(|p| p.length).sum();
                let added_lf: u64 = c.captured.iter().map(|p| p.line_feed_count).sum();
                self.len += added_len;
                self.line_feed_count += added_lf;
                diffs
            }
            Change::Format(c) => mutation::apply_piece_patches(&mut self.tree, &mut self.buffers, &c.patches),
        }
    }

    fn reapply_change(&mut self, change: &Change) -> Vec<Diff> {
        match change {
            Change::Insert(c) => {
                let text = if c.non_text {
                    String::new()
                } else {
                    self.buffers.text(0, c.buffer_start, c.length)
                };
                let (diffs, _) = mutation::insert(&mut self.tree, &mut self.buffers, c.offset, &text, c.meta.clone())
                    .expect("redo of a previously recorded insert cannot fail");
                self.len += c.length;
                self.line_feed_count += diffs.iter().filter(|d| d.kind == DiffKind::Insert).count() as u64;
                diffs
            }
            Change::Delete(c) => {
                let length: u64 = c.captured.iter().map(|p| p.length).sum();
                let diffs = mutation::delete(&mut self.tree, &mut self.buffers, c.offset, length).0;
                self.len -= length;
                self.line_feed_count -= diffs.iter().filter(|d| d.kind == DiffKind::Remove).count() as u64;
                diffs
            }
            Change::Format(c) => mutation::reapply_piece_patches(&mut self.tree, &mut self.buffers, &c.patches),
        }
    }

    // ---- mutations (spec §6) ----

    /// Inserts `text` at 0-based external `offset`. Fails only when
    /// `text` is empty (spec §7) — use `insert_meta` for a meta-only
    /// non-text piece.
    pub fn insert(&mut self, offset: i64, text: &str) -> Result<Vec<Diff>, PieceTreeError> {
        let internal = self.clamp_offset(offset);
        self.insert_core(internal, text, None)
    }

    /// Inserts `text` (may be empty, representing a non-text piece)
    /// carrying `meta` at `offset`.
    pub fn insert_meta(&mut self, offset: i64, text: &str, meta: Meta) -> Vec<Diff> {
        let internal = self.clamp_offset(offset);
        self.insert_core(internal, text, Some(meta))
            .expect("insert with meta never rejects empty text")
    }

    pub fn delete(&mut self, offset: i64, length: u64) -> Vec<Diff> {
        let internal = self.clamp_offset(offset);
        let length = length.min(self.internal_len() - internal);
        self.delete_core(internal, length)
    }

    pub fn format(&mut self, offset: i64, length: u64, meta: Meta) -> Vec<Diff> {
        self.format_with_filter(offset, length, meta, None)
    }

    pub fn format_text(&mut self, offset: i64, length: u64, meta: Meta) -> Vec<Diff> {
        self.format_with_filter(offset, length, meta, Some(PieceType::Text))
    }

    pub fn format_non_text(&mut self, offset: i64, length: u64, meta: Meta) -> Vec<Diff> {
        self.format_with_filter(offset, length, meta, Some(PieceType::NonText))
    }

    fn format_with_filter(&mut self, offset: i64, length: u64, meta: Meta, filter: Option<PieceType>) -> Vec<Diff> {
        let internal = self.clamp_offset_for_format(offset);
        let length = length.min(self.internal_len().saturating_sub(internal));
        self.format_core(internal, length, &meta, filter)
    }

    /// Formats the leading sentinel position (spec §9's clean
    /// replacement for passing `BEFORE_FIRST_LINE` to `format`).
    pub fn format_before_first_line(&mut self, meta: Meta) -> Vec<Diff> {
        self.format_core(0, 1, &meta, None)
    }

    // ---- line-level helpers (spec §6) ----

    pub fn insert_line_break(&mut self, line: i64, column: u64) -> Vec<Diff> {
        let Some((start, end_incl)) = self.line_range_internal(line) else {
            return Vec::new();
        };
        let content_end = self.content_end(line as u64, end_incl);
        let pos = (start + column).min(content_end);
        self.insert_core(pos, "\n", None)
            .expect("inserting a newline is never empty text")
    }

    /// Inserts `text` as a new line immediately before `line`, pushing
    /// `line` and everything after it down by one.
    pub fn insert_line(&mut self, line: i64, text: &str) -> Vec<Diff> {
        let Some((start, _)) = self.line_range_internal(line) else {
            return Vec::new();
        };
        let mut body = text.to_string();
        body.push('\n');
        self.insert_core(start, &body, None)
            .expect("a line body with an appended newline is never empty")
    }

    /// Deletes `line`'s content together with its trailing real
    /// line-feed, if any.
    pub fn delete_line(&mut self, line: i64) -> Vec<Diff> {
        let Some((start, end_incl)) = self.line_range_internal(line) else {
            return Vec::new();
        };
        self.delete_core(start, end_incl - start)
    }

    pub fn format_line(&mut self, line: i64, meta: Meta) -> Vec<Diff> {
        self.format_in_line_filtered(line, 0, u64::MAX, meta, None)
    }

    pub fn format_in_line(&mut self, line: i64, col_from: u64, col_to: u64, meta: Meta) -> Vec<Diff> {
        self.format_in_line_filtered(line, col_from, col_to, meta, None)
    }

    pub fn format_text_in_line(&mut self, line: i64, col_from: u64, col_to: u64, meta: Meta) -> Vec<Diff> {
        self.format_in_line_filtered(line, col_from, col_to, meta, Some(PieceType::Text))
    }

    pub fn format_non_text_in_line(&mut self, line: i64, col_from: u64, col_to: u64, meta: Meta) -> Vec<Diff> {
        self.format_in_line_filtered(line, col_from, col_to, meta, Some(PieceType::NonText))
    }

    fn format_in_line_filtered(
        &mut self,
        line: i64,
        col_from: u64,
        col_to: u64,
        meta: Meta,
        filter: Option<PieceType>,
    ) -> Vec<Diff> {
        let Some((start, end_incl)) = self.line_range_internal(line) else {
            return Vec::new();
        };
        let content_end = self.content_end(line as u64, end_incl);
        let from = (start + col_from).min(content_end);
        let to = (start + col_to).min(content_end);
        if to <= from {
            return Vec::new();
        }
        self.format_core(from, to - from, &meta, filter)
    }

    // ---- queries (spec §6) ----

    pub fn get_text(&self) -> String {
        self.get_text_in_range(0, self.len as i64)
    }

    pub fn get_text_in_range(&self, from: i64, to: i64) -> String {
        let (start, end) = self.query_range(from, to);
        let mut text = String::new();
        self.walk_range(start..end, |_, piece| {
            text.push_str(&self.buffers.text(piece.buffer_index, piece.start, piece.length));
        });
        text
    }

    pub fn get_pieces(&self) -> Vec<PieceInfo> {
        self.get_pieces_in_range(0, self.len as i64)
    }

    pub fn get_pieces_in_range(&self, from: i64, to: i64) -> Vec<PieceInfo> {
        let (start, end) = self.query_range(from, to);
        let mut out = Vec::new();
        self.walk_range(start..end, |_, piece| {
            out.push(PieceInfo {
                text: self.buffers.text(piece.buffer_index, piece.start, piece.length),
                length: piece.length,
                line_feed_count: piece.line_feed_count,
                meta: piece.meta.clone(),
                piece_type: piece.piece_type(),
                structural: piece.structural,
            });
        });
        out
    }

    fn build_line(&self, line: u64) -> Line {
        let Some((start, end_incl)) = self.line_range_internal(line as i64) else {
            return Line::empty();
        };
        let end = self.content_end(line, end_incl);
        if start >= end {
            return Line::empty();
        }

        let mut pieces = Vec::new();
        let mut meta = None;
        self.walk_range(start..end, |_, piece| {
            if meta.is_none() && piece.structural {
                meta = piece.meta.clone();
            }
            pieces.push(LinePiece {
                text: self.buffers.text(piece.buffer_index, piece.start, piece.length),
                length: piece.length,
                meta: piece.meta.clone(),
            });
        });

        if pieces.is_empty() {
            return Line::empty();
        }

        Line { meta, pieces }
    }

    /// 1-based; out-of-range numbers return the empty single-piece line
    /// shape rather than clamping, matching the source (spec §8 S1).
    pub fn get_line(&self, line_number: i64) -> Line {
        let line = if line_number <= 0 { 1 } else { line_number as u64 };
        if line > self.get_line_count() {
            return Line::empty();
        }
        self.build_line(line)
    }

    pub fn get_lines(&self) -> Vec<Line> {
        (1..=self.get_line_count()).map(|l| self.build_line(l)).collect()
    }

    pub fn get_line_meta(&self, line_number: i64) -> Option<Meta> {
        self.get_line(line_number).meta
    }

    pub fn for_each_piece<F: FnMut(&PieceInfo)>(&self, mut f: F) {
        for piece in self.get_pieces() {
            f(&piece);
        }
    }

    pub fn for_each_line<F: FnMut(&Line)>(&self, mut f: F) {
        for line in self.get_lines() {
            f(&line);
        }
    }

    // ---- history (spec §4.5, §6) ----

    pub fn start_change(&mut self) {
        self.changes.start_group();
    }

    pub fn end_change(&mut self) {
        self.changes.end_group();
    }

    /// Brackets `f` in a change group. A panicking `f` is caught and
    /// the group is still closed — the source swallows the exception
    /// and this is preserved on purpose (spec §7, §9).
    pub fn change<F: FnOnce(&mut PieceTree)>(&mut self, f: F) {
        self.start_change();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&mut *self)));
        self.end_change();
    }

    /// Undoes the most recent change group, applying each contained
    /// change's inverse in reverse order. The returned diffs come out
    /// already in the flipped direction, since the inverse mutation
    /// itself naturally emits `remove` where the forward one emitted
    /// `insert` (spec §4.5).
    pub fn undo(&mut self) -> Vec<Diff> {
        let Some(group) = self.changes.pop_undo() else {
            return Vec::new();
        };
        let mut diffs = Vec::new();
        for change in group.iter().rev() {
            diffs.extend(self.invert_change(change));
        }
        diffs
    }

    pub fn redo(&mut self) -> Vec<Diff> {
        let Some(group) = self.changes.pop_redo() else {
            return Vec::new();
        };
        let mut diffs = Vec::new();
        for change in group.iter() {
            diffs.extend(self.reapply_change(change));
        }
        diffs
    }
}

impl Default for PieceTree {
    fn default() -> Self {
        PieceTree::new()
    }
}
