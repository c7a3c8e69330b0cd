//! Insert/delete/format algorithms on top of the tree (spec §4.3). These
//! are free functions rather than methods so the forward mutation and
//! its inverse (used by undo/redo, see `piece_tree.rs`) share one
//! implementation instead of duplicating diff/line bookkeeping.

use log::trace;

use crate::error::PieceTreeError;
use crate::piece_tree::change::{CapturedPiece, DeleteChange, FormatChange, InsertChange, PiecePatch};
use crate::piece_tree::diff::Diff;
use crate::piece_tree::meta::{merge_meta, Meta};
use crate::piece_tree::tree::piece::{Piece, PieceType};
use crate::piece_tree::tree::Tree;

use super::buffers::BufferPool;

#[inline]
fn line_number_for(lf_before: u64) -> u64 {
    lf_before + 1
}

/// Inserts `text` (may contain `\n`) and optional `meta` at internal
/// offset `offset` (spec §4.3.2). Empty text with no meta is rejected:
/// every other empty-text call represents a non-text piece.
pub(crate) fn insert(
    tree: &mut Tree,
    buffers: &mut BufferPool,
    offset: u64,
    text: &str,
    meta: Option<Meta>,
) -> Result<(Vec<Diff>, InsertChange), PieceTreeError> {
    if text.is_empty() && meta.is_none() {
        return Err(PieceTreeError::EmptyInsert);
    }

    trace!("insert at {offset}, {} code units", text.encode_utf16().count());

    let (_, _, lf_before) = tree.find_node_with_lf(offset);
    let mut pos = offset;
    let mut lines_inserted: u64 = 0;

    if text.is_empty() {
        let piece = Piece::non_text(meta.clone());
        tree.insert(buffers, pos, piece, false);

        let diffs = vec![Diff::replace(line_number_for(lf_before))];
        return Ok((
            diffs.clone(),
            InsertChange {
                offset,
                buffer_start: 0,
                length: 1,
                meta,
                non_text: true,
                diffs,
            },
        ));
    }

    let buffer_start = buffers.add_len();
    let mut run = String::new();

    let flush_run = |run: &mut String, tree: &mut Tree, buffers: &mut BufferPool, pos: &mut u64| {
        if run.is_empty() && meta.is_none() {
            return;
        }
        let (start, length) = buffers.append(run);
        let mut piece = Piece::new(0, start, length, 0);
        piece.meta = meta.clone();
        tree.insert(buffers, *pos, piece, meta.is_none());
        *pos += length;
        run.clear();
    };

    for ch in text.chars() {
        if ch == '\n' {
            flush_run(&mut run, tree, buffers, &mut pos);

            let (start, length) = buffers.append("\n");
            let piece = Piece::new(0, start, length, 1);
            tree.insert(buffers, pos, piece, false);
            pos += length;
            lines_inserted += 1;
        } else {
            run.push(ch);
        }
    }
    flush_run(&mut run, tree, buffers, &mut pos);

    let length = pos - offset;

    let mut diffs = vec![Diff::replace(line_number_for(lf_before))];
    for i in 1..=lines_inserted {
        diffs.push(Diff::insert(line_number_for(lf_before + i)));
    }

    Ok((
        diffs.clone(),
        InsertChange {
            offset,
            buffer_start,
            length,
            meta,
            non_text: false,
            diffs,
        },
    ))
}

/// Removes `length` code units starting at internal offset `offset`
/// (spec §4.3.3).
pub(crate) fn delete(
    tree: &mut Tree,
    buffers: &mut BufferPool,
    offset: u64,
    length: u64,
) -> (Vec<Diff>, DeleteChange) {
    trace!("delete at {offset}, length {length}");

    if length == 0 {
        return (
            Vec::new(),
            DeleteChange {
                offset,
                captured: Vec::new(),
                diffs: Vec::new(),
            },
        );
    }

    let (_, _, lf_before) = tree.find_node_with_lf(offset);
    let removed = tree.remove_capturing(buffers, offset..offset + length);

    let lines_removed: u64 = removed.iter().map(|p| p.line_feed_count).sum();

    let mut diffs = vec![Diff::replace(line_number_for(lf_before))];
    for i in 1..=lines_removed {
        diffs.push(Diff::remove(line_number_for(lf_before + i)));
    }

    let captured = removed
        .into_iter()
        .map(|p| CapturedPiece {
            buffer_index: p.buffer_index,
            start: p.start,
            length: p.length,
            line_feed_count: p.line_feed_count,
            meta: p.meta,
            structural: p.structural,
        })
        .collect();

    (
        diffs.clone(),
        DeleteChange {
            offset,
            captured,
            diffs,
        },
    )
}

/// Re-inserts a list of previously captured pieces at `offset`, in
/// order. This is `DeleteChange⁻¹` (spec §4.5): undoing a delete must
/// restore exactly what was removed, including any per-piece meta, not
/// just the plain text — so it bypasses `insert`'s line-splitting path.
pub(crate) fn reinsert_captured(
    tree: &mut Tree,
    buffers: &BufferPool,
    offset: u64,
    captured: &[CapturedPiece],
) -> Vec<Diff> {
    let (_, _, lf_before) = tree.find_node_with_lf(offset);

    let mut pos = offset;
    let mut lines_inserted = 0u64;
    for cap in captured {
        let mut piece = Piece::new(cap.buffer_index, cap.start, cap.length, cap.line_feed_count);
        piece.meta = cap.meta.clone();
        piece.structural = cap.structural;
        lines_inserted += piece.line_feed_count;
        tree.insert(buffers, pos, piece, false);
        pos += cap.length;
    }

    let mut diffs = vec![Diff::replace(line_number_for(lf_before))];
    for i in 1..=lines_inserted {
        diffs.push(Diff::insert(line_number_for(lf_before + i)));
    }
    diffs
}

/// Merges `meta` into every piece overlapping `[offset, offset+length)`
/// whose classified type matches `filter` (`None` means every type —
/// spec's `ALL`). Non-matching pieces are skipped without mutation, but
/// the walk still advances past them (spec §4.3.4 note).
pub(crate) fn format(
    tree: &mut Tree,
    buffers: &mut BufferPool,
    offset: u64,
    length: u64,
    meta: &Meta,
    filter: Option<PieceType>,
) -> (Vec<Diff>, FormatChange) {
    trace!("format at {offset}, length {length}");

    let (_, _, lf_before) = tree.find_node_with_lf(offset);

    let mut pos = offset;
    let end = offset + length;
    let mut patches = Vec::new();
    let mut lines_touched = 0u64;

    while pos < end {
        let (stack, node_start) = tree.find_node(pos);
        let Some(node) = stack.last() else {
            break;
        };
        let piece_start = node_start;
        let piece = node.piece.clone();
        let piece_end = piece_start + piece.length;
        let overlap_end = piece_end.min(end);

        let local_offset = pos - piece_start;
        let overlap_lf = buffers.count_line_feeds(piece.buffer_index, piece.start + local_offset, overlap_end - pos);
        lines_touched += overlap_lf;

        let matches = filter.map_or(true, |f| f == piece.piece_type());

        if matches {
            let captured = tree.remove_capturing(buffers, pos..overlap_end);
            for mut cap in captured {
                let old_meta = cap.meta.clone().unwrap_or_default();
                let (merged, forward, inverse) = merge_meta(&old_meta, meta);
                let plen = cap.length;

                if !inverse.is_empty() {
                    patches.push(PiecePatch {
                        start_offset: pos,
                        length: plen,
                        forward_patches: forward,
                        inverse_patches: inverse,
                    });
                    cap.meta = Some(merged);
                }

                tree.insert(buffers, pos, cap, false);
                pos += plen;
            }
        } else {
            pos = overlap_end;
        }
    }

    let mut diffs = Vec::new();
    for i in 0..=lines_touched {
        diffs.push(Diff::replace(line_number_for(lf_before + i)));
    }

    (
        diffs.clone(),
        FormatChange {
            offset,
            length,
            patches,
            diffs,
        },
    )
}

/// Applies a previously recorded `PiecePatch` list's `inverse_patches`
/// back onto the tree, locating each affected piece by its recorded
/// `start_offset` (spec §4.5 `FormatChange⁻¹`).
pub(crate) fn apply_piece_patches(
    tree: &mut Tree,
    buffers: &mut BufferPool,
    patches: &[PiecePatch],
) -> Vec<Diff> {
    let mut lines = Vec::new();

    for patch in patches {
        let (stack, node_start) = tree.find_node(patch.start_offset);
        let Some(node) = stack.last() else {
            continue;
        };
        let piece = node.piece.clone();
        let start = node_start;

        let mut cap = tree
            .remove_capturing(buffers, start..start + piece.length)
            .into_iter()
            .next()
            .unwrap_or(piece);

        let mut meta = cap.meta.clone().unwrap_or_default();
        crate::piece_tree::meta::apply_patches(&mut meta, &patch.inverse_patches);
        cap.meta = Some(meta);

        let (_, _, lf_before) = tree.find_node_with_lf(start);
        lines.push(Diff::replace(line_number_for(lf_before)));

        tree.insert(buffers, start, cap, false);
    }

    lines
}

/// Reapplies a previously recorded `PiecePatch` list's `forward_patches`
/// — `redo()` of a `FormatChange`, the mirror of `apply_piece_patches`.
pub(crate) fn reapply_piece_patches(
    tree: &mut Tree,
    buffers: &mut BufferPool,
    patches: &[PiecePatch],
) -> Vec<Diff> {
    let mut lines = Vec::new();

    for patch in patches {
        let (stack, node_start) = tree.find_node(patch.start_offset);
        let Some(node) = stack.last() else {
            continue;
        };
        let piece = node.piece.clone();
        let start = node_start;

        let mut cap = tree
            .remove_capturing(buffers, start..start + piece.length)
            .into_iter()
            .next()
            .unwrap_or(piece);

        let mut meta = cap.meta.clone().unwrap_or_default();
        crate::piece_tree::meta::apply_patches(&mut meta, &patch.forward_patches);
        cap.meta = Some(meta);

        let (_, _, lf_before) = tree.find_node_with_lf(start);
        lines.push(Diff::replace(line_number_for(lf_before)));

        tree.insert(buffers, start, cap, false);
    }

    lines
}
