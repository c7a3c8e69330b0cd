use crate::piece_tree::diff::Diff;
use crate::piece_tree::meta::{Meta, Patch};

/// A captured piece, recorded verbatim so a delete can be undone by
/// re-inserting exactly what was removed (spec §4.5 `DeleteChange`).
#[derive(Clone, Debug)]
pub(crate) struct CapturedPiece {
    pub buffer_index: i64,
    pub start: u64,
    pub length: u64,
    pub line_feed_count: u64,
    pub meta: Option<Meta>,
    pub structural: bool,
}

/// `(startOffset, length, inversePatches)` recorded per formatted piece
/// (spec glossary: PiecePatch). `forward_patches` is kept alongside so
/// `redo()` can reapply the original merge without re-running
/// `merge_meta` against whatever the tree's meta happens to hold now.
#[derive(Clone, Debug)]
pub(crate) struct PiecePatch {
    pub start_offset: u64,
    pub length: u64,
    pub forward_patches: Vec<Patch>,
    pub inverse_patches: Vec<Patch>,
}

#[derive(Clone, Debug)]
pub(crate) struct InsertChange {
    pub offset: u64,
    pub buffer_start: u64,
    pub length: u64,
    pub meta: Option<Meta>,
    /// True for the meta-only non-text piece path, so `redo()` knows to
    /// replay it as an empty-text insert rather than decoding
    /// `buffer_start..buffer_start+length` from buffer 0 (which holds
    /// nothing for a non-text piece).
    pub non_text: bool,
    pub diffs: Vec<Diff>,
}

#[derive(Clone, Debug)]
pub(crate) struct DeleteChange {
    pub offset: u64,
    pub captured: Vec<CapturedPiece>,
    pub diffs: Vec<Diff>,
}

#[derive(Clone, Debug)]
pub(crate) struct FormatChange {
    pub offset: u64,
    pub length: u64,
    pub patches: Vec<PiecePatch>,
    pub diffs: Vec<Diff>,
}

/// One of the three recorded mutation kinds (spec §4.5).
#[derive(Clone, Debug)]
pub(crate) enum Change {
    Insert(InsertChange),
    Delete(DeleteChange),
    Format(FormatChange),
}

impl Change {
    pub fn diffs(&self) -> &[Diff] {
        match self {
            Change::Insert(c) => &c.diffs,
            Change::Delete(c) => &c.diffs,
            Change::Format(c) => &c.diffs,
        }
    }
}

/// Grouped, reversible history of changes. Ungrouped pushes become
/// singleton groups; pushes made between `start_group`/`end_group`
/// join the currently open group (spec §4.5).
#[derive(Debug, Default)]
pub(crate) struct ChangeStack {
    undo: Vec<Vec<Change>>,
    redo: Vec<Vec<Change>>,
    open_group: Option<Vec<Change>>,
}

impl ChangeStack {
    pub fn new() -> ChangeStack {
        ChangeStack::default()
    }

    pub fn start_group(&mut self) {
        if self.open_group.is_none() {
            self.open_group = Some(Vec::new());
        }
    }

    /// Closes the open group, pushing it onto the undo stack even if
    /// empty (a no-op `change(fn)` still closes the group — spec §7).
    pub fn end_group(&mut self) {
        if let Some(group) = self.open_group.take() {
            self.undo.push(group);
        }
    }

    pub fn in_group(&self) -> bool {
        self.open_group.is_some()
    }

    /// Records `change`, discarding the redo stack (any new mutation
    /// invalidates previously-undone history — spec §4.5).
    pub fn push(&mut self, change: Change) {
        self.redo.clear();
        match &mut self.open_group {
            Some(group) => group.push(change),
            None => self.undo.push(vec![change]),
        }
    }

    /// Pops the most recent undo group, moving it to the redo stack. The
    /// caller applies each change's inverse in reverse order.
    pub fn pop_undo(&mut self) -> Option<Vec<Change>> {
        let group = self.undo.pop()?;
        self.redo.push(group.clone());
        Some(group)
    }

    /// Pops the most recently undone group, moving it back onto the undo
    /// stack. The caller re-applies each change in original order.
    pub fn pop_redo(&mut self) -> Option<Vec<Change>> {
        let group = self.redo.pop()?;
        self.undo.push(group.clone());
        Some(group)
    }
}
