/// Kind of line-level change a mutation produced (spec §6 "Diff wire
/// shape").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    Insert,
    Remove,
    Replace,
}

/// A single line-level delta external consumers (presentation layers,
/// diff viewers) can apply without re-reading the whole document.
///
/// `line_number` is 1-based. For `Insert`/`Replace` it refers to the
/// state *after* the operation; for `Remove` the state *before* it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diff {
    pub kind: DiffKind,
    pub line_number: u64,
}

impl Diff {
    pub fn insert(line_number: u64) -> Diff {
        Diff {
            kind: DiffKind::Insert,
            line_number,
        }
    }

    pub fn remove(line_number: u64) -> Diff {
        Diff {
            kind: DiffKind::Remove,
            line_number,
        }
    }

    pub fn replace(line_number: u64) -> Diff {
        Diff {
            kind: DiffKind::Replace,
            line_number,
        }
    }

    /// Flips `Insert` ↔ `Remove`, leaving `Replace` as-is. Used by
    /// `undo()` to report the diff list in the direction the inverse
    /// mutation actually took (spec §4.5).
    pub fn flipped(self) -> Diff {
        let kind = match self.kind {
            DiffKind::Insert => DiffKind::Remove,
            DiffKind::Remove => DiffKind::Insert,
            DiffKind::Replace => DiffKind::Replace,
        };
        Diff {
            kind,
            line_number: self.line_number,
        }
    }
}
