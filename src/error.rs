use thiserror::Error;

/// The engine's one genuinely fallible input: spec §7 requires
/// `insert_text("")` to fail explicitly, since an empty insertion with
/// no metadata carries nothing to insert. Every other out-of-range
/// input is clamped rather than rejected (spec §7), matching how the
/// rest of the public API never returns `Result`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceTreeError {
    #[error("insert: text is empty and no meta was given")]
    EmptyInsert,
}
