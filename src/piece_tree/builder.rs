use super::buffers::BufferPool;
use super::change::ChangeStack;
use super::tree::piece::Piece;
use super::tree::Tree;
use super::PieceTree;

/// Builds a `PieceTree` from initial content (spec §3 Lifecycle): a
/// leading sentinel piece, followed by one piece per text run and one
/// piece per embedded `\n`, all backed by a frozen original buffer so
/// buffer 0 (the add buffer) stays reserved for runtime edits.
#[derive(Debug)]
pub struct PieceTreeBuilder {
    text: String,
}

impl PieceTreeBuilder {
    pub fn new() -> PieceTreeBuilder {
        PieceTreeBuilder { text: String::new() }
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn build(self) -> PieceTree {
        Self::build_from(&self.text)
    }

    /// Generalizes `build()` to the spec's "initial lines" construction
    /// path: each element becomes one logical line, joined by `\n`.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> PieceTree {
        let joined = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        Self::build_from(&joined)
    }

    fn build_from(text: &str) -> PieceTree {
        let mut buffers = BufferPool::new();
        let mut tree = Tree::new();

        // A dedicated original buffer, not the add buffer: the sentinel
        // must never be eligible for continuous-append coalescing (that
        // check keys off `buffer_index == 0`), and its placeholder code
        // unit must not itself be a line feed, or a later split over a
        // piece that absorbed it would scan a line-feed count the
        // piece's own `line_feed_count` field doesn't know about.
        let sentinel_buffer = buffers.push_original("\u{0}");
        let sentinel = Piece::new(sentinel_buffer, 0, 1, 0);
        tree.insert(&buffers, 0, sentinel, false);

        let mut len = 0u64;
        let mut line_feed_count = 0u64;

        if !text.is_empty() {
            let buffer_index = buffers.push_original(text);
            let units: Vec<u16> = text.encode_utf16().collect();

            let mut pos = 1u64;
            let mut run_start = 0u64;

            for (i, &unit) in units.iter().enumerate() {
                if unit != 0x000A {
                    continue;
                }

                let i = i as u64;
                if i > run_start {
                    let run_len = i - run_start;
                    let piece = Piece::new(buffer_index, run_start, run_len, 0);
                    tree.insert(&buffers, pos, piece, false);
                    pos += run_len;
                    len += run_len;
                }

                let lf_piece = Piece::new(buffer_index, i, 1, 1);
                tree.insert(&buffers, pos, lf_piece, false);
                pos += 1;
                len += 1;
                line_feed_count += 1;

                run_start = i + 1;
            }

            let total = units.len() as u64;
            if total > run_start {
                let run_len = total - run_start;
                let piece = Piece::new(buffer_index, run_start, run_len, 0);
                tree.insert(&buffers, pos, piece, false);
                len += run_len;
            }
        }

        PieceTree {
            tree,
            buffers,
            len,
            line_feed_count,
            changes: ChangeStack::new(),
        }
    }
}

impl Default for PieceTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
