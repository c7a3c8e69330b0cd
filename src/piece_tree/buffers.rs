/// Growing set of immutable-by-convention code-unit buffers (spec §2,
/// §4.1). Buffer 0 is the append buffer: new text is always pushed to
/// its tail. Buffers 1..N are original buffers, frozen at construction
/// time by `PieceTreeBuilder`.
///
/// Content is stored as UTF-16 code units rather than bytes or chars:
/// spec §1/§9 is explicit that the engine counts "UTF-16-style code
/// units, matching the source", not Unicode scalar values or grapheme
/// clusters.
#[derive(Debug, Clone, Default)]
pub(crate) struct BufferPool {
    add: Vec<u16>,
    originals: Vec<Vec<u16>>,
}

impl BufferPool {
    pub fn new() -> BufferPool {
        BufferPool {
            add: Vec::new(),
            originals: Vec::new(),
        }
    }

    #[inline]
    pub fn add_len(&self) -> u64 {
        self.add.len() as u64
    }

    /// Appends `text` to the add buffer and returns `(start, length)` of
    /// the newly written slice, in code units.
    pub fn append(&mut self, text: &str) -> (u64, u64) {
        let start = self.add.len() as u64;
        let units: Vec<u16> = text.encode_utf16().collect();
        let length = units.len() as u64;
        self.add.extend(units);
        (start, length)
    }

    /// Freezes `text` as a new original buffer and returns its buffer
    /// index (always ≥ 1).
    pub fn push_original(&mut self, text: &str) -> i64 {
        self.originals.push(text.encode_utf16().collect());
        self.originals.len() as i64
    }

    fn buffer(&self, buffer_index: i64) -> &[u16] {
        if buffer_index == 0 {
            &self.add
        } else {
            &self.originals[(buffer_index - 1) as usize]
        }
    }

    /// `buffers[piece.buffer_index][start..start+length)` as a `String`.
    /// Reading a non-text piece (`buffer_index < 0`) returns the empty
    /// string per spec §4.1.
    pub fn text(&self, buffer_index: i64, start: u64, length: u64) -> String {
        if buffer_index < 0 || length == 0 {
            return String::new();
        }

        let buf = self.buffer(buffer_index);
        let s = start as usize;
        let e = s + length as usize;
        String::from_utf16_lossy(&buf[s..e])
    }

    /// Number of `\n` (U+000A) code units within
    /// `[start, start + length)` of `buffer_index`. Non-text pieces
    /// never contain line feeds.
    pub fn count_line_feeds(&self, buffer_index: i64, start: u64, length: u64) -> u64 {
        if buffer_index < 0 || length == 0 {
            return 0;
        }

        let buf = self.buffer(buffer_index);
        let s = start as usize;
        let e = s + length as usize;
        buf[s..e].iter().filter(|&&u| u == 0x000A).count() as u64
    }
}
