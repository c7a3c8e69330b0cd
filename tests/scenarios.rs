//! End-to-end seed scenarios exercising the public API, in the style of
//! the teacher's own `#[test] fn insert_at_start()` etc. (see
//! `src/piece_tree/tree.rs`). Each test below corresponds to one
//! numbered scenario from this crate's specification document.

use quill_piecetree::{Line, LinePiece, PieceTree};

fn line(text: &str, length: u64) -> Line {
    Line {
        meta: None,
        pieces: vec![LinePiece {
            text: text.to_string(),
            length,
            meta: None,
        }],
    }
}

/// S1 — basic insert and line fetch.
#[test]
fn basic_insert_and_line_fetch() {
    let mut pt = PieceTree::new();
    pt.insert(0, "This is a test paragraph.\n这是测试段落，只有文字\n")
        .unwrap();

    assert_eq!(pt.get_line(1), line("This is a test paragraph.", 25));
    assert_eq!(pt.get_line(2), line("这是测试段落，只有文字", 11));
    assert_eq!(pt.get_line(3), Line::empty());

    // line 0 clamps to line 1.
    assert_eq!(pt.get_line(0), pt.get_line(1));
    // out-of-range line returns the empty single-piece shape.
    assert_eq!(pt.get_line(4), Line::empty());

    assert_eq!(pt.get_line_count(), 3);
}

/// S2 — mid-piece insert splits the node it lands in.
#[test]
fn mid_piece_insert_splits_node() {
    let mut pt = PieceTree::new();
    pt.insert(0, "This is a test paragraph.\n这是测试段落，只有文字\n")
        .unwrap();
    pt.insert(2, "abc").unwrap();

    let pieces = pt.get_pieces();
    let shapes: Vec<(&str, u64)> = pieces.iter().map(|p| (p.text.as_str(), p.length)).collect();

    assert_eq!(
        shapes,
        vec![
            ("Th", 2),
            ("abc", 3),
            ("is is a test paragraph.", 23),
            ("\n", 1),
            ("这是测试段落，只有文字", 11),
            ("\n", 1),
        ]
    );
    assert!(pieces.iter().all(|p| p.meta.is_none()));
}

/// S5 — continuous-input coalescing: sequential single-character
/// inserts at the growing tail merge into one node instead of creating
/// a new one each time.
#[test]
fn continuous_input_coalesces_into_one_piece() {
    let mut pt = PieceTree::new();
    pt.insert(0, "a").unwrap();
    pt.insert(1, "b").unwrap();
    pt.insert(2, "c").unwrap();

    assert_eq!(pt.get_text(), "abc");
    assert_eq!(pt.get_pieces().len(), 1);
    assert_eq!(pt.get_pieces()[0].text, "abc");
}

/// S6 — undo/redo restores text through a sequence of grouped
/// mutations.
#[test]
fn undo_redo_round_trip() {
    let mut pt = PieceTree::new();
    pt.insert(0, "hello").unwrap();
    pt.insert(5, " world").unwrap();
    assert_eq!(pt.get_text(), "hello world");

    pt.undo();
    assert_eq!(pt.get_text(), "hello");

    pt.undo();
    assert_eq!(pt.get_text(), "");

    pt.redo();
    assert_eq!(pt.get_text(), "hello");

    pt.redo();
    assert_eq!(pt.get_text(), "hello world");
}

/// Grouped undo: a bracketed sequence of mutations undoes as one unit.
#[test]
fn grouped_changes_undo_as_one_unit() {
    let mut pt = PieceTree::new();
    pt.start_change();
    pt.insert(0, "ab").unwrap();
    pt.insert(2, "cd").unwrap();
    pt.end_change();

    assert_eq!(pt.get_text(), "abcd");
    pt.undo();
    assert_eq!(pt.get_text(), "");
    pt.redo();
    assert_eq!(pt.get_text(), "abcd");
}

/// Any new mutation after an undo discards the redo stack.
#[test]
fn new_mutation_discards_redo_stack() {
    let mut pt = PieceTree::new();
    pt.insert(0, "hello").unwrap();
    pt.undo();
    assert_eq!(pt.get_text(), "");

    pt.insert(0, "bye").unwrap();
    assert_eq!(pt.get_text(), "bye");

    // Nothing left to redo — the "hello" branch was discarded.
    pt.redo();
    assert_eq!(pt.get_text(), "bye");
}

/// Empty insert with no meta is a programmer error (spec §7); empty
/// insert carrying meta represents a non-text piece and succeeds.
#[test]
fn empty_insert_without_meta_is_rejected() {
    let mut pt = PieceTree::new();
    assert!(pt.insert(0, "").is_err());

    let mut meta = quill_piecetree::Meta::new();
    meta.insert("kind".to_string(), serde_json::json!("checkbox"));
    let diffs = pt.insert_meta(0, "", meta);
    assert_eq!(diffs.len(), 1);
    assert_eq!(pt.get_text(), "");
    assert_eq!(pt.len(), 1);
}

/// `delete_line` removes a line's content plus its trailing line feed.
#[test]
fn delete_line_removes_content_and_trailing_newline() {
    let mut pt = PieceTree::new();
    pt.insert(0, "one\ntwo\nthree\n").unwrap();

    pt.delete_line(2);
    assert_eq!(pt.get_text(), "one\nthree\n");
}

/// Out-of-range line helpers return an empty diff list rather than
/// failing (spec §7).
#[test]
fn out_of_range_line_helper_returns_empty_diffs() {
    let mut pt = PieceTree::new();
    pt.insert(0, "only one line").unwrap();

    assert!(pt.delete_line(99).is_empty());
    assert!(pt.format_line(0, quill_piecetree::Meta::new()).is_empty());
}
