//! Unit tests for the DomPainter public API.
//!
//! These exercise highlight/clear cycles against constructed documents:
//! wrapper insertion, traversal skip rules, reversibility, idempotence,
//! and the defensive sweep.

use std::sync::{Arc, Mutex};

use wordlight::dom::Document;
use wordlight::services::dom_painter::{DomPainter, HIGHLIGHT_MARK_CLASS};
use wordlight::services::match_engine::MatchOptions;
use wordlight::types::settings::{HighlightWord, StyleSpec};

fn word(text: &str) -> HighlightWord {
    HighlightWord {
        text: text.to_string(),
        style: StyleSpec::default(),
    }
}

/// body > [ text("the cat sat on the mat") ]
fn flat_doc(text: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    let node = doc.create_text(text);
    doc.append_child(root, node).unwrap();
    doc
}

fn marker_count(doc: &Document) -> usize {
    doc.elements_with_class(HIGHLIGHT_MARK_CLASS).len()
}

#[test]
fn test_highlight_wraps_match_in_styled_marker() {
    let mut doc = flat_doc("the cat sat");
    let mut painter = DomPainter::new();

    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());

    assert_eq!(painter.highlighted_count(), 1);
    let wrappers = doc.elements_with_class(HIGHLIGHT_MARK_CLASS);
    assert_eq!(wrappers.len(), 1);
    assert_eq!(doc.text_content(wrappers[0]), "cat");

    let style = doc.attr(wrappers[0], "style").unwrap();
    assert!(style.contains("background: #ffd700;"));

    // Sibling structure: leading text, wrapper, trailing text.
    let children = doc.children(doc.root());
    assert_eq!(children.len(), 3);
    assert_eq!(doc.node(children[0]).as_text(), Some("the "));
    assert_eq!(doc.node(children[2]).as_text(), Some(" sat"));
    assert_eq!(doc.text_content(doc.root()), "the cat sat");
}

#[test]
fn test_no_match_leaves_node_untouched() {
    let mut doc = flat_doc("nothing to see");
    let original_children = doc.children(doc.root()).to_vec();
    let mut painter = DomPainter::new();

    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());

    assert_eq!(painter.highlighted_count(), 0);
    assert_eq!(doc.children(doc.root()), original_children.as_slice());
}

#[test]
fn test_highlight_then_clear_restores_text_content() {
    let mut doc = Document::new();
    let root = doc.root();
    let p = doc.create_element("p");
    doc.append_child(root, p).unwrap();
    let inner = doc.create_text("cats chase cats");
    doc.append_child(p, inner).unwrap();
    let b = doc.create_element("b");
    doc.append_child(p, b).unwrap();
    let bold = doc.create_text("bold cat");
    doc.append_child(b, bold).unwrap();

    let before = doc.text_content(root);
    let mut painter = DomPainter::new();
    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());
    assert_eq!(painter.highlighted_count(), 3);
    assert_eq!(doc.text_content(root), before, "highlighting must not change text");

    painter.clear(&mut doc);
    assert_eq!(doc.text_content(root), before);
    assert_eq!(painter.highlighted_count(), 0);
    assert_eq!(marker_count(&doc), 0);
}

#[test]
fn test_clear_with_zero_matches_is_harmless() {
    let mut doc = flat_doc("plain text");
    let before = doc.text_content(doc.root());
    let mut painter = DomPainter::new();
    painter.highlight(&mut doc, &[word("absent")], &MatchOptions::default());
    painter.clear(&mut doc);
    painter.clear(&mut doc);
    assert_eq!(doc.text_content(doc.root()), before);
}

#[test]
fn test_repeated_highlight_is_idempotent() {
    let mut doc = flat_doc("cat and cat and category");
    let mut painter = DomPainter::new();
    let words = [word("cat"), word("category")];

    painter.highlight(&mut doc, &words, &MatchOptions::default());
    let after_once = (marker_count(&doc), doc.text_content(doc.root()));

    painter.highlight(&mut doc, &words, &MatchOptions::default());
    let after_twice = (marker_count(&doc), doc.text_content(doc.root()));

    assert_eq!(after_once, after_twice, "no nested re-wrapping on a second pass");
}

#[test]
fn test_script_style_noscript_subtrees_are_skipped() {
    let mut doc = Document::new();
    let root = doc.root();
    for tag in ["script", "style", "noscript"] {
        let el = doc.create_element(tag);
        doc.append_child(root, el).unwrap();
        let code = doc.create_text("cat inside");
        doc.append_child(el, code).unwrap();
    }
    let visible = doc.create_text("cat outside");
    doc.append_child(root, visible).unwrap();

    let mut painter = DomPainter::new();
    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());

    assert_eq!(painter.highlighted_count(), 1);
    let wrappers = doc.elements_with_class(HIGHLIGHT_MARK_CLASS);
    assert_eq!(doc.text_content(wrappers[0]), "cat");
}

#[test]
fn test_longest_phrase_wins_in_painted_output() {
    let mut doc = flat_doc("category");
    let mut painter = DomPainter::new();
    painter.highlight(
        &mut doc,
        &[word("cat"), word("category")],
        &MatchOptions::default(),
    );

    let wrappers = doc.elements_with_class(HIGHLIGHT_MARK_CLASS);
    assert_eq!(wrappers.len(), 1);
    assert_eq!(doc.text_content(wrappers[0]), "category");
}

#[test]
fn test_match_options_flow_through() {
    let mut doc = flat_doc("Cat concatenate cat");
    let mut painter = DomPainter::new();
    painter.highlight(
        &mut doc,
        &[word("cat")],
        &MatchOptions {
            case_sensitive: true,
            whole_words_only: true,
        },
    );

    let wrappers = doc.elements_with_class(HIGHLIGHT_MARK_CLASS);
    assert_eq!(wrappers.len(), 1, "only the standalone lowercase occurrence");
    assert_eq!(doc.text_content(wrappers[0]), "cat");
}

#[test]
fn test_defensive_sweep_unwraps_untracked_markers() {
    let mut doc = flat_doc("a cat here");
    let mut painter = DomPainter::new();
    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());

    // Simulate the page cloning a highlighted span: a marker element the
    // painter never recorded.
    let root = doc.root();
    let clone = doc.create_element("span");
    doc.set_attr(clone, "class", HIGHLIGHT_MARK_CLASS);
    doc.append_child(root, clone).unwrap();
    let cloned_text = doc.create_text("cat");
    doc.append_child(clone, cloned_text).unwrap();

    painter.clear(&mut doc);
    assert_eq!(marker_count(&doc), 0);
    assert_eq!(doc.text_content(root), "a cat herecat");
}

#[test]
fn test_clear_skips_wrappers_the_page_removed() {
    let mut doc = flat_doc("one cat");
    let mut painter = DomPainter::new();
    painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());

    let wrapper = doc.elements_with_class(HIGHLIGHT_MARK_CLASS)[0];
    let parent = doc.parent(wrapper).unwrap();
    doc.remove_child(parent, wrapper).unwrap();

    // Must not panic or resurrect the removed wrapper.
    painter.clear(&mut doc);
    assert_eq!(painter.highlighted_count(), 0);
    assert_eq!(doc.text_content(doc.root()), "one ");
}

#[tokio::test]
async fn test_painter_mutations_are_not_observed() {
    let doc = Arc::new(Mutex::new(flat_doc("a cat here")));
    let mut rx = doc.lock().unwrap().subscribe();

    let mut painter = DomPainter::new();
    {
        let mut doc = doc.lock().unwrap();
        painter.highlight(&mut doc, &[word("cat")], &MatchOptions::default());
        painter.clear(&mut doc);
    }

    assert!(
        rx.try_recv().is_err(),
        "painter insertions and removals must be invisible to observers"
    );
}
