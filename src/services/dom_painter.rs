//! DOM painter: walks text nodes under the document root, wraps matches in
//! styled marker spans, and can fully reverse the process.
//!
//! Invariant: never re-enter a wrapper. Traversal skips any subtree rooted
//! at an element carrying the marker class, which makes repeated highlight
//! passes idempotent.

use tracing::debug;

use crate::dom::{Document, NodeData, NodeId};
use crate::services::match_engine::{find_matches, MatchOptions};
use crate::types::errors::DomError;
use crate::types::settings::{HighlightWord, StyleSpec};

/// Marker class carried by every inserted wrapper. Private contract between
/// traversal, reversal, and the change watcher; stable within one build.
pub const HIGHLIGHT_MARK_CLASS: &str = "wordlight-mark";

/// Tags whose subtrees are never scanned for matches.
const SKIP_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Strips characters that would let a style value escape its declaration.
pub fn sanitize_css_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Clamps a pixel quantity to the allowed [0, 100] range.
pub fn clamp_px(value: u32) -> u32 {
    value.min(100)
}

/// Renders the inline style string for one wrapper. The border declaration
/// is omitted entirely when the clamped width is zero.
fn render_style(style: &StyleSpec) -> String {
    let mut css = format!(
        "background: {}; color: {}; font-weight: {}; font-style: {}; \
         text-decoration: {}; text-transform: {}; padding: {}px {}px {}px {}px; \
         border-radius: {}px;",
        sanitize_css_value(&style.background_color),
        sanitize_css_value(&style.color),
        sanitize_css_value(&style.font_weight),
        sanitize_css_value(&style.font_style),
        sanitize_css_value(&style.text_decoration),
        sanitize_css_value(&style.text_transform),
        clamp_px(style.padding_top),
        clamp_px(style.padding_right),
        clamp_px(style.padding_bottom),
        clamp_px(style.padding_left),
        clamp_px(style.border_radius),
    );
    let border_width = clamp_px(style.border_width);
    if border_width > 0 {
        css.push_str(&format!(
            " border: {}px {} {};",
            border_width,
            sanitize_css_value(&style.border_style),
            sanitize_css_value(&style.border_color),
        ));
    }
    css
}

/// Applies and reverses highlights, and owns the record of every wrapper it
/// has inserted. That record is the only path by which highlights are
/// reversed; a defensive sweep covers wrappers the page cloned or moved.
pub struct DomPainter {
    highlighted: Vec<NodeId>,
}

impl DomPainter {
    pub fn new() -> Self {
        Self {
            highlighted: Vec::new(),
        }
    }

    /// Number of wrappers currently on record.
    pub fn highlighted_count(&self) -> usize {
        self.highlighted.len()
    }

    /// Runs a highlight pass over every eligible text node under the root.
    /// All mutations happen inside the document's mute scope so observers
    /// never see the painter's own insertions.
    pub fn highlight(
        &mut self,
        doc: &mut Document,
        words: &[HighlightWord],
        options: &MatchOptions,
    ) {
        if words.is_empty() {
            return;
        }
        let text_nodes = collect_text_nodes(doc, doc.root());
        doc.muted(|doc| {
            for node in text_nodes {
                if let Err(err) = self.paint_text_node(doc, node, words, options) {
                    debug!(%err, "skipping text node after failed replacement");
                }
            }
        });
    }

    /// Replaces one text node with literal segments and styled wrappers.
    /// Returns `Ok(true)` when the node was replaced. On a structural
    /// failure the partially-inserted nodes are removed and the original
    /// node is left in place.
    fn paint_text_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        words: &[HighlightWord],
        options: &MatchOptions,
    ) -> Result<bool, DomError> {
        let Some(text) = doc.node(node).as_text().map(str::to_string) else {
            return Ok(false);
        };
        if text.trim().is_empty() {
            return Ok(false);
        }

        let matches = find_matches(&text, words, options);
        if matches.is_empty() {
            return Ok(false);
        }

        let parent = doc
            .parent(node)
            .ok_or_else(|| DomError::Detached(format!("text node {}", node.index())))?;

        let mut inserted: Vec<NodeId> = Vec::new();
        let mut wrappers: Vec<NodeId> = Vec::new();

        let outcome = (|| -> Result<(), DomError> {
            let mut cursor = 0;
            for candidate in &matches {
                if candidate.start > cursor {
                    let leading = doc.create_text(&text[cursor..candidate.start]);
                    doc.insert_before(parent, leading, node)?;
                    inserted.push(leading);
                }
                let wrapper = doc.create_element("span");
                doc.set_attr(wrapper, "class", HIGHLIGHT_MARK_CLASS);
                doc.set_attr(wrapper, "style", &render_style(&candidate.style));
                let content = doc.create_text(&candidate.matched_text);
                doc.append_child(wrapper, content)?;
                doc.insert_before(parent, wrapper, node)?;
                inserted.push(wrapper);
                wrappers.push(wrapper);
                cursor = candidate.end;
            }
            if cursor < text.len() {
                let trailing = doc.create_text(&text[cursor..]);
                doc.insert_before(parent, trailing, node)?;
                inserted.push(trailing);
            }
            doc.remove_child(parent, node)
        })();

        match outcome {
            Ok(()) => {
                self.highlighted.extend(wrappers);
                Ok(true)
            }
            Err(err) => {
                for id in inserted {
                    let _ = doc.remove_child(parent, id);
                }
                Err(err)
            }
        }
    }

    /// Reverses every highlight: each recorded wrapper is replaced by a
    /// plain text node carrying its current text content, then a sweep
    /// unwraps any marker-class element the record does not cover.
    pub fn clear(&mut self, doc: &mut Document) {
        doc.muted(|doc| {
            for wrapper in self.highlighted.drain(..) {
                unwrap_element(doc, wrapper);
            }
            for stray in doc.elements_with_class(HIGHLIGHT_MARK_CLASS) {
                unwrap_element(doc, stray);
            }
        });
    }
}

impl Default for DomPainter {
    fn default() -> Self {
        Self::new()
    }
}

fn unwrap_element(doc: &mut Document, element: NodeId) {
    let Some(parent) = doc.parent(element) else {
        return;
    };
    let content = doc.text_content(element);
    let text = doc.create_text(&content);
    let _ = doc.replace_child(parent, text, element);
}

/// Eligible text nodes under `root` in document order. Subtrees rooted at
/// script/style/noscript or at a marker-class element are not entered.
fn collect_text_nodes(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(root).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        match &doc.node(id).data {
            NodeData::Text(_) => out.push(id),
            NodeData::Element(element) => {
                if SKIP_TAGS.contains(&element.tag())
                    || element.has_class(HIGHLIGHT_MARK_CLASS)
                {
                    continue;
                }
                stack.extend(doc.children(id).iter().rev());
            }
        }
    }
    out
}
