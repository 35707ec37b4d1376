//! In-memory page document: an arena tree with mutation observation.
//!
//! The embedder owns one `Document` per page. Mutations performed through the
//! public operations emit [`MutationRecord`]s to subscribers unless the
//! document is muted; the painter wraps its own mutations in
//! [`Document::muted`] so a change watcher never observes them.

use tokio::sync::mpsc;

use crate::types::errors::DomError;

use super::node::{Node, NodeData, NodeId};

/// Tags whose subtrees never contribute rendered text.
const NON_RENDERED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Tags that introduce a line break in rendered text.
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "div", "dl", "dd", "dt", "fieldset", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "ol", "p", "section", "tr", "ul",
];

/// One batch of observed tree changes.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Arena-backed document tree.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
    muted: bool,
}

impl Document {
    /// Creates a document holding a single empty `body` root element.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            observers: Vec::new(),
            muted: false,
        };
        doc.root = doc.push(Node::element("body"));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Creates a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id).as_element().and_then(|e| e.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.node_mut(id).as_element_mut() {
            element.set_attr(name, value);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.node(id)
            .as_element()
            .map(|e| e.has_class(class))
            .unwrap_or(false)
    }

    /// True while `id` can reach the root through parent links.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // === Mutation operations ===

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.node(parent).is_element() {
            return Err(DomError::InvalidStructure(format!(
                "node {} cannot hold children",
                parent.0
            )));
        }
        if self.node(child).parent.is_some() {
            return Err(DomError::InvalidStructure(format!(
                "node {} already has a parent",
                child.0
            )));
        }
        // Inserting an ancestor under its own descendant would form a cycle.
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return Err(DomError::InvalidStructure(format!(
                    "node {} is an ancestor of node {}",
                    child.0, parent.0
                )));
            }
            current = self.node(id).parent;
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        if self.is_attached(parent) {
            self.notify(vec![child], Vec::new());
        }
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == reference)
            .ok_or_else(|| {
                DomError::NotAChild(format!(
                    "reference node {} is not a child of node {}",
                    reference.0, parent.0
                ))
            })?;
        self.node_mut(parent).children.insert(position, child);
        self.node_mut(child).parent = Some(parent);
        if self.is_attached(parent) {
            self.notify(vec![child], Vec::new());
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                DomError::NotAChild(format!(
                    "node {} is not a child of node {}",
                    child.0, parent.0
                ))
            })?;
        self.node_mut(parent).children.remove(position);
        self.node_mut(child).parent = None;
        if self.is_attached(parent) {
            self.notify(Vec::new(), vec![child]);
        }
        Ok(())
    }

    /// Swaps `old` for `new` in place, emitting a single mutation record.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<(), DomError> {
        self.check_insertable(parent, new)?;
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == old)
            .ok_or_else(|| {
                DomError::NotAChild(format!(
                    "node {} is not a child of node {}",
                    old.0, parent.0
                ))
            })?;
        self.node_mut(parent).children[position] = new;
        self.node_mut(new).parent = Some(parent);
        self.node_mut(old).parent = None;
        if self.is_attached(parent) {
            self.notify(vec![new], vec![old]);
        }
        Ok(())
    }

    // === Text aggregation ===

    /// Concatenated text of every text node under `id`, including `id`
    /// itself. Matches DOM `textContent`: script/style text is included.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(_) => {
                for &child in &self.node(id).children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// User-visible rendered text under `id`: skips script/style/noscript
    /// subtrees and `hidden` elements, and breaks lines at block boundaries.
    pub fn visible_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_visible(id, &mut out);
        out
    }

    fn collect_visible(&self, id: NodeId, out: &mut String) {
        match &self.node(id).data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(element) => {
                if NON_RENDERED_TAGS.contains(&element.tag()) || element.attr("hidden").is_some() {
                    return;
                }
                if element.tag() == "br" {
                    out.push('\n');
                    return;
                }
                let block = BLOCK_TAGS.contains(&element.tag());
                for &child in &self.node(id).children {
                    self.collect_visible(child, out);
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }

    // === Traversal ===

    /// All nodes under `id` in preorder, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.node(current).children.iter().rev());
        }
        out
    }

    /// Attached elements under the root carrying the given class.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.has_class(id, class))
            .collect()
    }

    /// True when `id` or any ancestor is an editable control: form fields,
    /// `contenteditable`, `role=textbox`, or common rich/code editor hosts.
    pub fn is_editable_context(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(element) = self.node(node_id).as_element() {
                if matches!(element.tag(), "input" | "textarea" | "select") {
                    return true;
                }
                if matches!(element.attr("contenteditable"), Some("true") | Some("")) {
                    return true;
                }
                if element.attr("role") == Some("textbox") {
                    return true;
                }
                for class in [
                    "CodeMirror",
                    "ace_editor",
                    "monaco-editor",
                    "editor",
                    "input",
                    "text-area",
                ] {
                    if element.has_class(class) {
                        return true;
                    }
                }
            }
            current = self.node(node_id).parent;
        }
        false
    }

    // === Observation ===

    /// Registers a mutation observer. Records are delivered for every
    /// unmuted mutation visible under the root (building a detached subtree
    /// is silent until it is attached) until the receiver is dropped.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Runs `f` with mutation notification suppressed, restoring the
    /// previous state afterwards.
    pub fn muted<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.muted;
        self.muted = true;
        let result = f(self);
        self.muted = previous;
        result
    }

    fn notify(&mut self, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if self.muted || self.observers.is_empty() {
            return;
        }
        let record = MutationRecord { added, removed };
        self.observers
            .retain(|tx| tx.send(record.clone()).is_ok());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
