//! Node types for the in-memory page document.

/// Index of a node in the document arena. Ids stay valid for the lifetime of
/// the document, including for nodes that have been detached from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Node-specific data.
#[derive(Debug)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

/// Element-specific data: tag name plus attributes.
#[derive(Debug)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        for (n, v) in self.attributes.iter_mut() {
            if n == name {
                *v = value.to_string();
                return;
            }
        }
        self.attributes.push((name.to_string(), value.to_string()));
    }

    /// Whitespace-separated class list membership.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// A node in the document arena.
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn element(tag: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData::new(tag)),
        }
    }

    pub(crate) fn text(content: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Text(content.to_string()),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(ElementData::tag)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
