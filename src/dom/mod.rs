pub mod document;
pub mod node;

pub use document::{Document, MutationRecord};
pub use node::{ElementData, Node, NodeData, NodeId};
