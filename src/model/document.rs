//! Arena-allocated time-container document.
//!
//! All nodes of one SMIL document live in a contiguous vector and refer to
//! each other by [`NodeId`]. The root is always a sequential container at
//! [`NodeId::ROOT`]. Navigation state is kept outside the arena (see
//! [`Tree`](crate::Tree)), so a `Document` is read-only once built.

use super::node::{Container, MediaRef, Node, NodeId, NodeKind};
use crate::skip::SkipOption;

/// One time-synchronised document: a node arena plus its head metadata.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    metadata: Vec<(String, String)>,
    skip_options: Vec<SkipOption>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a sequential root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::seq()],
            metadata: Vec::new(),
            skip_options: Vec::new(),
        }
    }

    /// Allocate a detached node and return its id.
    pub fn alloc_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Append `child` as the last child of the container `parent`.
    ///
    /// Does nothing when `parent` is not a container.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(NodeKind::Container(c)) = self.nodes.get_mut(parent.index()).map(|n| &mut n.kind)
        else {
            return;
        };
        c.children.push(child);
        if let Some(node) = self.nodes.get_mut(child.index()) {
            node.parent = Some(parent);
        }
    }

    /// Allocate `node` and append it under `parent` in one step.
    pub fn push(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.alloc_node(node);
        self.append_child(parent, id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn set_root_id(&mut self, id: impl Into<String>) {
        self.nodes[0].id = id.into();
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(NodeId::ROOT).is_empty()
    }

    pub fn container(&self, id: NodeId) -> Option<&Container> {
        self.node(id).and_then(Node::as_container)
    }

    pub fn media(&self, id: NodeId) -> Option<&MediaRef> {
        self.node(id).and_then(Node::as_media)
    }

    /// Children of `id`; empty for content nodes and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.container(id).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    /// Iterate the subtree under `start` in document order (pre-order).
    pub fn descendants(&self, start: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![start],
        }
    }

    /// First node in document order whose id equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(NodeId::ROOT)
            .find(|&n| self.node(n).is_some_and(|node| node.id == id))
    }

    /// Ancestors of `id`, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).and_then(|n| n.parent), move |&p| {
            self.node(p).and_then(|n| n.parent)
        })
    }

    // ------------------------------------------------------------------
    // Head data
    // ------------------------------------------------------------------

    pub fn set_meta(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.metadata.push((name.into(), content.into()));
    }

    /// Metadata value for an exact (case-insensitive) key.
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Metadata value for the first key ending in `suffix`, ignoring case
    /// and any `prefix:` namespace, e.g. `ncc:totalElapsedTime`.
    pub fn meta_by_suffix(&self, suffix: &str) -> Option<&str> {
        let suffix = suffix.to_ascii_lowercase();
        self.metadata
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase().ends_with(&suffix))
            .map(|(_, v)| v.as_str())
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Declare a skip option this document uses.
    pub fn declare_skip_option(&mut self, option: SkipOption) {
        if !self.skip_options.iter().any(|o| o.id == option.id) {
            self.skip_options.push(option);
        }
    }

    pub fn skip_options(&self) -> &[SkipOption] {
        &self.skip_options
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
