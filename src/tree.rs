//! Skip-aware traversal of one document.
//!
//! A [`Tree`] pairs a [`Document`] with a cursor: the stack of children
//! selected from the root down to the current leaf. A leaf is a playable unit,
//! either a content node or a parallel container (whose whole subtree plays
//! together).
//!
//! Traversal is a depth-first walk with boundary propagation. Advancing first
//! asks the current child to advance inside its own subtree; when that fails
//! the next eligible sibling is entered from its first (or last) leaf, and when
//! no sibling remains the boundary bubbles up to the parent level. A container
//! is passed over when [`Tree::must_skip`] holds for it.

use crate::error::NavError;
use crate::model::{Document, MediaGroup, Node, NodeId};
use crate::skip::SkipOptions;

/// Where the cursor stands relative to the document boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// No traversal call has succeeded yet.
    Unstarted,
    /// The last move failed at the start of the document.
    AtBeginning,
    /// The last move failed at the end of the document.
    AtEnd,
    /// The cursor is on a leaf.
    Within,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    /// Index of `node` in its parent's children.
    index: usize,
    node: NodeId,
}

/// A document plus its traversal cursor.
#[derive(Debug, Clone)]
pub struct Tree {
    document_id: String,
    doc: Document,
    path: Vec<Frame>,
    position: Position,
    /// Container treated as skipped for the duration of one escape.
    force_skip: Option<NodeId>,
    current_id: String,
}

impl Tree {
    pub fn new(document_id: impl Into<String>, doc: Document) -> Self {
        Self {
            document_id: document_id.into(),
            doc,
            path: Vec::new(),
            position: Position::Unstarted,
            force_skip: None,
            current_id: String::new(),
        }
    }

    /// Identifier of the document this tree was built from.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Id of the current leaf; empty before the first successful move.
    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    /// The current leaf node, if any.
    pub fn current_node(&self) -> Option<NodeId> {
        self.path.last().map(|f| f.node)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    // ------------------------------------------------------------------
    // Public navigation
    // ------------------------------------------------------------------

    pub fn go_first(&mut self, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        let saved = std::mem::take(&mut self.path);
        if self.set_first(NodeId::ROOT, skips) {
            Ok(self.arrive())
        } else {
            self.path = saved;
            self.position = Position::AtEnd;
            Err(NavError::AtEnd)
        }
    }

    pub fn go_last(&mut self, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        let saved = std::mem::take(&mut self.path);
        if self.set_last(NodeId::ROOT, skips) {
            Ok(self.arrive())
        } else {
            self.path = saved;
            self.position = Position::AtBeginning;
            Err(NavError::AtBeginning)
        }
    }

    /// Advance to the next leaf. Before any traversal, or after hitting the
    /// beginning, this selects the first leaf.
    pub fn go_next(&mut self, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        if matches!(self.position, Position::Unstarted | Position::AtBeginning) {
            return self.go_first(skips);
        }

        let saved = self.path.clone();
        if self.set_next(0, NodeId::ROOT, skips) {
            Ok(self.arrive())
        } else {
            self.path = saved;
            self.position = Position::AtEnd;
            Err(NavError::AtEnd)
        }
    }

    /// Step back to the previous leaf. Before any traversal, or after hitting
    /// the end, this selects the last leaf.
    pub fn go_previous(&mut self, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        if matches!(self.position, Position::Unstarted | Position::AtEnd) {
            return self.go_last(skips);
        }

        let saved = self.path.clone();
        if self.set_previous(0, NodeId::ROOT, skips) {
            Ok(self.arrive())
        } else {
            self.path = saved;
            self.position = Position::AtBeginning;
            Err(NavError::AtBeginning)
        }
    }

    /// Jump straight to the element `id`, ignoring skip options.
    ///
    /// The root id (or an empty id) selects the first leaf. A content node
    /// inside a parallel container selects that container; a sequential
    /// container selects its first leaf.
    pub fn go_to_id(&mut self, id: &str, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        if id.is_empty() || id == self.doc.root().id {
            return self.go_first(skips);
        }

        let target = self.doc.find_by_id(id).ok_or(NavError::NotFound)?;

        // Root-first chain down to the target, stopping at the outermost leaf.
        let mut chain: Vec<NodeId> = self.doc.ancestors(target).collect();
        chain.reverse();
        chain.push(target);
        let end = chain
            .iter()
            .position(|&n| self.doc.node(n).is_some_and(Node::is_leaf))
            .unwrap_or(chain.len() - 1);

        let saved = std::mem::take(&mut self.path);
        for pair in chain[..=end].windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            let Some(index) = self.doc.children(parent).iter().position(|&c| c == child) else {
                self.path = saved;
                return Err(NavError::NotFound);
            };
            self.path.push(Frame { index, node: child });
        }

        let selected = chain[end];
        let reached = self.doc.node(selected).is_some_and(Node::is_leaf)
            || self.set_first(selected, &SkipOptions::new());
        if reached {
            Ok(self.arrive())
        } else {
            self.path = saved;
            Err(NavError::NotFound)
        }
    }

    /// Leave the nearest escapable ancestor of the current leaf and continue
    /// with whatever follows it. That ancestor need not be the leaf's
    /// innermost container: a plain `seq` inside a note is passed over on the
    /// way up. Outside any escapable structure this is [`Tree::go_next`].
    pub fn escape_structure(&mut self, skips: &SkipOptions) -> Result<MediaGroup, NavError> {
        let Some(target) = self.escape_target() else {
            return self.go_next(skips);
        };

        self.force_skip = Some(target);
        let result = self.go_next(skips);
        self.force_skip = None;
        result
    }

    /// Whether traversal passes over `node`.
    ///
    /// True for a container whose skip option is set to skip, and for the
    /// container being escaped. Content nodes are never skipped directly.
    pub fn must_skip(&self, node: NodeId, skips: &SkipOptions) -> bool {
        if self.force_skip == Some(node) {
            return true;
        }
        self.doc
            .container(node)
            .and_then(|c| c.skip_option.as_deref())
            .is_some_and(|option| skips.is_skipped(option))
    }

    /// Nearest escapable ancestor of the current leaf, below the root. Also
    /// decides the delivered group's `could_escape`.
    pub fn escape_target(&self) -> Option<NodeId> {
        let leaf = self.current_node()?;
        self.doc
            .ancestors(leaf)
            .take_while(|&n| n != NodeId::ROOT)
            .find(|&n| self.doc.container(n).is_some_and(|c| c.escapable))
    }

    // ------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------

    /// Select the first eligible leaf under `container`, which must be the
    /// node at the end of the current path (or the root with an empty path).
    fn set_first(&mut self, container: NodeId, skips: &SkipOptions) -> bool {
        let depth = self.path.len();
        let mut index = 0;
        while let Some(&child) = self.doc.children(container).get(index) {
            if !self.must_skip(child, skips) {
                self.path.push(Frame { index, node: child });
                if self.enter_first(child, skips) {
                    return true;
                }
                self.path.truncate(depth);
            }
            index += 1;
        }
        false
    }

    fn set_last(&mut self, container: NodeId, skips: &SkipOptions) -> bool {
        let depth = self.path.len();
        let mut index = self.doc.children(container).len();
        while index > 0 {
            index -= 1;
            let child = self.doc.children(container)[index];
            if !self.must_skip(child, skips) {
                self.path.push(Frame { index, node: child });
                if self.enter_last(child, skips) {
                    return true;
                }
                self.path.truncate(depth);
            }
        }
        false
    }

    /// Advance under `container`, whose selected child sits at `path[depth]`.
    fn set_next(&mut self, depth: usize, container: NodeId, skips: &SkipOptions) -> bool {
        let Some(current) = self.path.get(depth).copied() else {
            return self.set_first(container, skips);
        };

        if self.can_descend(current.node, skips) && self.set_next(depth + 1, current.node, skips) {
            return true;
        }

        self.path.truncate(depth);
        let mut index = current.index + 1;
        while let Some(&child) = self.doc.children(container).get(index) {
            if !self.must_skip(child, skips) {
                self.path.push(Frame { index, node: child });
                if self.enter_first(child, skips) {
                    return true;
                }
                self.path.truncate(depth);
            }
            index += 1;
        }
        false
    }

    fn set_previous(&mut self, depth: usize, container: NodeId, skips: &SkipOptions) -> bool {
        let Some(current) = self.path.get(depth).copied() else {
            return self.set_last(container, skips);
        };

        if self.can_descend(current.node, skips)
            && self.set_previous(depth + 1, current.node, skips)
        {
            return true;
        }

        self.path.truncate(depth);
        let mut index = current.index;
        while index > 0 {
            index -= 1;
            let child = self.doc.children(container)[index];
            if !self.must_skip(child, skips) {
                self.path.push(Frame { index, node: child });
                if self.enter_last(child, skips) {
                    return true;
                }
                self.path.truncate(depth);
            }
        }
        false
    }

    /// A selected child can be advanced inside when it is a sequential
    /// container that is not itself being skipped.
    fn can_descend(&self, node: NodeId, skips: &SkipOptions) -> bool {
        self.doc.node(node).is_some_and(|n| !n.is_leaf()) && !self.must_skip(node, skips)
    }

    fn enter_first(&mut self, node: NodeId, skips: &SkipOptions) -> bool {
        self.doc.node(node).is_some_and(Node::is_leaf) || self.set_first(node, skips)
    }

    fn enter_last(&mut self, node: NodeId, skips: &SkipOptions) -> bool {
        self.doc.node(node).is_some_and(Node::is_leaf) || self.set_last(node, skips)
    }

    /// Record a successful move and build the group for the new leaf.
    fn arrive(&mut self) -> MediaGroup {
        self.position = Position::Within;
        let Some(leaf) = self.current_node() else {
            self.current_id.clear();
            return MediaGroup::default();
        };

        let mut group = MediaGroup::collect(&self.doc, leaf);
        group.could_escape = self.escape_target().is_some();

        // An anonymous leaf is addressed through its first identified media.
        self.current_id = if !group.id.is_empty() {
            group.id.clone()
        } else {
            group
                .media_ids()
                .into_iter()
                .find(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_default()
        };
        group
    }
}
