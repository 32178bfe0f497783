//! Node types for the time-container arena.

use std::cell::OnceCell;

use crate::util::parse_clock_ms;

/// Unique identifier for a node within a [`Document`](super::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node ID (always 0).
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Playback semantics of a time container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerKind {
    /// Children play one after another (`<seq>`).
    #[default]
    Sequential,
    /// Children play together (`<par>`); delivered as one phrase.
    Parallel,
}

/// A structural node grouping children for playback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub kind: ContainerKind,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Skip-option id deciding whether this container is rendered.
    pub skip_option: Option<String>,
    /// Whether the user may escape out of this container in one step.
    pub escapable: bool,
}

/// Media referenced by a content node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "type", rename_all = "snake_case"))]
pub enum MediaRef {
    Audio(AudioRef),
    Text(TextRef),
    Image(ImageRef),
}

impl MediaRef {
    pub fn id(&self) -> &str {
        match self {
            MediaRef::Audio(a) => &a.id,
            MediaRef::Text(t) => &t.id,
            MediaRef::Image(i) => &i.id,
        }
    }

    pub fn src(&self) -> &str {
        match self {
            MediaRef::Audio(a) => &a.src,
            MediaRef::Text(t) => &t.src,
            MediaRef::Image(i) => &i.src,
        }
    }
}

/// A text fragment reference (`book.html#id`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct TextRef {
    pub id: String,
    pub src: String,
}

/// An image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ImageRef {
    pub id: String,
    pub src: String,
}

/// An audio clip reference.
///
/// Clip boundaries are kept as written in the source document and parsed to
/// milliseconds on first access.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct AudioRef {
    pub id: String,
    pub src: String,
    pub clip_begin: String,
    pub clip_end: String,
    #[cfg_attr(feature = "cli", serde(skip))]
    begin_ms: OnceCell<Option<u64>>,
    #[cfg_attr(feature = "cli", serde(skip))]
    end_ms: OnceCell<Option<u64>>,
}

impl AudioRef {
    pub fn new(
        id: impl Into<String>,
        src: impl Into<String>,
        clip_begin: impl Into<String>,
        clip_end: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            clip_begin: clip_begin.into(),
            clip_end: clip_end.into(),
            begin_ms: OnceCell::new(),
            end_ms: OnceCell::new(),
        }
    }

    /// Clip start in milliseconds. A missing `clip-begin` means the start of the file.
    pub fn begin_ms(&self) -> Option<u64> {
        *self.begin_ms.get_or_init(|| {
            if self.clip_begin.trim().is_empty() {
                Some(0)
            } else {
                parse_clock_ms(&self.clip_begin)
            }
        })
    }

    /// Clip end in milliseconds, if present and well-formed.
    pub fn end_ms(&self) -> Option<u64> {
        *self.end_ms.get_or_init(|| parse_clock_ms(&self.clip_end))
    }

    /// Clip length in milliseconds; zero when the clip is malformed or inverted.
    pub fn duration_ms(&self) -> u64 {
        match (self.begin_ms(), self.end_ms()) {
            (Some(b), Some(e)) => e.saturating_sub(b),
            _ => 0,
        }
    }
}

impl PartialEq for AudioRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.src == other.src
            && self.clip_begin == other.clip_begin
            && self.clip_end == other.clip_end
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(Container),
    Content(MediaRef),
}

/// A node in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Element id; empty when the source element had none.
    pub id: String,
    /// Parent node (None for root).
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: String::new(),
            parent: None,
            kind,
        }
    }

    /// A sequential container with no children.
    pub fn seq() -> Self {
        Self::new(NodeKind::Container(Container::default()))
    }

    /// A parallel container with no children.
    pub fn par() -> Self {
        Self::new(NodeKind::Container(Container {
            kind: ContainerKind::Parallel,
            ..Container::default()
        }))
    }

    pub fn content(media: MediaRef) -> Self {
        let mut node = Self::new(NodeKind::Content(media));
        node.id = match &node.kind {
            NodeKind::Content(m) => m.id().to_string(),
            NodeKind::Container(_) => String::new(),
        };
        node
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Tag a container with a skip option; tagged containers are escapable.
    pub fn with_skip_option(mut self, option: impl Into<String>) -> Self {
        if let NodeKind::Container(c) = &mut self.kind {
            c.skip_option = Some(option.into());
            c.escapable = true;
        }
        self
    }

    pub fn escapable(mut self) -> Self {
        if let NodeKind::Container(c) = &mut self.kind {
            c.escapable = true;
        }
        self
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Content(_) => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaRef> {
        match &self.kind {
            NodeKind::Content(m) => Some(m),
            NodeKind::Container(_) => None,
        }
    }

    /// Playable units: content nodes and parallel containers.
    pub fn is_leaf(&self) -> bool {
        match &self.kind {
            NodeKind::Content(_) => true,
            NodeKind::Container(c) => c.kind == ContainerKind::Parallel,
        }
    }
}
