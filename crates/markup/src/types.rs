pub type NodeIndex = u32;

/// Stable handle of a node inside a tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(pub NodeIndex);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordered `(key, value)` attribute pairs. Duplicate keys are legal; lookups use the first.
pub type Attributes = Vec<(String, String)>;

pub(crate) const ROOT_TAG: &str = "#root";
pub(crate) const TEXT_TAG: &str = "#text";
pub(crate) const COMMENT_TAG: &str = "#comment";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Declaration(String),
    StartTag {
        name: String,
        attributes: Attributes,
        self_closing: bool,
        position: usize,
    },
    EndTag {
        name: String,
        position: usize,
    },
    Comment(String),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Root {
        declaration: Option<String>,
        children: Vec<NodeId>,
    },
    /// Start tag whose fate is not decided yet. Never reachable from a finalized tree.
    Provisional {
        tag: String,
        attributes: Attributes,
    },
    Paired {
        tag: String,
        attributes: Attributes,
        children: Vec<NodeId>,
    },
    Standalone {
        tag: String,
        attributes: Attributes,
        /// Written as `<tag/>` in the source rather than left unclosed.
        self_closing: bool,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// Discriminant of [`Node`], used where only the variant matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Provisional,
    Paired,
    Standalone,
    Text,
    Comment,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Root { .. } => NodeKind::Root,
            Node::Provisional { .. } => NodeKind::Provisional,
            Node::Paired { .. } => NodeKind::Paired,
            Node::Standalone { .. } => NodeKind::Standalone,
            Node::Text { .. } => NodeKind::Text,
            Node::Comment { .. } => NodeKind::Comment,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Node::Root { .. } => ROOT_TAG,
            Node::Provisional { tag, .. }
            | Node::Paired { tag, .. }
            | Node::Standalone { tag, .. } => tag,
            Node::Text { .. } => TEXT_TAG,
            Node::Comment { .. } => COMMENT_TAG,
        }
    }

    pub fn attributes(&self) -> &[(String, String)] {
        match self {
            Node::Provisional { attributes, .. }
            | Node::Paired { attributes, .. }
            | Node::Standalone { attributes, .. } => attributes,
            Node::Root { .. } | Node::Text { .. } | Node::Comment { .. } => &[],
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut Attributes> {
        match self {
            Node::Provisional { attributes, .. }
            | Node::Paired { attributes, .. }
            | Node::Standalone { attributes, .. } => Some(attributes),
            Node::Root { .. } | Node::Text { .. } | Node::Comment { .. } => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Root { children, .. } | Node::Paired { children, .. } => children,
            Node::Provisional { .. }
            | Node::Standalone { .. }
            | Node::Text { .. }
            | Node::Comment { .. } => &[],
        }
    }

    /// Text or comment payload.
    pub fn body(&self) -> Option<&str> {
        match self {
            Node::Text { text } | Node::Comment { text } => Some(text),
            _ => None,
        }
    }

    /// First attribute value stored under `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Same variant and same tag name; the self-closing marker is not part of the identity.
    pub fn same_shape(&self, other: &Node) -> bool {
        self.kind() == other.kind() && self.tag() == other.tag()
    }
}
