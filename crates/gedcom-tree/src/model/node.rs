//! Tree nodes: tag, identifier, payload, owner back-link and children.

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::model::{NodeId, Parent};

/// Specialized node kinds selected by reserved tag.
///
/// Every node is created through [`Tree::create`](crate::Tree::create), which
/// picks the kind from the tag. Unreserved tags get [`NodeKind::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// `HEAD`
    Header,
    /// `DATE`
    Date,
    /// `INDI`
    Individual,
    /// `FAM`
    Family,
    /// `OBJE`
    Multimedia,
    /// `NOTE`
    Note,
    /// `REPO`
    Repository,
    /// `SOUR`
    Source,
    /// `SUBM`
    Submitter,
    /// Any other tag.
    Generic,
}

lazy_static! {
    static ref KIND_BY_TAG: FxHashMap<&'static str, NodeKind> = {
        let mut m = FxHashMap::default();
        m.insert("HEAD", NodeKind::Header);
        m.insert("DATE", NodeKind::Date);
        m.insert("INDI", NodeKind::Individual);
        m.insert("FAM", NodeKind::Family);
        m.insert("OBJE", NodeKind::Multimedia);
        m.insert("NOTE", NodeKind::Note);
        m.insert("REPO", NodeKind::Repository);
        m.insert("SOUR", NodeKind::Source);
        m.insert("SUBM", NodeKind::Submitter);
        m
    };
}

impl NodeKind {
    /// Looks up the kind constructed for a tag.
    pub fn for_tag(tag: &str) -> NodeKind {
        KIND_BY_TAG.get(tag).copied().unwrap_or(NodeKind::Generic)
    }

    /// Returns the reserved tag of this kind, or `None` for `Generic`.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            NodeKind::Header => Some("HEAD"),
            NodeKind::Date => Some("DATE"),
            NodeKind::Individual => Some("INDI"),
            NodeKind::Family => Some("FAM"),
            NodeKind::Multimedia => Some("OBJE"),
            NodeKind::Note => Some("NOTE"),
            NodeKind::Repository => Some("REPO"),
            NodeKind::Source => Some("SOUR"),
            NodeKind::Submitter => Some("SUBM"),
            NodeKind::Generic => None,
        }
    }
}

/// Value-or-reference payload of a node.
///
/// A node starts `Empty`. It may take a value any number of times, or a
/// reference exactly once; the two never mix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// Literal text.
    Value(String),
    /// Identifier of the node pointed at.
    Reference(String),
}

impl Payload {
    /// Returns the text value, `""` when unset, or `None` for references.
    pub fn value(&self) -> Option<&str> {
        match self {
            Payload::Empty => Some(""),
            Payload::Value(v) => Some(v),
            Payload::Reference(_) => None,
        }
    }

    /// Returns the referenced identifier, if this is a reference payload.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Payload::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Returns true for reference payloads.
    pub fn is_reference(&self) -> bool {
        matches!(self, Payload::Reference(_))
    }
}

/// A single tree element.
///
/// Nodes are read through [`Tree::node`](crate::Tree::node) and mutated only
/// through the tree, which keeps ownership and the identifier table in step.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) tag: String,
    pub(crate) kind: NodeKind,
    pub(crate) identifier: Option<String>,
    pub(crate) payload: Payload,
    pub(crate) owner: Option<Parent>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) line: u32,
}

impl Node {
    pub(crate) fn new(tag: String) -> Self {
        let kind = NodeKind::for_tag(&tag);
        Self {
            tag,
            kind,
            identifier: None,
            payload: Payload::Empty,
            owner: None,
            children: Vec::new(),
            line: 0,
        }
    }

    /// The tag, e.g. `INDI` or `BIRT`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The specialized kind chosen from the tag at creation.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The identifier this node declares, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The text value; `""` when never set, `None` for reference nodes.
    pub fn value(&self) -> Option<&str> {
        self.payload.value()
    }

    /// The identifier this node points at, for reference nodes.
    pub fn reference(&self) -> Option<&str> {
        self.payload.reference()
    }

    /// The parent node, or `None` for top-level and detached nodes.
    pub fn owner(&self) -> Option<NodeId> {
        match self.owner {
            Some(Parent::Node(id)) => Some(id),
            _ => None,
        }
    }

    /// The list this node currently belongs to, `None` when detached.
    pub fn parent(&self) -> Option<Parent> {
        self.owner
    }

    /// Returns true when the node sits in some child list.
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    /// Ordered child handles.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The 1-based source line, or 0 for nodes built programmatically.
    pub fn line(&self) -> u32 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_reserved_tags() {
        assert_eq!(NodeKind::for_tag("HEAD"), NodeKind::Header);
        assert_eq!(NodeKind::for_tag("FAM"), NodeKind::Family);
        assert_eq!(NodeKind::for_tag("SUBM"), NodeKind::Submitter);
        assert_eq!(NodeKind::for_tag("BIRT"), NodeKind::Generic);
        assert_eq!(NodeKind::for_tag("head"), NodeKind::Generic);
    }

    #[test]
    fn test_kind_tag_roundtrip() {
        for tag in ["HEAD", "DATE", "INDI", "FAM", "OBJE", "NOTE", "REPO", "SOUR", "SUBM"] {
            assert_eq!(NodeKind::for_tag(tag).tag(), Some(tag));
        }
        assert_eq!(NodeKind::Generic.tag(), None);
    }

    #[test]
    fn test_payload_accessors() {
        assert_eq!(Payload::Empty.value(), Some(""));
        assert_eq!(Payload::Value("x".into()).value(), Some("x"));
        let r = Payload::Reference("I1".into());
        assert_eq!(r.value(), None);
        assert_eq!(r.reference(), Some("I1"));
        assert!(r.is_reference());
    }

    #[test]
    fn test_new_node_is_detached() {
        let n = Node::new("INDI".into());
        assert_eq!(n.kind(), NodeKind::Individual);
        assert!(!n.is_attached());
        assert_eq!(n.owner(), None);
        assert_eq!(n.line(), 0);
        assert!(n.children().is_empty());
    }
}
