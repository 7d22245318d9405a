//! Node handles and list selectors.
//!
//! Nodes live in a generational arena owned by their [`Tree`](crate::Tree).
//! A [`NodeId`] is a copyable handle into that arena, stamped with the id of
//! the tree that created it so foreign handles are rejected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use generational_arena::Index;

/// Identity of a [`Tree`](crate::Tree) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

impl TreeId {
    /// Allocates a process-unique tree id.
    pub(crate) fn next() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a node stored in a tree.
///
/// Handles stay valid while the node exists in its tree's arena, whether or
/// not it is attached. After the node is discarded, or the tree is re-read,
/// the handle is stale and every lookup with it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) tree: TreeId,
    pub(crate) index: Index,
}

impl NodeId {
    pub(crate) fn new(tree: TreeId, index: Index) -> Self {
        Self { tree, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.index.into_raw_parts();
        write!(f, "#{}.{}", slot, generation)
    }
}

/// Selects a child list: the tree's root list or the children of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// The top-level record list of the tree.
    Root,
    /// The children of a node.
    Node(NodeId),
}

impl From<NodeId> for Parent {
    fn from(node: NodeId) -> Self {
        Parent::Node(node)
    }
}

/// Identifier reserved as the null-reference marker; never valid as an identifier.
pub const VOID_IDENTIFIER: &str = "VOID";

/// Formats the synthetic identifier `R<n>`.
pub fn synthetic_identifier(n: u64) -> String {
    format!("R{}", n)
}

/// Returns true for bytes allowed inside an `@...@` identifier.
#[inline]
pub fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_uppercase() || b == b'_'
}

/// Checks an identifier supplied through the API: non-empty and not `VOID`.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty() && id != VOID_IDENTIFIER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_ids_are_unique() {
        let a = TreeId::next();
        let b = TreeId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_synthetic_identifier() {
        assert_eq!(synthetic_identifier(0), "R0");
        assert_eq!(synthetic_identifier(12), "R12");
    }

    #[test]
    fn test_identifier_bytes() {
        assert!(is_identifier_byte(b'I'));
        assert!(is_identifier_byte(b'7'));
        assert!(is_identifier_byte(b'_'));
        assert!(!is_identifier_byte(b'a'));
        assert!(!is_identifier_byte(b'@'));
    }

    #[test]
    fn test_identifier_validity() {
        assert!(is_valid_identifier("I1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("VOID"));
    }
}
