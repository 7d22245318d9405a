//! Ordered child lists with single-ownership move semantics.
//!
//! The root list and every node's children share these semantics. Inserting
//! a node that already sits somewhere in the same tree moves it: it is
//! detached from its old list (`Removed` fires) and attached at the new
//! position (`Added` fires), never belonging to two lists at once.

use crate::error::TreeError;
use crate::model::{NodeId, Parent, Tree};

/// Read-only view of a child list.
#[derive(Debug, Clone, Copy)]
pub struct ChildList<'a> {
    tree: &'a Tree,
    parent: Parent,
    nodes: &'a [NodeId],
}

impl<'a> ChildList<'a> {
    pub(crate) fn new(tree: &'a Tree, parent: Parent) -> Self {
        let nodes = tree.list(parent).unwrap_or(&[]);
        Self {
            tree,
            parent,
            nodes,
        }
    }

    /// The list this view reads.
    pub fn parent(&self) -> Parent {
        self.parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + use<'a> {
        self.nodes.iter().copied()
    }

    pub fn as_slice(&self) -> &'a [NodeId] {
        self.nodes
    }

    /// Position of `node` in this list.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    /// The first child carrying `tag`.
    pub fn first(&self, tag: &str) -> Option<NodeId> {
        let tree = self.tree;
        self.iter()
            .find(|&n| tree.node(n).is_some_and(|x| x.tag() == tag))
    }

    /// Every child carrying `tag`, in order.
    pub fn with_tag(&self, tag: &'a str) -> impl Iterator<Item = NodeId> + use<'a> {
        let tree = self.tree;
        self.iter()
            .filter(move |&n| tree.node(n).is_some_and(|x| x.tag() == tag))
    }
}

/// Mutable handle on a child list.
///
/// Every operation validates its arguments before touching the tree, so a
/// failed call leaves the tree exactly as it was.
#[derive(Debug)]
pub struct ChildListMut<'a> {
    tree: &'a mut Tree,
    parent: Parent,
}

impl<'a> ChildListMut<'a> {
    pub(crate) fn new(tree: &'a mut Tree, parent: Parent) -> Self {
        Self { tree, parent }
    }

    pub fn len(&self) -> usize {
        self.tree.list(self.parent).map_or(0, <[NodeId]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.tree
            .list(self.parent)
            .ok()
            .and_then(|l| l.get(index).copied())
    }

    /// Inserts `node` at `index`, moving it if it is already in the tree.
    ///
    /// For a move inside this same list, `index` counts positions before the
    /// node is taken out.
    pub fn insert(&mut self, index: usize, node: NodeId) -> Result<(), TreeError> {
        self.tree.insert_child(self.parent, index, node)
    }

    /// Appends `node`, moving it if it is already in the tree.
    pub fn push(&mut self, node: NodeId) -> Result<(), TreeError> {
        let len = self.tree.list(self.parent)?.len();
        self.tree.insert_child(self.parent, len, node)
    }

    /// Replaces the node at `index` with `node` and returns the displaced
    /// node, which is left detached.
    pub fn set(&mut self, index: usize, node: NodeId) -> Result<NodeId, TreeError> {
        self.tree.replace_child(self.parent, index, node)
    }

    /// Detaches and returns the node at `index`.
    pub fn remove(&mut self, index: usize) -> Result<NodeId, TreeError> {
        self.tree.remove_child(self.parent, index)
    }

    /// Detaches every node, front to back, returning them in order.
    pub fn clear(&mut self) -> Result<Vec<NodeId>, TreeError> {
        let mut removed = Vec::with_capacity(self.len());
        while !self.tree.list(self.parent)?.is_empty() {
            removed.push(self.tree.remove_child(self.parent, 0)?);
        }
        Ok(removed)
    }
}

impl Tree {
    fn check_target(&self, parent: Parent, node: NodeId) -> Result<(), TreeError> {
        self.check(node)?;
        if let Parent::Node(p) = parent {
            self.check(p)?;
            if self.is_ancestor_or_self(node, p) {
                return Err(TreeError::Cycle { node });
            }
        }
        Ok(())
    }

    pub(crate) fn insert_child(
        &mut self,
        parent: Parent,
        index: usize,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.check_target(parent, node)?;
        let list = self.list(parent)?;
        if index > list.len() {
            return Err(TreeError::IndexOutOfBounds {
                index,
                len: list.len(),
            });
        }
        let old_position = list.iter().position(|&n| n == node);

        let was = self.is_reachable(node);
        let will = self.parent_reachable(parent);
        if will && !was {
            if let Some(id) = self.identifier_conflict(node, None) {
                return Err(TreeError::DuplicateIdentifier { id });
            }
        }

        let mut index = index;
        if old_position.is_some_and(|p| p < index) {
            index -= 1;
        }
        self.detach(node, was && !will);
        self.attach(parent, index, node, will && !was);
        Ok(())
    }

    pub(crate) fn replace_child(
        &mut self,
        parent: Parent,
        index: usize,
        node: NodeId,
    ) -> Result<NodeId, TreeError> {
        self.check_target(parent, node)?;
        let list = self.list(parent)?;
        let Some(&displaced) = list.get(index) else {
            return Err(TreeError::IndexOutOfBounds {
                index,
                len: list.len(),
            });
        };
        if displaced == node {
            return Ok(node);
        }

        let was = self.is_reachable(node);
        let will = self.parent_reachable(parent);
        if will && !was {
            if let Some(id) = self.identifier_conflict(node, Some(displaced)) {
                return Err(TreeError::DuplicateIdentifier { id });
            }
        }

        // The incoming node may live inside the displaced subtree, so take it
        // out first; retiring the displaced node must not unregister it.
        self.detach(node, was && !will);
        let position = self
            .list(parent)?
            .iter()
            .position(|&n| n == displaced)
            .unwrap_or(index);
        self.detach(displaced, will);
        self.attach(parent, position, node, will && !was);
        Ok(displaced)
    }

    pub(crate) fn remove_child(&mut self, parent: Parent, index: usize) -> Result<NodeId, TreeError> {
        let list = self.list(parent)?;
        let Some(&node) = list.get(index) else {
            return Err(TreeError::IndexOutOfBounds {
                index,
                len: list.len(),
            });
        };
        let reachable = self.parent_reachable(parent);
        self.detach(node, reachable);
        Ok(node)
    }
}
