//! The top-level record container.
//!
//! A [`Tree`] owns every node in a generational arena, the ordered root list,
//! the identifier table and the option map consulted by the decoder. Nodes
//! are only ever owned by one child list; the owner back-link stored on each
//! node is a plain handle used for level computation and detachment.

use std::collections::BTreeMap;
use std::fmt;

use generational_arena::Arena;
use rustc_hash::FxHashMap;

use crate::error::TreeError;
use crate::model::child_list::{ChildList, ChildListMut};
use crate::model::id::{is_valid_identifier, synthetic_identifier};
use crate::model::{Node, NodeId, NodeKind, Parent, Payload, TreeId};

// =============================================================================
// CHANGE NOTIFICATION
// =============================================================================

/// Direction of a structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Fired immediately after a node joined a child list.
    Added,
    /// Fired immediately before a node leaves a child list.
    Removed,
}

/// A single structural change, delivered to every registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub change: Change,
    /// The node that moved. Its descendants travel with it without events.
    pub node: NodeId,
    /// Kind of the moved node, so kind-specific caches can filter cheaply.
    pub kind: NodeKind,
    /// The list the node left or joined.
    pub parent: Parent,
}

/// Observer of structural changes.
///
/// Listeners are the invalidation seam for caches kept outside the tree
/// (relationship graphs, date indexes). They see the event only, never the
/// tree, so they cannot re-enter a mutation.
pub trait ChangeListener: Send {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent) + Send,
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event)
    }
}

// =============================================================================
// TREE
// =============================================================================

/// An in-memory GEDCOM record tree.
pub struct Tree {
    id: TreeId,
    pub(crate) arena: Arena<Node>,
    pub(crate) roots: Vec<NodeId>,
    identifiers: FxHashMap<String, NodeId>,
    options: BTreeMap<String, String>,
    listeners: Vec<Box<dyn ChangeListener>>,
    revision: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("nodes", &self.arena.len())
            .field("roots", &self.roots.len())
            .field("identifiers", &self.identifiers.len())
            .field("options", &self.options)
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Tree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            id: TreeId::next(),
            arena: Arena::new(),
            roots: Vec::new(),
            identifiers: FxHashMap::default(),
            options: BTreeMap::new(),
            listeners: Vec::new(),
            revision: 0,
        }
    }

    /// Options consulted at the start of every [`read`](Tree::read).
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.options
    }

    /// Registers a listener for every subsequent structural change.
    pub fn on_change<L>(&mut self, listener: L)
    where
        L: ChangeListener + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Counter bumped by every structural change.
    ///
    /// Collaborators that prefer lazy recomputation can compare revisions
    /// instead of registering a listener.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // =========================================================================
    // Node factory
    // =========================================================================

    /// Creates a detached node, choosing its kind from the tag.
    pub fn create(&mut self, tag: &str) -> Result<NodeId, TreeError> {
        if tag.is_empty() {
            return Err(TreeError::EmptyTag);
        }
        let index = self.arena.insert(Node::new(tag.to_string()));
        Ok(NodeId::new(self.id, index))
    }

    /// Creates a detached node carrying a text value.
    pub fn create_with_value(
        &mut self,
        tag: &str,
        value: impl Into<String>,
    ) -> Result<NodeId, TreeError> {
        let id = self.create(tag)?;
        self.set_value(id, value)?;
        Ok(id)
    }

    /// Creates a detached reference node pointing at `target`.
    ///
    /// `target` must already carry an identifier.
    pub fn new_reference(&mut self, tag: &str, target: NodeId) -> Result<NodeId, TreeError> {
        let identifier = self
            .get(target)?
            .identifier
            .clone()
            .ok_or(TreeError::NotIdentified { node: target })?;
        let id = self.create(tag)?;
        self.get_mut(id)?.payload = Payload::Reference(identifier);
        Ok(id)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the node behind a handle, or `None` if it is stale or foreign.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.tree != self.id {
            return None;
        }
        self.arena.get(id.index)
    }

    /// Returns true if the handle refers to a live node of this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&Node, TreeError> {
        if id.tree != self.id {
            return Err(TreeError::ForeignNode { node: id });
        }
        self.arena
            .get(id.index)
            .ok_or(TreeError::UnknownNode { node: id })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        if id.tree != self.id {
            return Err(TreeError::ForeignNode { node: id });
        }
        self.arena
            .get_mut(id.index)
            .ok_or(TreeError::UnknownNode { node: id })
    }

    /// The top-level record list.
    pub fn roots(&self) -> ChildList<'_> {
        ChildList::new(self, Parent::Root)
    }

    /// Read access to a child list.
    pub fn children(&self, parent: impl Into<Parent>) -> ChildList<'_> {
        ChildList::new(self, parent.into())
    }

    /// Mutable access to a child list.
    pub fn children_mut(&mut self, parent: impl Into<Parent>) -> ChildListMut<'_> {
        ChildListMut::new(self, parent.into())
    }

    /// The first child of `parent` carrying `tag`.
    pub fn first_child(&self, parent: impl Into<Parent>, tag: &str) -> Option<NodeId> {
        self.children(parent).first(tag)
    }

    /// The parent node, `None` for top-level and detached nodes.
    pub fn owner(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::owner)
    }

    /// Depth of a node: the number of owner hops to the root list.
    pub fn level(&self, id: NodeId) -> Result<usize, TreeError> {
        let mut level = 0;
        let mut current = self.get(id)?.owner;
        while let Some(Parent::Node(p)) = current {
            level += 1;
            current = self.get(p)?.owner;
        }
        Ok(level)
    }

    /// Returns true when the node is connected to the root list.
    pub fn is_reachable(&self, id: NodeId) -> bool {
        self.node(id)
            .and_then(|n| n.owner)
            .is_some_and(|p| self.parent_reachable(p))
    }

    /// Looks up the reachable node declaring `identifier`.
    pub fn resolve(&self, identifier: &str) -> Option<NodeId> {
        self.identifiers.get(identifier).copied()
    }

    /// Follows a reference node to its target.
    ///
    /// Non-reference nodes dereference to themselves. Unresolved references
    /// (forward, pruned or stale) return `None`.
    pub fn dereference(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id)?.payload() {
            Payload::Reference(target) => self.resolve(target),
            _ => Some(id),
        }
    }

    /// Number of identifiers currently registered.
    pub fn identifier_count(&self) -> usize {
        self.identifiers.len()
    }

    /// Iterates over the registered `(identifier, node)` pairs.
    pub fn identifiers(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.identifiers.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Pre-order iteration over a child list and everything below it.
    pub fn descendants(&self, parent: impl Into<Parent>) -> Descendants<'_> {
        Descendants::new(self, parent.into())
    }

    // =========================================================================
    // Payload & identity
    // =========================================================================

    /// Sets the text value. Fails on reference nodes.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        if node.payload.is_reference() {
            return Err(TreeError::ReferenceValue { node: id });
        }
        node.payload = Payload::Value(value.into());
        Ok(())
    }

    /// Turns a node into a reference to `target`. Allowed once, and only on
    /// nodes that never took a value.
    ///
    /// `VOID` is accepted as a target; it never resolves.
    pub fn set_reference(&mut self, id: NodeId, target: &str) -> Result<(), TreeError> {
        let node = self.get(id)?;
        if node.payload != Payload::Empty {
            return Err(TreeError::PayloadAlreadySet { node: id });
        }
        if target.is_empty() {
            return Err(TreeError::InvalidIdentifier {
                id: target.to_string(),
            });
        }
        self.get_mut(id)?.payload = Payload::Reference(target.to_string());
        Ok(())
    }

    /// Assigns an identifier, generating the first free `R<n>` when `None`.
    ///
    /// Fails if the node already has one, or if a reachable node already
    /// declares the same identifier.
    pub fn set_identifier(
        &mut self,
        id: NodeId,
        identifier: Option<&str>,
    ) -> Result<String, TreeError> {
        if let Some(existing) = &self.get(id)?.identifier {
            return Err(TreeError::IdentifierAlreadySet {
                id: existing.clone(),
            });
        }
        let identifier = match identifier {
            Some(s) if is_valid_identifier(s) => s.to_string(),
            Some(s) => {
                return Err(TreeError::InvalidIdentifier { id: s.to_string() });
            }
            None => self.next_identifier(),
        };
        if self.is_reachable(id) {
            if self.identifiers.contains_key(&identifier) {
                return Err(TreeError::DuplicateIdentifier { id: identifier });
            }
            self.identifiers.insert(identifier.clone(), id);
        }
        self.get_mut(id)?.identifier = Some(identifier.clone());
        Ok(identifier)
    }

    /// The first `R<n>` not present in the identifier table.
    pub fn next_identifier(&self) -> String {
        (0u64..)
            .map(synthetic_identifier)
            .find(|candidate| !self.identifiers.contains_key(candidate))
            .unwrap_or_default()
    }

    /// Records the source line a node was decoded from.
    pub fn set_line(&mut self, id: NodeId, line: u32) -> Result<(), TreeError> {
        self.get_mut(id)?.line = line;
        Ok(())
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Frees a detached node and its whole subtree.
    ///
    /// Handles to the freed nodes become stale.
    pub fn discard(&mut self, id: NodeId) -> Result<(), TreeError> {
        if self.get(id)?.is_attached() {
            return Err(TreeError::StillAttached { node: id });
        }
        for n in self.subtree(id) {
            self.arena.remove(n.index);
        }
        Ok(())
    }

    /// Removes every root record and frees all nodes.
    ///
    /// `Removed` fires once per root record, front to back.
    pub fn clear(&mut self) {
        let roots = self.roots.clone();
        for root in roots {
            self.emit(Change::Removed, root, Parent::Root);
        }
        self.roots.clear();
        self.arena.clear();
        self.identifiers.clear();
    }

    // =========================================================================
    // Internals shared with the child lists
    // =========================================================================

    pub(crate) fn check(&self, id: NodeId) -> Result<(), TreeError> {
        self.get(id).map(|_| ())
    }

    pub(crate) fn list(&self, parent: Parent) -> Result<&[NodeId], TreeError> {
        match parent {
            Parent::Root => Ok(&self.roots),
            Parent::Node(p) => Ok(&self.get(p)?.children),
        }
    }

    fn list_slot_mut(&mut self, parent: Parent) -> Option<&mut Vec<NodeId>> {
        match parent {
            Parent::Root => Some(&mut self.roots),
            Parent::Node(p) => self.arena.get_mut(p.index).map(|n| &mut n.children),
        }
    }

    /// Returns true if a node placed in `parent` would be reachable.
    pub(crate) fn parent_reachable(&self, parent: Parent) -> bool {
        let mut current = Some(parent);
        while let Some(p) = current {
            match p {
                Parent::Root => return true,
                Parent::Node(n) => current = self.arena.get(n.index).and_then(|x| x.owner),
            }
        }
        false
    }

    /// Returns true if `candidate` is `node` or one of its owners.
    pub(crate) fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == candidate {
                return true;
            }
            current = self.arena.get(n.index).and_then(Node::owner);
        }
        false
    }

    /// Pre-order list of `id` and its descendants.
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.arena.get(n.index) {
                out.push(n);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Finds an identifier in `id`'s subtree that is already registered to a
    /// node outside that subtree and outside `exempt`'s subtree.
    pub(crate) fn identifier_conflict(&self, id: NodeId, exempt: Option<NodeId>) -> Option<String> {
        for n in self.subtree(id) {
            let Some(identifier) = self.arena.get(n.index).and_then(|x| x.identifier.as_ref())
            else {
                continue;
            };
            let Some(&holder) = self.identifiers.get(identifier) else {
                continue;
            };
            if self.is_ancestor_or_self(id, holder) {
                continue;
            }
            if exempt.is_some_and(|e| self.is_ancestor_or_self(e, holder)) {
                continue;
            }
            return Some(identifier.clone());
        }
        None
    }

    fn register(&mut self, id: NodeId) {
        for n in self.subtree(id) {
            if let Some(identifier) = self.arena.get(n.index).and_then(|x| x.identifier.clone()) {
                self.identifiers.insert(identifier, n);
            }
        }
    }

    fn unregister(&mut self, id: NodeId) {
        for n in self.subtree(id) {
            let Some(identifier) = self.arena.get(n.index).and_then(|x| x.identifier.as_ref())
            else {
                continue;
            };
            if self.identifiers.get(identifier) == Some(&n) {
                self.identifiers.remove(identifier);
            }
        }
    }

    fn emit(&mut self, change: Change, node: NodeId, parent: Parent) {
        self.revision += 1;
        let kind = self
            .arena
            .get(node.index)
            .map_or(NodeKind::Generic, |n| n.kind);
        let event = ChangeEvent {
            change,
            node,
            kind,
            parent,
        };
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }
    }

    /// Takes an attached node out of its list. `Removed` fires first.
    pub(crate) fn detach(&mut self, node: NodeId, unregister: bool) {
        let Some(parent) = self.arena.get(node.index).and_then(|n| n.owner) else {
            return;
        };
        self.emit(Change::Removed, node, parent);
        if let Some(list) = self.list_slot_mut(parent) {
            if let Some(pos) = list.iter().position(|&n| n == node) {
                list.remove(pos);
            }
        }
        if unregister {
            self.unregister(node);
        }
        if let Some(n) = self.arena.get_mut(node.index) {
            n.owner = None;
        }
    }

    /// Puts a detached node into `parent` at `index`. `Added` fires last.
    pub(crate) fn attach(&mut self, parent: Parent, index: usize, node: NodeId, register: bool) {
        if let Some(list) = self.list_slot_mut(parent) {
            list.insert(index, node);
        }
        if let Some(n) = self.arena.get_mut(node.index) {
            n.owner = Some(parent);
        }
        if register {
            self.register(node);
        }
        self.emit(Change::Added, node, parent);
    }
}

// =============================================================================
// TRAVERSAL
// =============================================================================

/// Pre-order iterator returned by [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Descendants<'a> {
    fn new(tree: &'a Tree, parent: Parent) -> Self {
        let mut stack = Vec::new();
        if let Ok(list) = tree.list(parent) {
            // Reverse so the first child is popped first
            stack.extend(list.iter().rev());
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(id.index) {
                self.stack.extend(node.children.iter().rev());
                return Some((id, node));
            }
        }
        None
    }
}
