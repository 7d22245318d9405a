//! Builder API for ergonomic subtree construction.
//!
//! # Example
//!
//! ```rust
//! use gedcom_tree::{NodeBuilder, Parent, Tree};
//!
//! let mut tree = Tree::new();
//! let indi = NodeBuilder::new("INDI")
//!     .id("I1")
//!     .child_value("NAME", "Ada /Lovelace/")
//!     .child("BIRT", |b| b.child_value("DATE", "10 DEC 1815"))
//!     .build(&mut tree)
//!     .unwrap();
//! tree.children_mut(Parent::Root).push(indi).unwrap();
//! assert_eq!(tree.resolve("I1"), Some(indi));
//! ```

use crate::error::TreeError;
use crate::model::{NodeId, Payload, Tree};

/// Builder for a detached node and its descendants.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    tag: String,
    identifier: Option<String>,
    payload: Payload,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            identifier: None,
            payload: Payload::Empty,
            children: Vec::new(),
        }
    }

    /// Sets the identifier the node declares.
    pub fn id(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets a text value, replacing any earlier payload.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.payload = Payload::Value(value.into());
        self
    }

    /// Makes the node a reference, replacing any earlier payload.
    pub fn reference(mut self, target: impl Into<String>) -> Self {
        self.payload = Payload::Reference(target.into());
        self
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// Appends a child configured by a builder function.
    pub fn child<F>(mut self, tag: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(NodeBuilder) -> NodeBuilder,
    {
        self.children.push(f(NodeBuilder::new(tag)));
        self
    }

    /// Appends a leaf child carrying a value.
    pub fn child_value(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.children.push(NodeBuilder::new(tag).value(value));
        self
    }

    /// Appends a leaf reference child.
    pub fn child_ref(mut self, tag: impl Into<String>, target: impl Into<String>) -> Self {
        self.children.push(NodeBuilder::new(tag).reference(target));
        self
    }

    /// Appends an already configured child builder.
    pub fn push(mut self, child: NodeBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Creates the subtree in `tree` and returns its detached root.
    ///
    /// Identifiers are registered once the result is attached somewhere
    /// reachable.
    pub fn build(self, tree: &mut Tree) -> Result<NodeId, TreeError> {
        let id = tree.create(&self.tag)?;
        if let Some(identifier) = self.identifier.as_deref() {
            tree.set_identifier(id, Some(identifier))?;
        }
        match self.payload {
            Payload::Empty => {}
            Payload::Value(v) => tree.set_value(id, v)?,
            Payload::Reference(r) => tree.set_reference(id, &r)?,
        }
        for child in self.children {
            let c = child.build(tree)?;
            tree.children_mut(id).push(c)?;
        }
        Ok(id)
    }
}
