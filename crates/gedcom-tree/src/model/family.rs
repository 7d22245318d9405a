//! Family-group accessors.
//!
//! A `FAM` record names its members through `HUSB`, `WIFE` and `CHIL`
//! reference children. Only references that resolve to individual records
//! count.

use crate::model::{NodeId, NodeKind, Tree};

impl Tree {
    /// The individual behind the family's first `HUSB` child.
    pub fn husband(&self, family: NodeId) -> Option<NodeId> {
        self.member(family, "HUSB")
    }

    /// The individual behind the family's first `WIFE` child.
    pub fn wife(&self, family: NodeId) -> Option<NodeId> {
        self.member(family, "WIFE")
    }

    /// Every individual behind the family's `CHIL` children, in order.
    pub fn family_children(&self, family: NodeId) -> Vec<NodeId> {
        self.children(family)
            .with_tag("CHIL")
            .filter_map(|c| self.individual(c))
            .collect()
    }

    /// Returns true for family records with no spouse and no child.
    pub fn is_empty_family(&self, family: NodeId) -> bool {
        self.node(family)
            .is_some_and(|n| n.kind() == NodeKind::Family)
            && self.husband(family).is_none()
            && self.wife(family).is_none()
            && self.family_children(family).is_empty()
    }

    fn member(&self, family: NodeId, tag: &str) -> Option<NodeId> {
        let slot = self.first_child(family, tag)?;
        self.individual(slot)
    }

    fn individual(&self, slot: NodeId) -> Option<NodeId> {
        let target = self.dereference(slot)?;
        (self.node(target)?.kind() == NodeKind::Individual).then_some(target)
    }
}
