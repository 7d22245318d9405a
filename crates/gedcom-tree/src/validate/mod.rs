//! Structural invariant checks for record trees.
//!
//! The tree API keeps these invariants on every mutation; the checker exists
//! for collaborators that want to assert them (tests, repair tools) without
//! trusting the implementation.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ValidationError;
use crate::model::{NodeId, Parent, Tree};

/// Checks single ownership, owner back-links and the identifier table.
///
/// Returns the first violation found, walking the tree in pre-order.
pub fn check_tree(tree: &Tree) -> Result<(), ValidationError> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut declared: FxHashMap<&str, NodeId> = FxHashMap::default();
    let mut stack: Vec<Parent> = vec![Parent::Root];

    while let Some(parent) = stack.pop() {
        for id in tree.children(parent).iter() {
            let Some(node) = tree.node(id) else {
                return Err(ValidationError::OwnerMismatch { node: id });
            };
            if node.parent() != Some(parent) {
                return Err(ValidationError::OwnerMismatch { node: id });
            }
            if !seen.insert(id) {
                return Err(ValidationError::SharedNode { node: id });
            }
            if let Some(identifier) = node.identifier() {
                if declared.insert(identifier, id).is_some() {
                    return Err(ValidationError::DuplicateIdentifier {
                        id: identifier.to_string(),
                    });
                }
                if tree.resolve(identifier) != Some(id) {
                    return Err(ValidationError::UnregisteredIdentifier {
                        id: identifier.to_string(),
                    });
                }
            }
            stack.push(Parent::Node(id));
        }
    }

    for (identifier, id) in tree.identifiers() {
        if declared.get(identifier) != Some(&id) {
            return Err(ValidationError::StaleIdentifier {
                id: identifier.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeBuilder;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        tree.parse(b"0 HEAD\n0 @I1@ INDI\n1 NAME x\n1 NOTE @N1@\n0 @N1@ NOTE y\n")
            .unwrap();
        tree
    }

    #[test]
    fn test_decoded_tree_is_valid() {
        assert_eq!(check_tree(&sample()), Ok(()));
    }

    #[test]
    fn test_valid_after_moves() {
        let mut tree = sample();
        let indi = tree.resolve("I1").unwrap();
        let note = tree.resolve("N1").unwrap();
        tree.children_mut(indi).push(note).unwrap();
        let extra = NodeBuilder::new("SOUR").id("S1").build(&mut tree).unwrap();
        tree.children_mut(note).insert(0, extra).unwrap();
        tree.children_mut(Parent::Root).remove(1).unwrap();
        assert_eq!(check_tree(&tree), Ok(()));
        assert_eq!(tree.identifier_count(), 0);
    }

    #[test]
    fn test_detects_owner_mismatch() {
        let mut tree = sample();
        let indi = tree.resolve("I1").unwrap();
        let name = tree.first_child(indi, "NAME").unwrap();
        if let Some(n) = tree.arena.get_mut(name.index) {
            n.owner = Some(Parent::Root);
        }
        assert_eq!(
            check_tree(&tree),
            Err(ValidationError::OwnerMismatch { node: name })
        );
    }

    #[test]
    fn test_detects_shared_node() {
        let mut tree = sample();
        let head = tree.header().unwrap();
        tree.roots.push(head);
        assert_eq!(
            check_tree(&tree),
            Err(ValidationError::SharedNode { node: head })
        );
    }

    #[test]
    fn test_detects_duplicate_and_stale_identifiers() {
        let mut tree = sample();
        let name = tree
            .first_child(tree.resolve("I1").unwrap(), "NAME")
            .unwrap();
        if let Some(n) = tree.arena.get_mut(name.index) {
            n.identifier = Some("N1".into());
        }
        let err = check_tree(&tree).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DuplicateIdentifier { .. } | ValidationError::UnregisteredIdentifier { .. }
        ));

        let mut tree = sample();
        let note = tree.resolve("N1").unwrap();
        if let Some(n) = tree.arena.get_mut(note.index) {
            n.identifier = None;
        }
        assert_eq!(
            check_tree(&tree),
            Err(ValidationError::StaleIdentifier { id: "N1".into() })
        );
    }
}
