//! Data model types for GEDCOM record trees.
//!
//! - Handles (node, tree and parent identifiers)
//! - Nodes and payloads
//! - The tree and its child lists
//! - Header and family accessors
//! - Builders (ergonomic construction)

pub mod builder;
pub mod child_list;
pub mod family;
pub mod header;
pub mod id;
pub mod node;
pub mod tree;

pub use builder::NodeBuilder;
pub use child_list::{ChildList, ChildListMut};
pub use id::{is_identifier_byte, is_valid_identifier, NodeId, Parent, TreeId, VOID_IDENTIFIER};
pub use node::{Node, NodeKind, Payload};
pub use tree::{Change, ChangeEvent, ChangeListener, Descendants, Tree};
