//! GEDCOM record trees: decoding, encoding and structural editing.
//!
//! This crate reads and writes genealogical data in the level-prefixed GEDCOM
//! line format (versions 5.x and 7.x) and keeps it as an in-memory tree with
//! cross-reference semantics.
//!
//! # Overview
//!
//! - **Streaming decoder**: one forward pass, version-dependent grammar,
//!   UTF-8 / ASCII / ANSEL input, `CONC`/`CONT` reassembly
//! - **Tree model**: arena-backed nodes with single ownership, move semantics
//!   and a lock-step identifier table
//! - **Faithful encoder**: deterministic UTF-8 output with 90-byte line
//!   wrapping for version 5
//!
//! # Quick Start
//!
//! ```rust
//! use gedcom_tree::Tree;
//!
//! let mut tree = Tree::new();
//! tree.parse(b"0 HEAD\n1 GEDC\n2 VERS 5.5.1\n0 @I1@ INDI\n1 NAME Ada /Lovelace/\n0 TRLR\n")
//!     .unwrap();
//!
//! let ada = tree.resolve("I1").unwrap();
//! let name = tree.first_child(ada, "NAME").unwrap();
//! assert_eq!(tree.node(name).unwrap().value(), Some("Ada /Lovelace/"));
//!
//! let bytes = tree.to_bytes().unwrap();
//! assert!(bytes.ends_with(b"0 TRLR\n"));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Nodes, payloads, the tree and its child lists
//! - [`codec`]: Line-format and structured-format reading and writing
//! - [`validate`]: Structural invariant checks
//! - [`error`]: Error and warning types
//!
//! # Alternate Format
//!
//! A document whose first significant byte is `[` is read as a list of
//! `{tag, id, value, idref, records}` objects. [`Tree::write_json`] writes
//! the same shape.

pub mod codec;
pub mod error;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{Charset, DecodeOptions, DecodeReport, JsonRecord, SourceFormat};
pub use error::{
    DecodeError, DecodeWarning, EncodeError, ErrorKind, Found, TreeError, ValidationError,
    WarningKind,
};
pub use model::{
    Change, ChangeEvent, ChangeListener, ChildList, ChildListMut, Descendants, Node, NodeBuilder,
    NodeId, NodeKind, Parent, Payload, Tree, TreeId,
};
pub use validate::check_tree;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
