//! Structured list-of-objects format.
//!
//! Each node maps to one object with `tag`, optional `id`, either `idref`
//! or a non-empty `value`, and nested `records`. Reading is selected
//! automatically when a document starts with `[`; writing is explicit.

use std::io::Write;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DecodeError, DecodeWarning, EncodeError, WarningKind};
use crate::model::{NodeId, Parent, Payload, Tree};

/// One node in the structured format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRecord {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<JsonRecord>,
}

/// Builds the root list from a structured document.
///
/// `idref` wins over `value` when both are present. A repeated `id` is
/// dropped with a warning, as in the line format.
pub(crate) fn read_records(tree: &mut Tree, bytes: &[u8]) -> Result<Vec<DecodeWarning>, DecodeError> {
    let records: Vec<JsonRecord> = serde_json::from_slice(bytes)?;
    let mut builder = RecordBuilder {
        seen: FxHashSet::default(),
        warnings: Vec::new(),
    };
    for record in records {
        let node = builder.build(tree, record)?;
        tree.children_mut(Parent::Root).push(node)?;
    }
    Ok(builder.warnings)
}

struct RecordBuilder {
    seen: FxHashSet<String>,
    warnings: Vec<DecodeWarning>,
}

impl RecordBuilder {
    fn build(&mut self, tree: &mut Tree, record: JsonRecord) -> Result<NodeId, DecodeError> {
        let node = tree.create(&record.tag)?;
        if let Some(id) = record.id {
            if self.seen.contains(&id) {
                let w = DecodeWarning {
                    line: 0,
                    kind: WarningKind::DuplicateIdentifier { id },
                };
                warn!("{}", w);
                self.warnings.push(w);
            } else {
                tree.set_identifier(node, Some(&id))?;
                self.seen.insert(id);
            }
        }
        match (record.idref, record.value) {
            (Some(target), _) => tree.set_reference(node, &target)?,
            (None, Some(value)) => tree.set_value(node, value)?,
            (None, None) => {}
        }
        for child in record.records {
            let c = self.build(tree, child)?;
            tree.children_mut(node).push(c)?;
        }
        Ok(node)
    }
}

// =============================================================================
// WRITING
// =============================================================================

impl Tree {
    /// Converts the subtree under `node` to its structured form.
    pub fn to_json_record(&self, node: NodeId) -> Option<JsonRecord> {
        let n = self.node(node)?;
        let (idref, value) = match n.payload() {
            Payload::Reference(target) => (Some(target.clone()), None),
            Payload::Value(v) if !v.is_empty() => (None, Some(v.clone())),
            _ => (None, None),
        };
        Some(JsonRecord {
            tag: n.tag().to_string(),
            id: n.identifier().map(str::to_string),
            idref,
            value,
            records: n
                .children()
                .iter()
                .filter_map(|&c| self.to_json_record(c))
                .collect(),
        })
    }

    /// Writes every root record, one per line, as a structured document.
    pub fn write_json<W: Write>(&self, mut out: W) -> Result<(), EncodeError> {
        out.write_all(b"[")?;
        for (i, root) in self.roots().iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            out.write_all(b"\n")?;
            if let Some(record) = self.to_json_record(root) {
                serde_json::to_writer(&mut out, &record)?;
            }
        }
        out.write_all(b"\n]\n")?;
        out.flush()?;
        Ok(())
    }

    /// Renders the tree as a structured document.
    pub fn to_json_string(&self) -> Result<String, EncodeError> {
        let mut out = Vec::new();
        self.write_json(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
