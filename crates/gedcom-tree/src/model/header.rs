//! Header record accessors.

use crate::error::TreeError;
use crate::model::{NodeId, NodeKind, Parent, Tree};

impl Tree {
    /// The mandatory `HEAD` record: the first root record, if header-kind.
    pub fn header(&self) -> Option<NodeId> {
        let first = self.roots().get(0)?;
        (self.node(first)?.kind() == NodeKind::Header).then_some(first)
    }

    /// The declared charset, upper-cased, when it is UTF-8, ASCII or ANSEL.
    pub fn charset(&self) -> Option<String> {
        let char_node = self.first_child(self.header()?, "CHAR")?;
        let value = self.node(char_node)?.value()?;
        ["UTF-8", "ASCII", "ANSEL"]
            .iter()
            .find(|known| known.eq_ignore_ascii_case(value))
            .map(|known| known.to_string())
    }

    /// The `HEAD.GEDC.VERS` value.
    pub fn version(&self) -> Option<&str> {
        let gedc = self.first_child(self.header()?, "GEDC")?;
        let vers = self.first_child(gedc, "VERS")?;
        self.node(vers)?.value()
    }

    /// The major version (typically 5 or 7), or 0 when unspecified.
    pub fn major_version(&self) -> u32 {
        self.version().map_or(0, major_version_of)
    }

    /// Sets `HEAD.GEDC.VERS`, creating `GEDC` and `VERS` first in their
    /// lists when absent. Does nothing without a header.
    pub fn set_version(&mut self, version: &str) -> Result<(), TreeError> {
        let Some(header) = self.header() else {
            return Ok(());
        };
        let gedc = match self.first_child(header, "GEDC") {
            Some(g) => g,
            None => {
                let g = self.create("GEDC")?;
                self.children_mut(Parent::Node(header)).insert(0, g)?;
                g
            }
        };
        match self.first_child(gedc, "VERS") {
            Some(vers) => self.set_value(vers, version),
            None => {
                let vers = self.create_with_value("VERS", version)?;
                self.children_mut(gedc).insert(0, vers)
            }
        }
    }
}

/// Leading digit of a version string when followed by `.`; 0 otherwise.
///
/// A bare `"7"` is 0, the same as the decoder, which only switches grammar
/// on a `"7."` or `"5."` prefix.
pub(crate) fn major_version_of(version: &str) -> u32 {
    let mut chars = version.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ '1'..='9'), Some('.')) => c.to_digit(10).unwrap_or(0),
        _ => 0,
    }
}
