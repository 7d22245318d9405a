//! Line-format encoder.
//!
//! Output is always UTF-8. Values are split into `CONT` lines at every line
//! feed, and for version 5 (or unversioned) output also into `CONC` lines so
//! no physical line reaches 90 bytes. A character is never divided across
//! two lines.

use std::io::Write;

use tracing::debug;

use crate::error::EncodeError;
use crate::model::{NodeId, NodeKind, Payload, Tree};

/// Physical line limit for version 5 output, newline excluded.
pub const MAX_LINE_V5: usize = 90;

// =============================================================================
// WRITER
// =============================================================================

/// Output buffer for one rendered document.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a decimal level number.
    pub fn write_level(&mut self, level: usize) {
        self.write_str(&level.to_string());
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// How `@` inside values is protected from being read as a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtEscape {
    /// Before version 7 every `@@` collapses on read, so every `@` is doubled.
    Every,
    /// Version 7 only escapes an `@` starting a physical line.
    Leading,
}

/// Per-document rendering settings derived from the header.
#[derive(Debug, Clone, Copy)]
struct Layout {
    limit: Option<usize>,
    escape: AtEscape,
}

impl Layout {
    fn for_version(major: u32) -> Self {
        Self {
            limit: (major <= 5).then_some(MAX_LINE_V5),
            escape: if major >= 7 {
                AtEscape::Leading
            } else {
                AtEscape::Every
            },
        }
    }
}

impl Tree {
    /// Writes the tree in line format.
    ///
    /// The header's `CHAR` is forced to `UTF-8` first. Nothing is written
    /// when the tree has no header.
    pub fn write<W: Write>(&mut self, mut out: W) -> Result<(), EncodeError> {
        let bytes = self.to_bytes()?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }

    /// Renders the tree in line format.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, EncodeError> {
        let header = self.header().ok_or(EncodeError::NoHeader)?;
        self.normalize_charset(header)?;

        let major = self.major_version();
        let layout = Layout::for_version(major);
        debug!(major, limit = ?layout.limit, "encoding line format");

        let mut w = Writer::with_capacity(self.node_count() * 16);
        let roots = self.roots().as_slice();
        for (i, &root) in roots.iter().enumerate() {
            let Some(node) = self.node(root) else {
                continue;
            };
            if i + 1 == roots.len() && node.tag() == "TRLR" {
                continue;
            }
            if node.kind() == NodeKind::Family && self.is_empty_family(root) {
                continue;
            }
            self.render(&mut w, root, layout);
        }
        w.write_bytes(b"0 TRLR\n");
        Ok(w.into_bytes())
    }

    /// Makes the header's `CHAR` child read `UTF-8`, inserting or replacing it.
    fn normalize_charset(&mut self, header: NodeId) -> Result<(), EncodeError> {
        let Some(existing) = self.first_child(header, "CHAR") else {
            let c = self.create_with_value("CHAR", "UTF-8")?;
            self.children_mut(header).push(c)?;
            return Ok(());
        };
        if self.node(existing).and_then(|n| n.value()) == Some("UTF-8") {
            return Ok(());
        }
        let Some(index) = self.children(header).position(existing) else {
            return Ok(());
        };
        let c = self.create_with_value("CHAR", "UTF-8")?;
        let displaced = self.children_mut(header).set(index, c)?;
        self.discard(displaced)?;
        Ok(())
    }

    /// Renders `root` and its descendants, depth first.
    fn render(&self, w: &mut Writer, root: NodeId, layout: Layout) {
        let mut stack = vec![(root, 0usize)];
        while let Some((id, level)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if let Payload::Reference(target) = node.payload() {
                if self.resolve(target).is_none() {
                    continue;
                }
            }

            let line_start = w.len();
            w.write_level(level);
            w.write_byte(b' ');
            if let Some(identifier) = node.identifier() {
                w.write_byte(b'@');
                w.write_str(identifier);
                w.write_bytes(b"@ ");
            }
            w.write_str(node.tag());
            match node.payload() {
                Payload::Reference(target) => {
                    w.write_bytes(b" @");
                    w.write_str(target);
                    w.write_byte(b'@');
                }
                Payload::Value(value) => write_value(w, value, level, line_start, layout),
                Payload::Empty => {}
            }
            w.write_byte(b'\n');

            stack.extend(node.children().iter().rev().map(|&c| (c, level + 1)));
        }
    }
}

/// Writes a value after the tag, opening `CONT` and `CONC` lines as needed.
fn write_value(w: &mut Writer, value: &str, level: usize, mut line_start: usize, layout: Layout) {
    if value.is_empty() {
        return;
    }
    let mut at_line_start = true;
    if !value.starts_with('\n') {
        w.write_byte(b' ');
    }

    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {}
            '\n' => {
                w.write_byte(b'\n');
                line_start = w.len();
                w.write_level(level + 1);
                w.write_bytes(b" CONT");
                if chars.peek().is_some_and(|&next| next != '\n') {
                    w.write_byte(b' ');
                }
                at_line_start = true;
            }
            _ => {
                let doubled = c == '@'
                    && (layout.escape == AtEscape::Every || at_line_start);
                let width = c.len_utf8() * if doubled { 2 } else { 1 };
                if let Some(limit) = layout.limit {
                    if w.len() - line_start + width >= limit {
                        w.write_byte(b'\n');
                        line_start = w.len();
                        w.write_level(level + 1);
                        w.write_bytes(b" CONC ");
                    }
                }
                let mut utf8 = [0u8; 4];
                let encoded = c.encode_utf8(&mut utf8).as_bytes();
                w.write_bytes(encoded);
                if doubled {
                    w.write_bytes(encoded);
                }
                at_line_start = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeBuilder, Parent};

    fn encode(input: &[u8]) -> String {
        let mut tree = Tree::new();
        tree.parse(input).unwrap();
        String::from_utf8(tree.to_bytes().unwrap()).unwrap()
    }

    fn lines(out: &str) -> Vec<&str> {
        out.lines().collect()
    }

    #[test]
    fn test_no_header_writes_nothing() {
        let mut tree = Tree::new();
        tree.parse(b"0 @I1@ INDI\n").unwrap();
        let mut out = Vec::new();
        let err = tree.write(&mut out).unwrap_err();
        assert!(matches!(err, EncodeError::NoHeader));
        assert!(out.is_empty());
    }

    #[test]
    fn test_charset_forced_to_utf8() {
        let out = encode(b"0 HEAD\n1 SOUR x\n0 TRLR\n");
        assert_eq!(lines(&out), vec!["0 HEAD", "1 SOUR x", "1 CHAR UTF-8", "0 TRLR"]);

        let out = encode(b"0 HEAD\n1 CHAR ANSEL\n1 SOUR x\n0 NOTE \xE2e\n");
        assert_eq!(
            lines(&out),
            vec!["0 HEAD", "1 CHAR UTF-8", "1 SOUR x", "0 NOTE \u{301}e", "0 TRLR"]
        );
    }

    #[test]
    fn test_replaced_char_is_discarded() {
        let mut tree = Tree::new();
        tree.parse(b"0 HEAD\n1 CHAR ASCII\n").unwrap();
        let head = tree.header().unwrap();
        let old = tree.first_child(head, "CHAR").unwrap();
        tree.to_bytes().unwrap();
        assert!(!tree.contains(old));
        let new = tree.first_child(head, "CHAR").unwrap();
        assert_eq!(tree.node(new).unwrap().value(), Some("UTF-8"));
        assert_eq!(tree.children(head).len(), 1);
    }

    #[test]
    fn test_trailer_written_once() {
        let out = encode(b"0 HEAD\n1 CHAR UTF-8\n0 TRLR\n");
        assert_eq!(lines(&out), vec!["0 HEAD", "1 CHAR UTF-8", "0 TRLR"]);
        let out = encode(b"0 HEAD\n1 CHAR UTF-8\n");
        assert_eq!(lines(&out), vec!["0 HEAD", "1 CHAR UTF-8", "0 TRLR"]);
    }

    #[test]
    fn test_skips_unresolved_references_and_empty_families() {
        let out = encode(
            b"0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 FAMS @F9@\n1 FAMC @F1@\n0 @F1@ FAM\n1 CHIL @I1@\n0 @F2@ FAM\n1 HUSB @I7@\n",
        );
        assert_eq!(
            lines(&out),
            vec![
                "0 HEAD",
                "1 CHAR UTF-8",
                "0 @I1@ INDI",
                "1 FAMC @F1@",
                "0 @F1@ FAM",
                "1 CHIL @I1@",
                "0 TRLR"
            ]
        );
    }

    #[test]
    fn test_wraps_200_chars_under_version_5() {
        let value: String = ('a'..='z').cycle().take(200).collect();
        let mut tree = Tree::new();
        tree.parse(b"0 HEAD\n1 GEDC\n2 VERS 5.5.1\n").unwrap();
        let note = tree.create_with_value("NOTE", value.clone()).unwrap();
        tree.children_mut(Parent::Root).push(note).unwrap();

        let out = String::from_utf8(tree.to_bytes().unwrap()).unwrap();
        let all = lines(&out);
        assert!(all.iter().all(|l| l.len() < MAX_LINE_V5));
        let conc: Vec<_> = all.iter().filter(|l| l.starts_with("1 CONC ")).collect();
        assert_eq!(conc.len(), 2);

        let mut copy = Tree::new();
        copy.parse(out.as_bytes()).unwrap();
        let n = copy.roots().get(1).unwrap();
        assert_eq!(copy.node(n).unwrap().value(), Some(value.as_str()));
    }

    #[test]
    fn test_wrap_never_splits_a_character() {
        let value: String = "\u{e9}\u{20ac}\u{1F600}x".repeat(30);
        let mut tree = Tree::new();
        tree.parse(b"0 HEAD\n").unwrap();
        let note = tree.create_with_value("NOTE", value.clone()).unwrap();
        tree.children_mut(Parent::Root).push(note).unwrap();

        let bytes = tree.to_bytes().unwrap();
        let out = String::from_utf8(bytes).unwrap();
        assert!(out.lines().all(|l| l.len() < MAX_LINE_V5));

        let mut copy = Tree::new();
        copy.parse(out.as_bytes()).unwrap();
        let n = copy.roots().get(1).unwrap();
        assert_eq!(copy.node(n).unwrap().value(), Some(value.as_str()));
    }

    #[test]
    fn test_version_7_does_not_wrap() {
        let value = "x".repeat(300);
        let mut tree = Tree::new();
        tree.parse(b"0 HEAD\n1 GEDC\n2 VERS 7.0\n").unwrap();
        let note = tree
            .create_with_value("NOTE", format!("{}\nsecond", value))
            .unwrap();
        tree.children_mut(Parent::Root).push(note).unwrap();
        let out = String::from_utf8(tree.to_bytes().unwrap()).unwrap();
        let all = lines(&out);
        assert!(all.contains(&format!("0 NOTE {}", value).as_str()));
        assert!(all.contains(&"1 CONT second"));
    }

    #[test]
    fn test_line_feeds_become_cont() {
        let mut tree = Tree::new();
        let head = NodeBuilder::new("HEAD")
            .child_value("NOTE", "a\n\nb\n")
            .build(&mut tree)
            .unwrap();
        tree.children_mut(Parent::Root).push(head).unwrap();
        let out = String::from_utf8(tree.to_bytes().unwrap()).unwrap();
        assert_eq!(
            lines(&out),
            vec!["0 HEAD", "1 NOTE a", "2 CONT", "2 CONT b", "2 CONT", "1 CHAR UTF-8", "0 TRLR"]
        );

        let mut copy = Tree::new();
        copy.parse(out.as_bytes()).unwrap();
        let note = copy.first_child(copy.header().unwrap(), "NOTE").unwrap();
        assert_eq!(copy.node(note).unwrap().value(), Some("a\n\nb\n"));
    }

    #[test]
    fn test_at_signs_survive_both_versions() {
        for vers in ["5.5.1", "7.0"] {
            let mut tree = Tree::new();
            let doc = format!("0 HEAD\n1 GEDC\n2 VERS {}\n", vers);
            tree.parse(doc.as_bytes()).unwrap();
            let value = "@start a@@b\n@next @";
            let note = tree.create_with_value("NOTE", value).unwrap();
            tree.children_mut(Parent::Root).push(note).unwrap();

            let out = tree.to_bytes().unwrap();
            let mut copy = Tree::new();
            copy.parse(&out).unwrap();
            let n = copy.roots().get(1).unwrap();
            assert_eq!(copy.node(n).unwrap().value(), Some(value), "version {}", vers);
        }
    }

    #[test]
    fn test_writer_basics() {
        let mut w = Writer::new();
        assert!(w.is_empty());
        w.write_level(12);
        w.write_byte(b' ');
        w.write_str("TAG");
        assert_eq!(w.as_bytes(), b"12 TAG");
        assert_eq!(w.len(), 6);
    }
}
