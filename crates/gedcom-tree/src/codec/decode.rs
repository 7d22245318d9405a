//! Line-format decoder.
//!
//! A single forward pass over the byte stream. Each physical line is scanned
//! by a small state machine (level, identifier, tag, payload, end of line);
//! the most recent record stays *open* so that `CONC`/`CONT` lines can keep
//! extending its value. The value is only decoded and committed to the node
//! once a line that is not a continuation begins, or at end of stream.
//!
//! # Grammar
//!
//! ```text
//! LEVEL SP [ '@' ID '@' SP ] TAG [ SP ( VALUE | '@' IDREF '@' ) ] EOL
//! ```
//!
//! The detected major version starts at 5 and follows `HEAD.GEDC.VERS`;
//! the charset starts from the options and follows `HEAD.CHAR`.

use std::io::{BufRead, BufReader, Read};

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::codec::charset::{value_text, Charset};
use crate::codec::json;
use crate::codec::options::DecodeOptions;
use crate::codec::reader::ByteReader;
use crate::error::{DecodeError, DecodeWarning, Found, WarningKind};
use crate::model::{is_identifier_byte, NodeId, Parent, Tree, VOID_IDENTIFIER};

/// Which container format the input turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// The level-prefixed line format.
    Lines,
    /// The structured list-of-objects document.
    Json,
}

/// Summary of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub format: SourceFormat,
    /// Major version in effect at end of stream.
    pub version: u32,
    /// Charset in effect at end of stream.
    pub charset: Charset,
    /// Number of top-level records.
    pub records: usize,
    /// Tolerated inconsistencies, in input order.
    pub warnings: Vec<DecodeWarning>,
}

const DEFAULT_VERSION: u32 = 5;

impl Tree {
    /// Replaces the content of this tree with the records read from `reader`.
    ///
    /// Options come from the tree's option map. On failure the tree is left
    /// empty.
    pub fn read<R: Read>(&mut self, reader: R) -> Result<DecodeReport, DecodeError> {
        let (options, warning) = DecodeOptions::from_map(self.options());
        if let Some(w) = &warning {
            warn!(line = w.line, "{}", w);
        }
        let mut report = self.read_with(reader, options)?;
        if let Some(w) = warning {
            report.warnings.insert(0, w);
        }
        Ok(report)
    }

    /// Like [`read`](Tree::read) with explicit options, ignoring the option map.
    pub fn read_with<R: Read>(
        &mut self,
        reader: R,
        options: DecodeOptions,
    ) -> Result<DecodeReport, DecodeError> {
        self.clear();
        let result = decode_into(self, BufReader::new(reader), options);
        if result.is_err() {
            self.clear();
        }
        result
    }

    /// Reads a complete document held in memory.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<DecodeReport, DecodeError> {
        self.read(bytes)
    }
}

fn decode_into<R: BufRead>(
    tree: &mut Tree,
    input: R,
    options: DecodeOptions,
) -> Result<DecodeReport, DecodeError> {
    let mut input = ByteReader::new(input);
    if input.eat(0xEF)? {
        for expected in [0xBB, 0xBF] {
            let b = input.next_byte()?;
            if b != Some(expected) {
                return Err(DecodeError::InvalidBom {
                    found: Found::byte(b),
                });
            }
        }
    }

    if input.peek()? == Some(b'[') {
        debug!("decoding structured document");
        let mut bytes = Vec::new();
        input.read_rest(&mut bytes)?;
        let warnings = json::read_records(tree, &bytes)?;
        let report = DecodeReport {
            format: SourceFormat::Json,
            version: tree.major_version(),
            charset: Charset::Utf8,
            records: tree.roots().len(),
            warnings,
        };
        debug!(records = report.records, "decode finished");
        return Ok(report);
    }

    debug!(
        charset = %options.charset,
        leading_whitespace = options.leading_whitespace,
        note_newline = options.note_newline,
        "decoding line format"
    );
    let decoder = LineDecoder::new(tree, input, options);
    let report = decoder.run()?;
    debug!(
        records = report.records,
        version = report.version,
        warnings = report.warnings.len(),
        "decode finished"
    );
    Ok(report)
}

// =============================================================================
// SCANNING
// =============================================================================

/// Position of the scanner inside one physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    AwaitLevel,
    AwaitIdentifier,
    AwaitTag,
    AwaitPayload,
    AwaitEol,
    Complete,
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    /// `CONT`: a line feed, then the payload.
    Cont,
    /// `CONC`: the payload, no separator.
    Conc,
}

#[derive(Debug, Default)]
enum RawPayload {
    #[default]
    None,
    Text(Vec<u8>),
    Reference(String),
}

/// One scanned physical line.
#[derive(Debug, Default)]
struct Line {
    number: u32,
    level: usize,
    identifier: Option<String>,
    tag: String,
    payload: RawPayload,
    continuation: Option<Continuation>,
}

/// The last record created, whose value may still grow.
#[derive(Debug)]
struct OpenRecord {
    node: NodeId,
    line: u32,
    is_reference: bool,
    value: Vec<u8>,
}

#[inline]
fn is_value_byte(b: u8) -> bool {
    b == b'\t' || b >= 0x20
}

struct LineDecoder<'t, R> {
    tree: &'t mut Tree,
    input: ByteReader<R>,
    options: DecodeOptions,
    charset: Charset,
    version: u32,
    line: u32,
    /// `path[i]` is the most recent record at level `i`.
    path: Vec<NodeId>,
    open: Option<OpenRecord>,
    note_newline: bool,
    seen: FxHashSet<String>,
    warnings: Vec<DecodeWarning>,
    scratch: Vec<u8>,
}

impl<'t, R: BufRead> LineDecoder<'t, R> {
    fn new(tree: &'t mut Tree, input: ByteReader<R>, options: DecodeOptions) -> Self {
        Self {
            tree,
            input,
            charset: options.charset,
            options,
            version: DEFAULT_VERSION,
            line: 1,
            path: Vec::new(),
            open: None,
            note_newline: false,
            seen: FxHashSet::default(),
            warnings: Vec::new(),
            scratch: Vec::new(),
        }
    }

    fn run(mut self) -> Result<DecodeReport, DecodeError> {
        while let Some(line) = self.scan_line()? {
            self.apply(line)?;
        }
        self.commit()?;
        Ok(DecodeReport {
            format: SourceFormat::Lines,
            version: self.version,
            charset: self.charset,
            records: self.tree.roots().len(),
            warnings: self.warnings,
        })
    }

    /// Scans one physical line, `None` at end of stream.
    fn scan_line(&mut self) -> Result<Option<Line>, DecodeError> {
        let mut line = Line::default();
        let mut state = Scan::AwaitLevel;
        loop {
            state = match state {
                Scan::AwaitLevel => self.scan_level(&mut line)?,
                Scan::AwaitIdentifier => self.scan_identifier(&mut line)?,
                Scan::AwaitTag => self.scan_tag(&mut line)?,
                Scan::AwaitPayload => self.scan_payload(&mut line)?,
                Scan::AwaitEol => self.scan_eol()?,
                Scan::Complete => return Ok(Some(line)),
                Scan::EndOfStream => return Ok(None),
            };
        }
    }

    fn scan_level(&mut self, line: &mut Line) -> Result<Scan, DecodeError> {
        if self.options.leading_whitespace || self.version < 7 {
            loop {
                while self.input.eat(b' ')? {}
                match self.input.peek()? {
                    Some(b'\r' | b'\n') => self.end_of_line()?,
                    None => return Ok(Scan::EndOfStream),
                    Some(_) => break,
                }
            }
        }
        match self.input.peek()? {
            None => return Ok(Scan::EndOfStream),
            Some(b) if b.is_ascii_digit() => {}
            other => {
                return Err(DecodeError::ExpectedLevel {
                    line: self.line,
                    found: Found::byte(other),
                });
            }
        }
        line.number = self.line;
        self.scratch.clear();
        self.input.take_while(&mut self.scratch, |b| b.is_ascii_digit())?;
        line.level = self.scratch.iter().fold(0usize, |acc, &d| {
            acc.saturating_mul(10).saturating_add((d - b'0') as usize)
        });
        self.expect_space("level")?;
        Ok(Scan::AwaitIdentifier)
    }

    fn scan_identifier(&mut self, line: &mut Line) -> Result<Scan, DecodeError> {
        if !self.input.eat(b'@')? {
            return Ok(Scan::AwaitTag);
        }
        let id = self.take_identifier()?;
        if !self.input.eat(b'@')? {
            return Err(DecodeError::UnterminatedIdentifier {
                line: self.line,
                found: Found::byte(self.input.peek()?),
            });
        }
        if id.is_empty() {
            return Err(DecodeError::EmptyIdentifier { line: self.line });
        }
        if id == VOID_IDENTIFIER {
            return Err(DecodeError::ReservedIdentifier { line: self.line });
        }
        if self.seen.insert(id.clone()) {
            line.identifier = Some(id);
        } else {
            self.warning(self.line, WarningKind::DuplicateIdentifier { id });
        }
        self.expect_space("id")?;
        Ok(Scan::AwaitTag)
    }

    fn scan_tag(&mut self, line: &mut Line) -> Result<Scan, DecodeError> {
        match self.input.peek()? {
            Some(b) if b == b'_' || b.is_ascii_uppercase() => {}
            other => {
                return Err(DecodeError::ExpectedTag {
                    line: self.line,
                    found: Found::byte(other),
                });
            }
        }
        line.tag = self.take_identifier()?;
        match self.input.peek()? {
            Some(b' ') => self.input.bump()?,
            Some(b'\r' | b'\n') | None => {}
            other => {
                return Err(DecodeError::InvalidTagChar {
                    line: self.line,
                    found: Found::byte(other),
                });
            }
        }
        if line.tag == "_" {
            return Err(DecodeError::EmptyTag { line: self.line });
        }
        line.continuation = self.continuation(line);
        Ok(Scan::AwaitPayload)
    }

    fn scan_payload(&mut self, line: &mut Line) -> Result<Scan, DecodeError> {
        let mut text = Vec::new();
        match self.input.peek()? {
            Some(b'\r' | b'\n') | None => return Ok(Scan::AwaitEol),
            Some(b'@') => {
                self.input.bump()?;
                if line.continuation.is_some() {
                    // Continuation payloads are text; version 7 escapes a leading '@'
                    text.push(b'@');
                    if self.version >= 7 {
                        self.input.eat(b'@')?;
                    }
                } else if self.input.eat(b'@')? {
                    text.push(b'@');
                } else {
                    let target = self.take_identifier()?;
                    if !self.input.eat(b'@')? {
                        return Err(DecodeError::UnterminatedReference {
                            line: self.line,
                            found: Found::byte(self.input.peek()?),
                        });
                    }
                    line.payload = RawPayload::Reference(target);
                    return Ok(Scan::AwaitEol);
                }
            }
            Some(b) if is_value_byte(b) => {}
            other => {
                return Err(DecodeError::ExpectedValue {
                    line: self.line,
                    found: Found::byte(other),
                });
            }
        }
        self.input.take_while(&mut text, is_value_byte)?;
        line.payload = RawPayload::Text(text);
        Ok(Scan::AwaitEol)
    }

    fn scan_eol(&mut self) -> Result<Scan, DecodeError> {
        match self.input.peek()? {
            Some(b'\r' | b'\n') => self.end_of_line()?,
            None => {}
            other => {
                return Err(DecodeError::InvalidValueChar {
                    line: self.line,
                    found: Found::byte(other),
                });
            }
        }
        Ok(Scan::Complete)
    }

    /// Consumes CR, LF or CRLF.
    fn end_of_line(&mut self) -> Result<(), DecodeError> {
        if self.input.eat(b'\r')? {
            self.input.eat(b'\n')?;
        } else {
            self.input.eat(b'\n')?;
        }
        self.line += 1;
        Ok(())
    }

    fn expect_space(&mut self, after: &'static str) -> Result<(), DecodeError> {
        if self.input.eat(b' ')? {
            return Ok(());
        }
        Err(DecodeError::ExpectedSpace {
            after,
            line: self.line,
            found: Found::byte(self.input.peek()?),
        })
    }

    fn take_identifier(&mut self) -> Result<String, DecodeError> {
        self.scratch.clear();
        self.input.take_while(&mut self.scratch, is_identifier_byte)?;
        Ok(String::from_utf8_lossy(&self.scratch).into_owned())
    }

    /// Whether `line` extends the open record.
    fn continuation(&self, line: &Line) -> Option<Continuation> {
        let open = self.open.as_ref()?;
        if open.is_reference || line.level != self.path.len() {
            return None;
        }
        match line.tag.as_str() {
            "CONT" => Some(Continuation::Cont),
            "CONC" if self.version < 7 => Some(Continuation::Conc),
            _ => None,
        }
    }

    // =========================================================================
    // Tree construction
    // =========================================================================

    fn apply(&mut self, line: Line) -> Result<(), DecodeError> {
        if let Some(kind) = line.continuation {
            if let Some(open) = self.open.as_mut() {
                if kind == Continuation::Cont || self.note_newline {
                    open.value.push(b'\n');
                }
                if let RawPayload::Text(text) = line.payload {
                    open.value.extend_from_slice(&text);
                }
            }
            self.note_newline = false;
            return Ok(());
        }

        self.commit()?;
        self.note_newline = self.options.note_newline && line.tag == "NOTE";

        let parent = match line.level {
            0 => Parent::Root,
            level => match self.path.get(level - 1) {
                Some(&p) => Parent::Node(p),
                None if self.path.is_empty() => {
                    return Err(DecodeError::MissingParent {
                        line: line.number,
                        level,
                    });
                }
                None => {
                    return Err(DecodeError::InvalidNesting {
                        line: line.number,
                        from: self.path.len() - 1,
                        to: level,
                    });
                }
            },
        };

        let node = self.tree.create(&line.tag)?;
        self.tree.set_line(node, line.number)?;
        if let Some(identifier) = line.identifier.as_deref() {
            self.tree.set_identifier(node, Some(identifier))?;
        }
        let (is_reference, value) = match line.payload {
            RawPayload::None => (false, Vec::new()),
            RawPayload::Text(text) => (false, text),
            RawPayload::Reference(target) => {
                self.tree.set_reference(node, &target)?;
                (true, Vec::new())
            }
        };
        self.tree.children_mut(parent).push(node)?;
        self.path.truncate(line.level);
        self.path.push(node);

        if !is_reference {
            self.header_switch(&line.tag, line.level, line.number, &value)?;
        }
        self.open = Some(OpenRecord {
            node,
            line: line.number,
            is_reference,
            value,
        });
        Ok(())
    }

    /// Applies `HEAD.CHAR` and `HEAD.GEDC.VERS` as soon as they are seen.
    fn header_switch(
        &mut self,
        tag: &str,
        level: usize,
        number: u32,
        raw: &[u8],
    ) -> Result<(), DecodeError> {
        let is_header_path = |decoder: &Self, tags: &[&str]| {
            tags.iter()
                .zip(&decoder.path)
                .all(|(expected, &id)| decoder.tree.node(id).is_some_and(|n| n.tag() == *expected))
        };
        if tag == "CHAR" && level == 1 && is_header_path(self, &["HEAD"]) {
            let value = value_text(raw, self.charset, self.version, number)?;
            match Charset::from_label(&value) {
                Some(charset) => {
                    trace!(line = number, from = %self.charset, to = %charset, "charset switch");
                    self.charset = charset;
                }
                None => self.warning(number, WarningKind::UnsupportedCharset { value }),
            }
            if self.version >= 7 && self.charset != Charset::Utf8 {
                return Err(DecodeError::Version7Charset {
                    line: number,
                    charset: self.charset.label(),
                });
            }
        } else if tag == "VERS" && level == 2 && is_header_path(self, &["HEAD", "GEDC"]) {
            let value = value_text(raw, self.charset, self.version, number)?;
            if value.starts_with("7.") {
                trace!(line = number, version = %value, "version 7 grammar");
                self.version = 7;
                if self.charset != Charset::Utf8 {
                    return Err(DecodeError::Version7Charset {
                        line: number,
                        charset: self.charset.label(),
                    });
                }
            } else if value.starts_with("5.") {
                trace!(line = number, version = %value, "version 5 grammar");
                self.version = 5;
            }
        }
        Ok(())
    }

    /// Decodes and stores the open record's accumulated value.
    fn commit(&mut self) -> Result<(), DecodeError> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        if open.is_reference {
            return Ok(());
        }
        // A valueless line still commits its empty value, so it can never
        // become a reference afterwards
        let text = value_text(&open.value, self.charset, self.version, open.line)?;
        self.tree.set_value(open.node, text)?;
        Ok(())
    }

    fn warning(&mut self, line: u32, kind: WarningKind) {
        let w = DecodeWarning { line, kind };
        warn!(line = w.line, "{}", w);
        self.warnings.push(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::options::{OPTION_CHARSET, OPTION_LEADING_WHITESPACE};
    use crate::error::{ErrorKind, TreeError};
    use crate::model::Payload;

    fn decode(input: &[u8]) -> (Tree, DecodeReport) {
        let mut tree = Tree::new();
        let report = tree.parse(input).unwrap();
        (tree, report)
    }

    fn decode_err(input: &[u8]) -> DecodeError {
        Tree::new().parse(input).unwrap_err()
    }

    fn value_of(tree: &Tree, id: NodeId) -> &str {
        tree.node(id).unwrap().value().unwrap()
    }

    #[test]
    fn test_basic_records() {
        let (tree, report) = decode(
            b"0 HEAD\n1 GEDC\n2 VERS 5.5.1\n0 @I1@ INDI\n1 NAME John /Smith/\n0 @F1@ FAM\n1 HUSB @I1@\n0 TRLR\n",
        );
        assert_eq!(report.format, SourceFormat::Lines);
        assert_eq!(report.records, 4);
        assert_eq!(report.version, 5);
        assert!(report.warnings.is_empty());

        let indi = tree.resolve("I1").unwrap();
        let name = tree.first_child(indi, "NAME").unwrap();
        assert_eq!(value_of(&tree, name), "John /Smith/");
        assert_eq!(tree.node(name).unwrap().line(), 5);

        let fam = tree.resolve("F1").unwrap();
        let husb = tree.first_child(fam, "HUSB").unwrap();
        assert_eq!(tree.node(husb).unwrap().reference(), Some("I1"));
        assert_eq!(tree.dereference(husb), Some(indi));
    }

    #[test]
    fn test_conc_joins_without_separator() {
        let (tree, _) = decode(b"0 HEAD\n1 NOTE hello\n2 CONC  world\n");
        let note = tree.first_child(tree.header().unwrap(), "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "hello world");
        assert!(tree.children(note).is_empty());
    }

    #[test]
    fn test_cont_joins_with_line_feed() {
        let (tree, _) = decode(b"0 HEAD\n1 NOTE hello\n2 CONT world\n2 CONT\n2 CONC !\n");
        let note = tree.first_child(tree.header().unwrap(), "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "hello\nworld\n!");
    }

    #[test]
    fn test_continuation_only_one_level_deeper() {
        let (tree, _) = decode(b"0 HEAD\n1 NOTE a\n2 DATE x\n3 CONC y\n1 CONT z\n");
        let head = tree.header().unwrap();
        let note = tree.first_child(head, "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "a");
        let date = tree.first_child(note, "DATE").unwrap();
        assert_eq!(value_of(&tree, date), "xy");
        let cont = tree.first_child(head, "CONT").unwrap();
        assert_eq!(value_of(&tree, cont), "z");
    }

    #[test]
    fn test_reference_never_continues() {
        let (tree, _) = decode(b"0 @N1@ NOTE x\n0 FAM\n1 NOTE @N1@\n2 CONT more\n");
        let fam = tree.roots().get(1).unwrap();
        let note = tree.first_child(fam, "NOTE").unwrap();
        assert_eq!(tree.node(note).unwrap().reference(), Some("N1"));
        let cont = tree.first_child(note, "CONT").unwrap();
        assert_eq!(value_of(&tree, cont), "more");
    }

    #[test]
    fn test_version_7_has_no_conc() {
        let (tree, report) = decode(b"0 HEAD\n1 GEDC\n2 VERS 7.0\n1 NOTE a\n2 CONC b\n3 CONT c\n");
        assert_eq!(report.version, 7);
        let note = tree.first_child(tree.header().unwrap(), "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "a");
        let conc = tree.first_child(note, "CONC").unwrap();
        assert_eq!(value_of(&tree, conc), "b\nc");
    }

    #[test]
    fn test_duplicate_identifier_demoted() {
        let (tree, report) = decode(b"0 HEAD\n0 @I1@ INDI\n1 NAME A\n0 @I1@ INDI\n1 NAME B\n");
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.warnings[0],
            DecodeWarning {
                line: 4,
                kind: WarningKind::DuplicateIdentifier { id: "I1".into() }
            }
        );
        let first = tree.roots().get(1).unwrap();
        let second = tree.roots().get(2).unwrap();
        assert_eq!(tree.resolve("I1"), Some(first));
        assert_eq!(tree.node(second).unwrap().identifier(), None);
    }

    #[test]
    fn test_identifier_failures() {
        let err = decode_err(b"0 @VOID@ INDI\n");
        assert!(matches!(err, DecodeError::ReservedIdentifier { line: 1 }));
        let err = decode_err(b"0 @@ INDI\n");
        assert!(matches!(err, DecodeError::EmptyIdentifier { line: 1 }));
        let err = decode_err(b"0 @i1@ INDI\n");
        assert_eq!(err.to_string(), "expected '@' after id (got 'i') (line 1)");
        let err = decode_err(b"0 @I1@INDI\n");
        assert_eq!(err.to_string(), "expected space after id (got 'I') (line 1)");
    }

    #[test]
    fn test_grammar_failures() {
        assert_eq!(
            decode_err(b"0 HEAD\nx TRLR\n").to_string(),
            "expected level (got 'x') (line 2)"
        );
        assert_eq!(
            decode_err(b"0HEAD\n").to_string(),
            "expected space after level (got 'H') (line 1)"
        );
        assert_eq!(
            decode_err(b"0 head\n").to_string(),
            "expected tag (got 'h') (line 1)"
        );
        assert_eq!(
            decode_err(b"0 HEAd\n").to_string(),
            "invalid tag character (got 'd') (line 1)"
        );
        assert!(matches!(
            decode_err(b"0 _\n"),
            DecodeError::EmptyTag { line: 1 }
        ));
        assert_eq!(
            decode_err(b"0 HEAD\n1 NOTE a\x01b\n").to_string(),
            "invalid character in value (got 0x1) (line 2)"
        );
        assert_eq!(
            decode_err(b"0 HEAD\n1 NOTE \x02\n").to_string(),
            "expected value (got 0x2) (line 2)"
        );
        assert_eq!(
            decode_err(b"0 FAM\n1 HUSB @I1\n").to_string(),
            "expected '@' after idref (got 0xa) (line 2)"
        );
    }

    #[test]
    fn test_nesting_failures() {
        let err = decode_err(b"0 HEAD\n2 DATE x\n");
        assert!(matches!(
            err,
            DecodeError::InvalidNesting {
                line: 2,
                from: 0,
                to: 2
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = decode_err(b"1 NAME x\n");
        assert!(matches!(err, DecodeError::MissingParent { line: 1, level: 1 }));
    }

    #[test]
    fn test_level_walks_back_up() {
        let (tree, _) = decode(b"0 INDI\n1 BIRT\n2 DATE 1900\n3 _X y\n1 DEAT\n2 PLAC z\n");
        let indi = tree.roots().get(0).unwrap();
        assert_eq!(tree.children(indi).len(), 2);
        let deat = tree.first_child(indi, "DEAT").unwrap();
        let plac = tree.first_child(deat, "PLAC").unwrap();
        assert_eq!(tree.level(plac).unwrap(), 2);
    }

    #[test]
    fn test_payload_escapes() {
        let (tree, _) = decode(b"0 NOTE @@home\n0 NOTE a@@b\n0 NOTE mail@@@@x\n");
        let values: Vec<_> = tree
            .roots()
            .iter()
            .map(|id| value_of(&tree, id).to_string())
            .collect();
        assert_eq!(values, vec!["@home", "a@b", "mail@@x"]);
    }

    #[test]
    fn test_version_7_keeps_double_at() {
        let (tree, _) = decode(b"0 HEAD\n1 GEDC\n2 VERS 7.0\n0 NOTE @@home a@@b\n1 CONT @@x\n");
        let note = tree.roots().get(1).unwrap();
        assert_eq!(value_of(&tree, note), "@home a@@b\n@x");
    }

    #[test]
    fn test_whitespace_tolerance() {
        let (tree, _) = decode(b"0 HEAD\n\n   1 NOTE x\r\n\r\n0 TRLR");
        assert_eq!(tree.roots().len(), 2);

        let strict = b"0 HEAD\n1 GEDC\n2 VERS 7.0\n\n0 TRLR\n";
        let err = decode_err(strict);
        assert_eq!(err.to_string(), "expected level (got 0xa) (line 4)");

        let mut tree = Tree::new();
        tree.options_mut()
            .insert(OPTION_LEADING_WHITESPACE.to_string(), String::new());
        tree.parse(strict).unwrap();
        assert_eq!(tree.roots().len(), 2);
    }

    #[test]
    fn test_ansel_option_and_failure() {
        let mut tree = Tree::new();
        tree.options_mut()
            .insert(OPTION_CHARSET.to_string(), "ANSEL".to_string());
        let report = tree.parse(b"0 NOTE \xA1od\xB6\n").unwrap();
        assert_eq!(report.charset, Charset::Ansel);
        let note = tree.roots().get(0).unwrap();
        assert_eq!(value_of(&tree, note), "\u{141}od\u{153}");

        let err = tree.parse(b"0 HEAD\n1 NOTE ok\n0 NOTE bad \xAF\n").unwrap_err();
        assert!(matches!(err, DecodeError::UnmappableAnsel { line: 3, byte: 0xAF }));
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn test_header_charset_switch() {
        let (tree, report) = decode(b"0 HEAD\n1 CHAR ANSEL\n0 INDI\n1 NAME \xE2e\n");
        assert_eq!(report.charset, Charset::Ansel);
        let indi = tree.roots().get(1).unwrap();
        let name = tree.first_child(indi, "NAME").unwrap();
        assert_eq!(value_of(&tree, name), "\u{301}e");
    }

    #[test]
    fn test_unsupported_charset_warns() {
        let (_, report) = decode(b"0 HEAD\n1 CHAR IBMPC\n0 TRLR\n");
        assert_eq!(report.charset, Charset::Utf8);
        assert_eq!(
            report.warnings,
            vec![DecodeWarning {
                line: 2,
                kind: WarningKind::UnsupportedCharset {
                    value: "IBMPC".into()
                }
            }]
        );
    }

    #[test]
    fn test_version_7_requires_utf8() {
        let err = decode_err(b"0 HEAD\n1 GEDC\n2 VERS 7.0\n1 CHAR ANSEL\n");
        assert!(matches!(
            err,
            DecodeError::Version7Charset {
                line: 4,
                charset: "ANSEL"
            }
        ));
        let err = decode_err(b"0 HEAD\n1 CHAR ASCII\n1 GEDC\n2 VERS 7.0.1\n");
        assert!(matches!(err, DecodeError::Version7Charset { line: 4, .. }));
    }

    #[test]
    fn test_banned_characters() {
        let err = decode_err("0 HEAD\n1 NOTE a\u{FEFF}b\n".as_bytes());
        assert!(matches!(err, DecodeError::BannedCharacter { line: 2, .. }));
        // C1 is tolerated before version 7
        decode("0 HEAD\n1 NOTE a\u{85}b\n".as_bytes());
        let err = decode_err("0 HEAD\n1 GEDC\n2 VERS 7.0\n1 NOTE a\u{85}b\n".as_bytes());
        assert_eq!(
            err.to_string(),
            "banned character in value (got 0x85) (line 4)"
        );
    }

    #[test]
    fn test_byte_order_mark() {
        let (tree, _) = decode(b"\xEF\xBB\xBF0 HEAD\n0 TRLR\n");
        assert_eq!(tree.roots().len(), 2);
        let err = decode_err(b"\xEF\xBB0 HEAD\n");
        assert_eq!(
            err.to_string(),
            "invalid initial bytes, not a byte order mark or level (got '0')"
        );
    }

    #[test]
    fn test_note_newline_shim() {
        let input = b"0 HEAD\n1 NOTE a\n2 CONC b\n2 CONC c\n1 DEST d\n2 CONC e\n";
        let mut tree = Tree::new();
        let options = DecodeOptions::new().with_note_newline(true);
        tree.read_with(&input[..], options).unwrap();
        let head = tree.header().unwrap();
        let note = tree.first_child(head, "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "a\nbc");
        let dest = tree.first_child(head, "DEST").unwrap();
        assert_eq!(value_of(&tree, dest), "de");
    }

    #[test]
    fn test_note_newline_shim_ends_with_its_record() {
        // A NOTE without continuations leaves the next record's CONC alone
        let input = b"0 HEAD\n1 NOTE a\n1 DEST d\n2 CONC e\n";
        let mut tree = Tree::new();
        let options = DecodeOptions::new().with_note_newline(true);
        tree.read_with(&input[..], options).unwrap();
        let head = tree.header().unwrap();
        let note = tree.first_child(head, "NOTE").unwrap();
        assert_eq!(value_of(&tree, note), "a");
        let dest = tree.first_child(head, "DEST").unwrap();
        assert_eq!(value_of(&tree, dest), "de");
    }

    #[test]
    fn test_valueless_line_commits_empty_value() {
        let (mut tree, _) = decode(b"0 HEAD\n0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n");
        let indi = tree.resolve("I1").unwrap();
        let birt = tree.first_child(indi, "BIRT").unwrap();
        assert_eq!(tree.node(birt).unwrap().payload(), &Payload::Value(String::new()));
        assert_eq!(
            tree.set_reference(birt, "I1"),
            Err(TreeError::PayloadAlreadySet { node: birt })
        );
        tree.set_value(birt, "Y").unwrap();
    }

    #[test]
    fn test_read_replaces_content() {
        let mut tree = Tree::new();
        tree.parse(b"0 @I1@ INDI\n").unwrap();
        let old = tree.roots().get(0).unwrap();
        tree.parse(b"0 @I2@ INDI\n").unwrap();
        assert!(!tree.contains(old));
        assert_eq!(tree.resolve("I1"), None);
        assert!(tree.resolve("I2").is_some());
        assert_eq!(tree.identifier_count(), 1);
    }

    #[test]
    fn test_decoded_tree_invariants() {
        let (tree, _) = decode(
            b"0 HEAD\n1 SOUR x\n2 VERS 1\n0 @I1@ INDI\n1 BIRT\n2 DATE 1 JAN 1900\n2 PLAC y\n1 DEAT Y\n",
        );
        for (id, node) in tree.descendants(Parent::Root) {
            let expected = match node.owner() {
                Some(owner) => tree.level(owner).unwrap() + 1,
                None => 0,
            };
            assert_eq!(tree.level(id).unwrap(), expected);
        }
    }
}
