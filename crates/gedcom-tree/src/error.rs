//! Error types for GEDCOM decoding, encoding, tree mutation and validation.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::model::NodeId;

/// Broad classification shared by every error in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or a violated tree invariant (bad grammar, bad nesting,
    /// banned characters, duplicate identifiers).
    Structural,
    /// API misuse: the call itself is invalid for the current tree state.
    State,
    /// Failure of the underlying reader or writer.
    Io,
}

/// The offending input reported alongside a decode failure.
///
/// Printable ASCII renders literally, everything else as a hexadecimal code
/// point, and end of stream as `EOF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    /// A byte or decoded code point.
    Char(u32),
    /// End of stream.
    Eof,
}

impl Found {
    /// Builds a `Found` from an optional byte as returned by the reader.
    pub fn byte(byte: Option<u8>) -> Self {
        match byte {
            Some(b) => Found::Char(b as u32),
            None => Found::Eof,
        }
    }
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Found::Char(c @ 0x20..=0x7E) => write!(f, "'{}'", c as u8 as char),
            Found::Char(c) => write!(f, "0x{:x}", c),
            Found::Eof => f.write_str("EOF"),
        }
    }
}

// =============================================================================
// TREE ERRORS
// =============================================================================

/// Error raised by a tree mutation or query.
///
/// A failing call never leaves the tree partially modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {node} does not exist in this tree")]
    UnknownNode { node: NodeId },

    #[error("node {node} belongs to another tree")]
    ForeignNode { node: NodeId },

    #[error("duplicate identifier \"{id}\"")]
    DuplicateIdentifier { id: String },

    #[error("invalid identifier \"{id}\"")]
    InvalidIdentifier { id: String },

    #[error("node already has identifier \"{id}\"")]
    IdentifierAlreadySet { id: String },

    #[error("node {node} is a reference and cannot hold a value")]
    ReferenceValue { node: NodeId },

    #[error("node {node} already has a payload")]
    PayloadAlreadySet { node: NodeId },

    #[error("tag is empty")]
    EmptyTag,

    #[error("index {index} out of bounds (size: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("inserting node {node} there would make it its own ancestor")]
    Cycle { node: NodeId },

    #[error("node {node} is still attached and cannot be discarded")]
    StillAttached { node: NodeId },

    #[error("node {node} has no identifier to reference")]
    NotIdentified { node: NodeId },
}

impl TreeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreeError::DuplicateIdentifier { .. }
            | TreeError::InvalidIdentifier { .. }
            | TreeError::EmptyTag => ErrorKind::Structural,
            _ => ErrorKind::State,
        }
    }
}

// =============================================================================
// DECODE ERRORS
// =============================================================================

/// Hard failure while decoding. The whole decode is aborted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid initial bytes, not a byte order mark or level (got {found})")]
    InvalidBom { found: Found },

    #[error("expected level (got {found}) (line {line})")]
    ExpectedLevel { line: u32, found: Found },

    #[error("expected space after {after} (got {found}) (line {line})")]
    ExpectedSpace {
        after: &'static str,
        line: u32,
        found: Found,
    },

    #[error("expected '@' after id (got {found}) (line {line})")]
    UnterminatedIdentifier { line: u32, found: Found },

    #[error("zero length id (line {line})")]
    EmptyIdentifier { line: u32 },

    #[error("reserved id \"VOID\" (line {line})")]
    ReservedIdentifier { line: u32 },

    #[error("expected tag (got {found}) (line {line})")]
    ExpectedTag { line: u32, found: Found },

    #[error("invalid tag character (got {found}) (line {line})")]
    InvalidTagChar { line: u32, found: Found },

    #[error("zero length tag (line {line})")]
    EmptyTag { line: u32 },

    #[error("expected '@' after idref (got {found}) (line {line})")]
    UnterminatedReference { line: u32, found: Found },

    #[error("expected value (got {found}) (line {line})")]
    ExpectedValue { line: u32, found: Found },

    #[error("invalid character in value (got {found}) (line {line})")]
    InvalidValueChar { line: u32, found: Found },

    #[error("invalid nesting from level {from} to {to} (line {line})")]
    InvalidNesting { line: u32, from: usize, to: usize },

    #[error("record at level {level} has no parent (line {line})")]
    MissingParent { line: u32, level: usize },

    #[error("invalid ANSEL codepoint 0x{byte:x} (line {line})")]
    UnmappableAnsel { line: u32, byte: u8 },

    #[error("banned character in value (got {found}) (line {line})")]
    BannedCharacter { line: u32, found: Found },

    #[error("invalid charset in version 7 \"{charset}\" (line {line})")]
    Version7Charset { line: u32, charset: &'static str },

    #[error("malformed structured document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Io(_) => ErrorKind::Io,
            DecodeError::Tree(e) => e.kind(),
            _ => ErrorKind::Structural,
        }
    }

    /// Returns the 1-based source line the failure was detected on, if known.
    pub fn line(&self) -> Option<u32> {
        match *self {
            DecodeError::ExpectedLevel { line, .. }
            | DecodeError::ExpectedSpace { line, .. }
            | DecodeError::UnterminatedIdentifier { line, .. }
            | DecodeError::EmptyIdentifier { line }
            | DecodeError::ReservedIdentifier { line }
            | DecodeError::ExpectedTag { line, .. }
            | DecodeError::InvalidTagChar { line, .. }
            | DecodeError::EmptyTag { line }
            | DecodeError::UnterminatedReference { line, .. }
            | DecodeError::ExpectedValue { line, .. }
            | DecodeError::InvalidValueChar { line, .. }
            | DecodeError::InvalidNesting { line, .. }
            | DecodeError::MissingParent { line, .. }
            | DecodeError::UnmappableAnsel { line, .. }
            | DecodeError::BannedCharacter { line, .. }
            | DecodeError::Version7Charset { line, .. } => Some(line),
            _ => None,
        }
    }
}

// =============================================================================
// ENCODE ERRORS
// =============================================================================

/// Error while writing a tree.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no header")]
    NoHeader,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("structured output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Violation of a structural tree invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("node {node} is listed under a parent it does not point back to")]
    OwnerMismatch { node: NodeId },

    #[error("node {node} is a member of more than one child list")]
    SharedNode { node: NodeId },

    #[error("identifier \"{id}\" is carried by more than one reachable node")]
    DuplicateIdentifier { id: String },

    #[error("identifier \"{id}\" of a reachable node is missing from the identifier table")]
    UnregisteredIdentifier { id: String },

    #[error("identifier table entry \"{id}\" does not point at a reachable node carrying it")]
    StaleIdentifier { id: String },
}

// =============================================================================
// WARNINGS
// =============================================================================

/// A consistency problem that was tolerated during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// 1-based source line, or 0 when the warning is not tied to a line.
    pub line: u32,
    /// What was tolerated.
    pub kind: WarningKind,
}

/// The kinds of tolerated inconsistencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A second record declared an identifier already seen; it was dropped.
    DuplicateIdentifier { id: String },
    /// The header declared a charset outside UTF-8 / ASCII / ANSEL.
    UnsupportedCharset { value: String },
    /// The `charset` option named an unknown charset.
    UnsupportedCharsetOption { value: String },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::DuplicateIdentifier { id } => {
                write!(f, "duplicate id \"{}\", keeping first", id)?
            }
            WarningKind::UnsupportedCharset { value } => {
                write!(f, "ignoring unsupported charset \"{}\"", value)?
            }
            WarningKind::UnsupportedCharsetOption { value } => {
                write!(f, "ignoring unsupported charset option \"{}\"", value)?
            }
        }
        if self.line > 0 {
            write!(f, " (line {})", self.line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_rendering() {
        assert_eq!(Found::Char('x' as u32).to_string(), "'x'");
        assert_eq!(Found::Char(0x0D).to_string(), "0xd");
        assert_eq!(Found::Char(0xA6).to_string(), "0xa6");
        assert_eq!(Found::Eof.to_string(), "EOF");
        assert_eq!(Found::byte(None), Found::Eof);
    }

    #[test]
    fn test_decode_error_message_carries_line() {
        let err = DecodeError::ExpectedLevel {
            line: 3,
            found: Found::Char('x' as u32),
        };
        assert_eq!(err.to_string(), "expected level (got 'x') (line 3)");
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_tree_error_kinds() {
        let dup = TreeError::DuplicateIdentifier { id: "I1".into() };
        assert_eq!(dup.kind(), ErrorKind::Structural);
        let oob = TreeError::IndexOutOfBounds { index: 4, len: 2 };
        assert_eq!(oob.kind(), ErrorKind::State);
        assert_eq!(
            DecodeError::from(dup).kind(),
            ErrorKind::Structural
        );
    }

    #[test]
    fn test_warning_display() {
        let w = DecodeWarning {
            line: 7,
            kind: WarningKind::DuplicateIdentifier { id: "I1".into() },
        };
        assert_eq!(w.to_string(), "duplicate id \"I1\", keeping first (line 7)");
    }
}
