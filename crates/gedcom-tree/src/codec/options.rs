//! Decoder configuration.
//!
//! The tree carries a string-keyed option map; [`DecodeOptions`] is its
//! typed form, built once at the start of every read.

use std::collections::BTreeMap;

use crate::codec::charset::Charset;
use crate::error::{DecodeWarning, WarningKind};

/// Selects the default charset: `UTF-8`, `ASCII` or `ANSEL`.
pub const OPTION_CHARSET: &str = "charset";

/// When present, leading spaces and blank lines are tolerated in any version.
pub const OPTION_LEADING_WHITESPACE: &str = "leading-whitespace";

/// When present, the first `CONC` following a `NOTE` line starts a new line.
pub const OPTION_NOTE_CONT_INSERT_NL: &str = "note-cont-insert-nl";

/// Options for decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Charset used until the header declares one.
    pub charset: Charset,
    /// Tolerate leading whitespace and blank lines even in version 7 input.
    pub leading_whitespace: bool,
    /// Insert a line feed before the first `CONC` of a `NOTE` value.
    pub note_newline: bool,
}

impl DecodeOptions {
    /// Creates default options: UTF-8, strict whitespace, no note shim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the option map. Unknown charset values are reported and ignored.
    pub fn from_map(map: &BTreeMap<String, String>) -> (Self, Option<DecodeWarning>) {
        let mut options = Self::new();
        let mut warning = None;
        if let Some(label) = map.get(OPTION_CHARSET) {
            match Charset::from_label(label) {
                Some(charset) => options.charset = charset,
                None => {
                    warning = Some(DecodeWarning {
                        line: 0,
                        kind: WarningKind::UnsupportedCharsetOption {
                            value: label.clone(),
                        },
                    })
                }
            }
        }
        options.leading_whitespace = map.contains_key(OPTION_LEADING_WHITESPACE);
        options.note_newline = map.contains_key(OPTION_NOTE_CONT_INSERT_NL);
        (options, warning)
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_leading_whitespace(mut self, enabled: bool) -> Self {
        self.leading_whitespace = enabled;
        self
    }

    pub fn with_note_newline(mut self, enabled: bool) -> Self {
        self.note_newline = enabled;
        self
    }
}
