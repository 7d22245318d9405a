//! Text encodings accepted by the line decoder.
//!
//! UTF-8 is decoded lossily, ASCII is read as ISO-8859-1 so stray high bytes
//! survive, and ANSEL goes through a fixed translation table for bytes
//! `0xA1..=0xFF`.

use std::fmt;

use crate::error::{DecodeError, Found};

/// An input character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Ascii,
    Ansel,
}

impl Charset {
    /// Parses a charset label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Charset> {
        [Charset::Utf8, Charset::Ascii, Charset::Ansel]
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label))
    }

    /// The canonical header label.
    pub fn label(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Ascii => "ASCII",
            Charset::Ansel => "ANSEL",
        }
    }

    /// Decodes raw value bytes into text.
    pub fn decode(&self, bytes: &[u8], line: u32) -> Result<String, DecodeError> {
        match self {
            Charset::Utf8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Charset::Ascii => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Ansel => bytes
                .iter()
                .map(|&byte| ansel_char(byte).ok_or(DecodeError::UnmappableAnsel { line, byte }))
                .collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// ANSEL
// =============================================================================

/// Code points for ANSEL bytes `0xA1..=0xFF`; zero marks an unmapped byte.
const ANSEL_HIGH: [u16; 95] = [
    // 0xA1
    0x0141, 0x00D8, 0x0110, 0x00DE, 0x00C6, 0x0152, 0x02B9, 0x00B7, //
    0x266D, 0x00AE, 0x00B1, 0x01A0, 0x01AF, 0x02BC, 0x0000, //
    // 0xB0
    0x02BB, 0x0142, 0x00F8, 0x0111, 0x00FE, 0x00E6, 0x0153, 0x02BA, //
    0x0131, 0x00A3, 0x00F0, 0x0000, 0x01A1, 0x01B0, 0x25A1, 0x25A0, //
    // 0xC0
    0x00B0, 0x2113, 0x2117, 0x00A9, 0x266F, 0x00BF, 0x00A1, 0x0000, //
    0x20AC, 0x0000, 0x0000, 0x0000, 0x0000, 0x0065, 0x006F, 0x00DF, //
    // 0xD0
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, //
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, //
    // 0xE0
    0x0309, 0x0300, 0x0301, 0x0302, 0x0303, 0x0304, 0x0306, 0x0307, //
    0x0308, 0x030C, 0x030A, 0xFE20, 0xFE21, 0x0315, 0x030B, 0x0310, //
    // 0xF0
    0x0327, 0x0328, 0x0323, 0x0324, 0x0325, 0x0333, 0x0332, 0x0326, //
    0x031C, 0x032E, 0xFE22, 0xFE23, 0x0338, 0x0000, 0x0313, 0x0000, //
];

/// Maps one ANSEL byte to its character, `None` if the byte is unmapped.
pub fn ansel_char(byte: u8) -> Option<char> {
    match byte {
        0x00..=0x7F => Some(byte as char),
        0x80..=0xA0 => None,
        _ => match ANSEL_HIGH[(byte - 0xA1) as usize] {
            0 => None,
            cp => char::from_u32(cp as u32),
        },
    }
}

// =============================================================================
// VALUE TEXT
// =============================================================================

/// Returns true for characters never allowed in decoded values.
///
/// Every version bans C0 controls other than TAB and LF, and the byte order
/// mark. Version 7 also bans C1 controls.
pub fn is_banned(c: char, major_version: u32) -> bool {
    let cp = c as u32;
    (cp < 0x20 && c != '\t' && c != '\n')
        || c == '\u{FEFF}'
        || (major_version >= 7 && (0x7F..=0x9F).contains(&cp))
}

/// Turns the accumulated bytes of one logical value into its final text.
///
/// Decodes, rejects banned characters and, before version 7, collapses
/// every `@@` to `@`.
pub fn value_text(
    bytes: &[u8],
    charset: Charset,
    major_version: u32,
    line: u32,
) -> Result<String, DecodeError> {
    let text = charset.decode(bytes, line)?;
    if let Some(c) = text.chars().find(|&c| is_banned(c, major_version)) {
        return Err(DecodeError::BannedCharacter {
            line,
            found: Found::Char(c as u32),
        });
    }
    if major_version < 7 && text.contains("@@") {
        return Ok(text.replace("@@", "@"));
    }
    Ok(text)
}
