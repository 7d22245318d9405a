//! Line-format and structured-format encoding/decoding.

pub mod charset;
pub mod decode;
pub mod encode;
pub mod json;
pub mod options;
pub mod reader;

pub use charset::Charset;
pub use decode::{DecodeReport, SourceFormat};
pub use encode::{Writer, MAX_LINE_V5};
pub use json::JsonRecord;
pub use options::{
    DecodeOptions, OPTION_CHARSET, OPTION_LEADING_WHITESPACE, OPTION_NOTE_CONT_INSERT_NL,
};
pub use reader::ByteReader;
