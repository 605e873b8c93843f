//! Error types shared by the generator, the parser and both CLIs.

use thiserror::Error;

/// Every failure is fatal to the invocation that raised it.
#[derive(Debug, Error)]
pub enum HaversineError {
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error at byte {offset}: {kind}")]
    Format { offset: u64, kind: FormatError },

    #[error("Degenerate input: {what}")]
    DegenerateInput { what: &'static str },
}

/// Grammar violations found by the streaming parser.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("expected {expected:?} but found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("duplicate key {0:?}")]
    DuplicateKey(&'static str),

    #[error("missing key {0:?}")]
    MissingKey(&'static str),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unexpected character {found} after value, expected ',' or '{closer}'")]
    UnexpectedTerminator { found: String, closer: char },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("trailing data after closing brace: {found}")]
    TrailingData { found: String },
}

pub type Result<T> = std::result::Result<T, HaversineError>;

impl HaversineError {
    pub fn is_format(&self) -> bool {
        matches!(self, HaversineError::Format { .. })
    }
}

/// Renders a lookahead byte for error messages.
pub(crate) fn describe(byte: Option<u8>) -> String {
    match byte {
        Some(b) if b.is_ascii_graphic() => format!("'{}'", b as char),
        Some(b) => format!("byte 0x{b:02x}"),
        None => "end of input".to_string(),
    }
}
