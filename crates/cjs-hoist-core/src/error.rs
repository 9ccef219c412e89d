use std::ops::Range;
use thiserror::Error;

/// Boxed error produced by a caller-supplied parser.
pub type BoxedParseError = Box<dyn std::error::Error + Send + Sync>;

/// Error codes surfaced in machine-readable output.
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const EDIT_CONFLICT: &str = "EDIT_CONFLICT";
    pub const SOURCE_MAP_ERROR: &str = "SOURCE_MAP_ERROR";
}

/// Errors returned by [`crate::transform`].
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to parse input: {source}")]
    Parse {
        #[source]
        source: BoxedParseError,
    },

    /// Two edits claimed overlapping text. This is a bug in the rewrite
    /// bookkeeping, never a property of the input.
    #[error("Conflicting edits at {first:?} and {second:?}")]
    EditConflict {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("Failed to serialize source map: {0}")]
    SourceMap(#[from] serde_json::Error),
}

impl TransformError {
    /// Wrap a parser failure.
    #[must_use]
    pub fn parse(source: impl Into<BoxedParseError>) -> Self {
        Self::Parse {
            source: source.into(),
        }
    }

    /// Stable error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => codes::PARSE_ERROR,
            Self::EditConflict { .. } => codes::EDIT_CONFLICT,
            Self::SourceMap(_) => codes::SOURCE_MAP_ERROR,
        }
    }
}

/// Error produced by the bundled swc parser adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at byte {offset}")]
pub struct ParseError {
    /// Parser diagnostic.
    pub message: String,
    /// Byte offset into the source where the error was reported.
    pub offset: usize,
}
