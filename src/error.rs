//! Error taxonomy and source-position tracking.
//!
//! Three kinds, matching the three collaborators that can fail: malformed
//! input (syntax), structural misuse (calling the wrong method for the
//! current scope), and I/O from the underlying source/sink. Every
//! non-I/O error carries a [`Mark`] and a JSONPath so the caller can say
//! exactly where things went wrong.

use std::fmt;

/// A position in the source stream: line and column are 1-indexed in
/// messages, 0-indexed internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mark {
    pub line: usize,
    pub column: usize,
}

impl Mark {
    pub fn new(line: usize, column: usize) -> Self {
        Mark { line, column }
    }

    pub fn start() -> Self {
        Mark { line: 1, column: 1 }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Every fallible operation in this crate returns this.
pub type JsonResult<T> = Result<T, JsonError>;

/// The error taxonomy: malformed input, structural misuse, and I/O, each
/// carrying a location string of the form `" at line L column C path P"`.
#[derive(thiserror::Error, Debug)]
pub enum JsonError {
    /// Malformed input: unexpected character, unterminated string/comment,
    /// bad escape, forbidden NaN/Infinity, leading zero, a lenient-only
    /// feature used in a stricter dialect, or a number out of range for
    /// the narrow accessor requested.
    #[error("{message} at {mark} path {path}")]
    Syntax {
        message: String,
        mark: Mark,
        path: String,
    },

    /// Structural misuse: calling an accessor the current scope forbids,
    /// operating on a closed instance, exceeding the nesting limit, or an
    /// incomplete document at `close`.
    #[error("{message} at {mark} path {path}")]
    Structural {
        message: String,
        mark: Mark,
        path: String,
    },

    /// Propagated verbatim from the underlying character source or sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl JsonError {
    pub fn syntax(message: impl Into<String>, mark: Mark, path: impl Into<String>) -> Self {
        JsonError::Syntax { message: message.into(), mark, path: path.into() }
    }

    pub fn structural(message: impl Into<String>, mark: Mark, path: impl Into<String>) -> Self {
        JsonError::Structural { message: message.into(), mark, path: path.into() }
    }

    /// True for the two non-I/O variants; useful for callers that want to
    /// distinguish "the document is bad" from "the transport failed".
    pub fn is_protocol_error(&self) -> bool {
        !matches!(self, JsonError::Io(_))
    }
}
