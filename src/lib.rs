//! A streaming, pull-style JSON reader paired with a push-style JSON
//! writer, built around a shared lexical [`Scope`] state machine instead
//! of an intermediate tree. Nothing is buffered as a document: the
//! reader hands back one token at a time from a manual nesting stack,
//! and the writer accepts one token at a time onto its own.
//!
//! ```
//! use jsonstream::{Reader, TokenKind};
//!
//! let mut reader = Reader::from_str(r#"{"ok":true}"#);
//! reader.begin_object().unwrap();
//! assert_eq!(reader.next_name().unwrap(), "ok");
//! assert_eq!(reader.next_boolean().unwrap(), true);
//! reader.end_object().unwrap();
//! assert_eq!(reader.peek().unwrap(), TokenKind::EndDocument);
//! ```

pub mod error;
pub mod path;
pub mod reader;
pub mod scope;
pub mod source;
pub mod writer;

pub use error::{JsonError, JsonResult, Mark};
pub use reader::{Reader, ReaderConfig, StringValueReader, TokenKind};
pub use scope::{Scope, Strictness};
pub use source::{IoSink, JsonSink, JsonSource, ReadSource, SliceSource, StringSink};
pub use writer::{Writer, WriterConfig};

impl<'a> Reader<SliceSource<'a>> {
    /// Convenience constructor over an in-memory string, the common
    /// case where the whole document is already resident.
    pub fn from_str(input: &'a str) -> Self {
        Reader::new(SliceSource::new(input))
    }
}

impl Writer<StringSink> {
    /// Convenience constructor that accumulates output into an owned
    /// `String`, retrievable via `into_inner().into_inner()`.
    pub fn to_string_writer() -> Self {
        Writer::new(StringSink::new())
    }
}
