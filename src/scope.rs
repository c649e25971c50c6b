//! Lexical scope vocabulary shared by the reader and the writer.
//!
//! Both sides of the stream keep a stack of these tags instead of a tree:
//! the tag at the top of the stack says what "inside an empty object" or
//! "just after a name" means, and every transition is a plain equality
//! check against it. No dynamic dispatch, no `dyn` state objects — a
//! frame is one byte.

/// One entry in the reader's or writer's nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Scope {
    /// Top-level array, no elements read/written yet.
    EmptyArray,
    /// Top-level array with at least one element read/written.
    NonemptyArray,
    /// Object with no members read/written yet.
    EmptyObject,
    /// A property name has been consumed/emitted; a value must follow.
    DanglingName,
    /// Object with at least one member read/written.
    NonemptyObject,
    /// Before the first top-level value.
    EmptyDocument,
    /// After the first top-level value.
    NonemptyDocument,
    /// The reader or writer has been closed; no further operations are valid.
    Closed,
}

impl Scope {
    /// True for `EmptyArray`/`NonemptyArray`.
    pub fn is_array(self) -> bool {
        matches!(self, Scope::EmptyArray | Scope::NonemptyArray)
    }

    /// True for `EmptyObject`/`NonemptyObject`/`DanglingName`.
    pub fn is_object(self) -> bool {
        matches!(self, Scope::EmptyObject | Scope::NonemptyObject | Scope::DanglingName)
    }

    /// True for either document scope.
    pub fn is_document(self) -> bool {
        matches!(self, Scope::EmptyDocument | Scope::NonemptyDocument)
    }
}

/// The configured dialect of JSON deviations a reader or writer accepts.
///
/// Ordered loosest-last so `strictness >= Strictness::Lenient` reads
/// naturally at call sites that ask "is this lenient-only feature allowed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strictness {
    /// RFC 8259 only.
    Strict,
    /// RFC 8259 plus case-insensitive keywords, `\'`/`\<LF>` escapes, and
    /// unescaped C0 controls in strings.
    LegacyStrict,
    /// `LegacyStrict` plus comments, unquoted/single-quoted tokens, the
    /// non-execute prefix, multiple top-level values, and more.
    Lenient,
}

impl Default for Strictness {
    fn default() -> Self {
        Strictness::LegacyStrict
    }
}

impl Strictness {
    /// Whether this dialect accepts the given lenient-only feature.
    pub fn is_lenient(self) -> bool {
        self == Strictness::Lenient
    }

    /// Whether this dialect is stricter than plain `Strict` (i.e. not strict at all).
    pub fn accepts_legacy(self) -> bool {
        self >= Strictness::LegacyStrict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_predicates() {
        assert!(Scope::EmptyArray.is_array());
        assert!(Scope::NonemptyArray.is_array());
        assert!(!Scope::EmptyObject.is_array());

        assert!(Scope::EmptyObject.is_object());
        assert!(Scope::DanglingName.is_object());
        assert!(Scope::NonemptyObject.is_object());
        assert!(!Scope::EmptyArray.is_object());

        assert!(Scope::EmptyDocument.is_document());
        assert!(Scope::NonemptyDocument.is_document());
        assert!(!Scope::Closed.is_document());
    }

    #[test]
    fn strictness_ordering() {
        assert!(Strictness::Strict < Strictness::LegacyStrict);
        assert!(Strictness::LegacyStrict < Strictness::Lenient);
        assert!(Strictness::Lenient.is_lenient());
        assert!(!Strictness::LegacyStrict.is_lenient());
        assert!(Strictness::LegacyStrict.accepts_legacy());
        assert!(!Strictness::Strict.accepts_legacy());
    }

    #[test]
    fn default_is_legacy_strict() {
        assert_eq!(Strictness::default(), Strictness::LegacyStrict);
    }
}
