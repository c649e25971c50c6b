//! The push-style JSON writer: a scope state machine that guarantees
//! every document it produces is structurally well-formed, paired with
//! a string/number escaping layer.
//!
//! Built around [`Scope`]: every `begin_*`/`end_*`/`name`/`value_*` call
//! is one transition against the scope at the top of the stack, and
//! indentation/separators fall out of that transition rather than a
//! separately tracked depth counter.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{JsonError, JsonResult, Mark};
use crate::scope::{Scope, Strictness};
use crate::source::JsonSink;

/// Short escapes for the C0 control range; anything else below 0x20
/// falls back to a generic `\u00XX` escape.
static SHORT_ESCAPES: Lazy<[Option<&'static str>; 0x20]> = Lazy::new(|| {
    let mut table: [Option<&'static str>; 0x20] = [None; 0x20];
    table[0x08] = Some("\\b");
    table[0x09] = Some("\\t");
    table[0x0A] = Some("\\n");
    table[0x0C] = Some("\\f");
    table[0x0D] = Some("\\r");
    table
});

/// Grammar for an arbitrary-precision JSON number string accepted by
/// [`Writer::value_number_raw`]: optional sign, integer part with no
/// leading zero (unless it's a bare `0`), optional fraction, optional
/// exponent.
static NUMBER_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").unwrap());

/// Writer configuration: dialect, nesting limit, HTML-safe escaping, an
/// optional indent string (`None` for compact output), and whether
/// `null` members are serialized or dropped.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub strictness: Strictness,
    pub nesting_limit: usize,
    pub html_safe: bool,
    pub indent: Option<String>,
    pub serialize_nulls: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            strictness: Strictness::default(),
            nesting_limit: 255,
            html_safe: false,
            indent: None,
            serialize_nulls: true,
        }
    }
}

/// A property name captured by `name(s)` but not yet written to the
/// sink — it is flushed by the next `value`/`begin_*` call, or dropped
/// along with a following `null` when `serialize_nulls` is off.
/// `needs_comma` records whether the object already had a member when
/// `name` was called, since that decides whether flushing writes a
/// leading `,` — the scope alone no longer carries that once `name` has
/// moved the top of stack to `DanglingName`.
struct DeferredName {
    text: String,
    needs_comma: bool,
}

/// The streaming JSON writer.
pub struct Writer<W: JsonSink> {
    sink: W,
    stack: Vec<Scope>,
    deferred_name: Option<DeferredName>,
    strictness: Strictness,
    nesting_limit: usize,
    html_safe: bool,
    indent: Option<String>,
    serialize_nulls: bool,
}

impl<W: JsonSink> Writer<W> {
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: W, config: WriterConfig) -> Self {
        Writer {
            sink,
            stack: vec![Scope::EmptyDocument],
            deferred_name: None,
            strictness: config.strictness,
            nesting_limit: config.nesting_limit,
            html_safe: config.html_safe,
            indent: config.indent,
            serialize_nulls: config.serialize_nulls,
        }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    fn error(&self, message: impl Into<String>) -> JsonError {
        JsonError::structural(message, Mark::start(), "$")
    }

    fn push_scope(&mut self, scope: Scope) -> JsonResult<()> {
        let depth = self.stack.len() - 1;
        if depth >= self.nesting_limit {
            return Err(self.error(format!("Nesting limit of {} exceeded", self.nesting_limit)));
        }
        self.stack.push(scope);
        Ok(())
    }

    /// Writes the separator/indentation preceding a value and updates
    /// the scope at the top of the stack. Must run before any value or
    /// container-open token is emitted.
    fn before_value(&mut self) -> JsonResult<()> {
        match *self.stack.last().unwrap() {
            Scope::EmptyDocument => {
                *self.stack.last_mut().unwrap() = Scope::NonemptyDocument;
                Ok(())
            }
            Scope::NonemptyDocument => {
                if self.strictness.is_lenient() {
                    Ok(())
                } else {
                    Err(self.error("Only one top-level value is permitted in this dialect"))
                }
            }
            Scope::EmptyArray => {
                *self.stack.last_mut().unwrap() = Scope::NonemptyArray;
                self.write_indent()
            }
            Scope::NonemptyArray => {
                self.sink.write_char(',')?;
                self.write_indent()
            }
            Scope::DanglingName => self.flush_deferred_name(),
            Scope::EmptyObject | Scope::NonemptyObject => {
                Err(self.error("Expected a name before a value"))
            }
            Scope::Closed => Err(self.error("Writer is closed")),
        }
    }

    /// Writes the comma/indent/quoted-name/separator for the pending
    /// deferred name, then marks the object non-empty. Called from
    /// `before_value` so a name and its value always emit together.
    fn flush_deferred_name(&mut self) -> JsonResult<()> {
        let deferred = self.deferred_name.take().expect("DanglingName implies a deferred name");
        if deferred.needs_comma {
            self.sink.write_char(',')?;
        }
        self.write_indent()?;
        self.write_quoted_escaped(&deferred.text)?;
        self.sink.write_char(':')?;
        if self.indent.is_some() {
            self.sink.write_char(' ')?;
        }
        *self.stack.last_mut().unwrap() = Scope::NonemptyObject;
        Ok(())
    }

    fn write_indent(&mut self) -> JsonResult<()> {
        if let Some(ind) = self.indent.clone() {
            self.sink.write_char('\n')?;
            for _ in 0..self.stack.len().saturating_sub(1) {
                self.sink.write_str(&ind)?;
            }
        }
        Ok(())
    }

    fn write_indent_for_close(&mut self) -> JsonResult<()> {
        if let Some(ind) = self.indent.clone() {
            self.sink.write_char('\n')?;
            for _ in 0..self.stack.len().saturating_sub(2) {
                self.sink.write_str(&ind)?;
            }
        }
        Ok(())
    }

    pub fn begin_array(&mut self) -> JsonResult<()> {
        self.before_value()?;
        self.push_scope(Scope::EmptyArray)?;
        self.sink.write_char('[')?;
        Ok(())
    }

    pub fn end_array(&mut self) -> JsonResult<()> {
        match *self.stack.last().unwrap() {
            Scope::EmptyArray => {}
            Scope::NonemptyArray => self.write_indent_for_close()?,
            _ => return Err(self.error("Not inside an array")),
        }
        self.stack.pop();
        self.sink.write_char(']')?;
        Ok(())
    }

    pub fn begin_object(&mut self) -> JsonResult<()> {
        self.before_value()?;
        self.push_scope(Scope::EmptyObject)?;
        self.sink.write_char('{')?;
        Ok(())
    }

    pub fn end_object(&mut self) -> JsonResult<()> {
        match *self.stack.last().unwrap() {
            Scope::EmptyObject => {}
            Scope::NonemptyObject => self.write_indent_for_close()?,
            _ => return Err(self.error("Not inside an object, or a value is still owed for the last name")),
        }
        self.stack.pop();
        self.sink.write_char('}')?;
        Ok(())
    }

    /// Stashes `name` as the pending member name; nothing is written to
    /// the sink until the following `value`/`begin_*` call flushes it
    /// (or a suppressed `null` drops it — see [`Writer::value_null`]).
    pub fn name(&mut self, name: &str) -> JsonResult<()> {
        let needs_comma = match *self.stack.last().unwrap() {
            Scope::EmptyObject => false,
            Scope::NonemptyObject => true,
            _ => return Err(self.error("A name is not expected here")),
        };
        *self.stack.last_mut().unwrap() = Scope::DanglingName;
        self.deferred_name = Some(DeferredName { text: name.to_string(), needs_comma });
        Ok(())
    }

    pub fn value_null(&mut self) -> JsonResult<()> {
        if !self.serialize_nulls && self.deferred_name.is_some() {
            // Drop the pending name/null pair: revert the scope to what
            // it would be had `name` never been called.
            let deferred = self.deferred_name.take().unwrap();
            *self.stack.last_mut().unwrap() =
                if deferred.needs_comma { Scope::NonemptyObject } else { Scope::EmptyObject };
            return Ok(());
        }
        self.before_value()?;
        self.sink.write_str("null")?;
        Ok(())
    }

    pub fn value_boolean(&mut self, value: bool) -> JsonResult<()> {
        self.before_value()?;
        self.sink.write_str(if value { "true" } else { "false" })?;
        Ok(())
    }

    pub fn value_long(&mut self, value: i64) -> JsonResult<()> {
        self.before_value()?;
        self.sink.write_str(&value.to_string())?;
        Ok(())
    }

    pub fn value_double(&mut self, value: f64) -> JsonResult<()> {
        if (value.is_nan() || value.is_infinite()) && !self.strictness.is_lenient() {
            return Err(self.error("NaN and Infinity are not permitted in this dialect"));
        }
        self.before_value()?;
        let text = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
        } else {
            format_finite_double(value)
        };
        self.sink.write_str(&text)?;
        Ok(())
    }

    /// Writes an already-formatted arbitrary-precision number string,
    /// validated against JSON's number grammar rather than parsed into
    /// any fixed-width type.
    pub fn value_number_raw(&mut self, text: &str) -> JsonResult<()> {
        if !NUMBER_GRAMMAR.is_match(text) {
            return Err(self.error(format!("Not a valid JSON number literal: {}", text)));
        }
        self.before_value()?;
        self.sink.write_str(text)?;
        Ok(())
    }

    pub fn value_string(&mut self, value: &str) -> JsonResult<()> {
        self.before_value()?;
        self.write_quoted_escaped(value)
    }

    fn write_quoted_escaped(&mut self, s: &str) -> JsonResult<()> {
        self.sink.write_char('"')?;
        for c in s.chars() {
            match c {
                '"' => self.sink.write_str("\\\"")?,
                '\\' => self.sink.write_str("\\\\")?,
                c if (c as u32) < 0x20 => {
                    if let Some(short) = SHORT_ESCAPES[c as usize] {
                        self.sink.write_str(short)?;
                    } else {
                        self.sink.write_str(&format!("\\u{:04x}", c as u32))?;
                    }
                }
                '\u{2028}' => self.sink.write_str("\\u2028")?,
                '\u{2029}' => self.sink.write_str("\\u2029")?,
                '<' | '>' | '&' | '=' | '\'' if self.html_safe => {
                    self.sink.write_str(&format!("\\u{:04x}", c as u32))?;
                }
                c => self.sink.write_char(c)?,
            }
        }
        self.sink.write_char('"')?;
        Ok(())
    }

    /// Flushes without requiring a complete document — useful for
    /// interleaved writer/consumer pipelines.
    pub fn flush(&mut self) -> JsonResult<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Closes the writer. Fails if the document is incomplete (still
    /// inside a container, or no root value has been written yet).
    pub fn close(&mut self) -> JsonResult<()> {
        match *self.stack.last().unwrap() {
            Scope::NonemptyDocument => {}
            Scope::Closed => return Err(self.error("Writer already closed")),
            _ => return Err(self.error("Incomplete document")),
        }
        self.sink.flush()?;
        self.stack.clear();
        self.stack.push(Scope::Closed);
        Ok(())
    }
}

fn format_finite_double(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StringSink;

    fn writer() -> Writer<StringSink> {
        Writer::new(StringSink::new())
    }

    fn pretty_writer() -> Writer<StringSink> {
        Writer::with_config(
            StringSink::new(),
            WriterConfig { indent: Some("  ".to_string()), ..WriterConfig::default() },
        )
    }

    #[test]
    fn compact_array_of_scalars() {
        let mut w = writer();
        w.begin_array().unwrap();
        w.value_long(1).unwrap();
        w.value_string("two").unwrap();
        w.value_null().unwrap();
        w.end_array().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#"[1,"two",null]"#);
    }

    #[test]
    fn object_with_name_value_pairs() {
        let mut w = writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.value_long(1).unwrap();
        w.name("b").unwrap();
        w.value_boolean(true).unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#"{"a":1,"b":true}"#);
    }

    #[test]
    fn name_without_value_then_end_object_is_rejected() {
        let mut w = writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        assert!(w.end_object().is_err());
    }

    #[test]
    fn two_names_in_a_row_is_rejected() {
        let mut w = writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        assert!(w.name("b").is_err());
    }

    #[test]
    fn closing_with_incomplete_document_fails() {
        let mut w = writer();
        w.begin_array().unwrap();
        assert!(w.close().is_err());
    }

    #[test]
    fn strict_mode_rejects_second_top_level_value() {
        let mut w = writer();
        w.value_long(1).unwrap();
        assert!(w.value_long(2).is_err());
    }

    #[test]
    fn lenient_mode_allows_multiple_top_level_values() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { strictness: Strictness::Lenient, ..WriterConfig::default() },
        );
        w.value_long(1).unwrap();
        w.value_long(2).unwrap();
        assert_eq!(w.into_inner().into_inner(), "12");
    }

    #[test]
    fn strict_mode_rejects_nan_and_infinite_double() {
        let mut w = writer();
        assert!(w.value_double(f64::NAN).is_err());
        assert!(w.value_double(f64::INFINITY).is_err());
    }

    #[test]
    fn lenient_mode_writes_nan_and_infinity() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { strictness: Strictness::Lenient, ..WriterConfig::default() },
        );
        w.value_double(f64::NAN).unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "NaN");
    }

    #[test]
    fn string_escaping_covers_controls_and_line_separators() {
        let mut w = writer();
        w.value_string("a\nb\u{2028}c\u{0}d").unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "\"a\\nb\\u2028c\\u0000d\"");
    }

    #[test]
    fn html_safe_mode_escapes_angle_brackets() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { html_safe: true, ..WriterConfig::default() },
        );
        w.value_string("<script>").unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#""\u003cscript\u003e""#);
    }

    #[test]
    fn html_safe_mode_escapes_a_closing_script_tag() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { html_safe: true, ..WriterConfig::default() },
        );
        w.begin_object().unwrap();
        w.name("k").unwrap();
        w.value_string("</x>").unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "{\"k\":\"\\u003c/x\\u003e\"}");
    }

    #[test]
    fn html_safe_mode_escapes_ampersand_equals_and_quote() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { html_safe: true, ..WriterConfig::default() },
        );
        w.value_string("a&b=c'd").unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "\"a\\u0026b\\u003dc\\u0027d\"");
    }

    #[test]
    fn suppressed_null_drops_name_and_value() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { serialize_nulls: false, ..WriterConfig::default() },
        );
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.value_null().unwrap();
        w.name("b").unwrap();
        w.value_long(1).unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#"{"b":1}"#);
    }

    #[test]
    fn suppressed_null_as_only_member_leaves_empty_object() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { serialize_nulls: false, ..WriterConfig::default() },
        );
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.value_null().unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#"{}"#);
    }

    #[test]
    fn serialize_nulls_true_by_default_keeps_null_members() {
        let mut w = writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.value_null().unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), r#"{"a":null}"#);
    }

    #[test]
    fn name_is_not_written_until_a_value_flushes_it() {
        let mut w = writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        assert_eq!(w.get_ref().buffer, r#"{"#);
        w.value_long(1).unwrap();
        assert_eq!(w.get_ref().buffer, r#"{"a":1"#);
        w.end_object().unwrap();
        w.close().unwrap();
    }

    #[test]
    fn raw_number_rejects_leading_zero() {
        let mut w = writer();
        assert!(w.value_number_raw("0123").is_err());
    }

    #[test]
    fn raw_number_accepts_arbitrary_precision_integer() {
        let mut w = writer();
        w.value_number_raw("123456789012345678901234567890").unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "123456789012345678901234567890");
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let mut w = Writer::with_config(
            StringSink::new(),
            WriterConfig { nesting_limit: 1, ..WriterConfig::default() },
        );
        w.begin_array().unwrap();
        assert!(w.begin_array().is_err());
    }

    #[test]
    fn pretty_printed_nested_object() {
        let mut w = pretty_writer();
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.begin_array().unwrap();
        w.value_long(1).unwrap();
        w.value_long(2).unwrap();
        w.end_array().unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(
            w.into_inner().into_inner(),
            "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn pretty_printed_empty_containers_stay_on_one_line() {
        let mut w = pretty_writer();
        w.begin_object().unwrap();
        w.name("empty").unwrap();
        w.begin_array().unwrap();
        w.end_array().unwrap();
        w.end_object().unwrap();
        w.close().unwrap();
        assert_eq!(w.into_inner().into_inner(), "{\n  \"empty\": []\n}");
    }
}
