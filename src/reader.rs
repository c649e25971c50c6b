//! The pull-style JSON reader: a peek/advance state machine over a
//! character source, keyed on the [`Scope`] at the top of a manual
//! nesting stack instead of a recursive-descent call tree.
//!
//! Lookahead resolves through a single routine, `do_peek`, dispatched on
//! the scope at the top of the stack: nothing is buffered as a tree,
//! every token is resolved one at a time and the caller decides when to
//! advance past it.

use crate::error::{JsonError, JsonResult, Mark};
use crate::path::build_path;
use crate::scope::{Scope, Strictness};
use crate::source::JsonSource;

/// The longest number literal the fast numeric path will scan in one
/// pass. A literal longer than this gives up the fast path entirely:
/// it falls through to an unquoted literal in lenient mode, or a syntax
/// error otherwise.
const MAX_NUMBER_LEN: usize = 1024;

/// The ten token kinds visible to callers of [`Reader::peek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    BeginArray,
    EndArray,
    BeginObject,
    EndObject,
    Name,
    String,
    Number,
    Boolean,
    Null,
    EndDocument,
}

/// Richer internal lookahead, keyed on exactly how the next token was
/// scanned. `Number` and `Long` are kept distinct so the one-pass
/// integer fast path never has to re-lex a literal it has already
/// classified.
#[derive(Debug, Clone)]
enum Peek {
    None,
    BeginArray,
    EndArray,
    BeginObject,
    EndObject,
    EndDocument,
    Boolean(bool),
    Null,
    NameDoubleQuoted(String),
    NameSingleQuoted(String),
    NameUnquoted(String),
    StringDoubleQuoted(String),
    StringSingleQuoted(String),
    StringUnquoted(String),
    /// A literal that parsed as a pure integer fitting in `i64`.
    Long(i64),
    /// A literal that reached a digit-bearing state but isn't a plain
    /// integer (has a fraction/exponent, doesn't fit `i64`, or is `-0`).
    /// Carries the raw digit text rather than a buffer slice, since the
    /// reader's lookahead buffer may be compacted mid-scan.
    Number(String),
    /// A name peek re-tagged as a value peek by `promote_name_to_value`.
    Buffered(String),
}

impl Peek {
    fn token_kind(&self) -> TokenKind {
        match self {
            Peek::None => unreachable!("token_kind queried with no pending peek"),
            Peek::BeginArray => TokenKind::BeginArray,
            Peek::EndArray => TokenKind::EndArray,
            Peek::BeginObject => TokenKind::BeginObject,
            Peek::EndObject => TokenKind::EndObject,
            Peek::EndDocument => TokenKind::EndDocument,
            Peek::Boolean(_) => TokenKind::Boolean,
            Peek::Null => TokenKind::Null,
            Peek::NameDoubleQuoted(_) | Peek::NameSingleQuoted(_) | Peek::NameUnquoted(_) => {
                TokenKind::Name
            }
            Peek::StringDoubleQuoted(_)
            | Peek::StringSingleQuoted(_)
            | Peek::StringUnquoted(_)
            | Peek::Buffered(_) => TokenKind::String,
            Peek::Long(_) | Peek::Number(_) => TokenKind::Number,
        }
    }
}

/// Number sub-state-machine states, following the JSON number grammar
/// (RFC 8259 §6): optional sign, integer part, optional fraction,
/// optional exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumState {
    None,
    Sign,
    /// Exactly the single digit `0` with nothing after it yet.
    Digit0,
    Digit,
    Decimal,
    FractionDigit,
    ExpE,
    ExpSign,
    ExpDigit,
}

/// Reader configuration: the strictness dialect and the nesting-depth
/// limit.
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    pub strictness: Strictness,
    pub nesting_limit: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig { strictness: Strictness::default(), nesting_limit: 255 }
    }
}

/// The streaming JSON reader.
pub struct Reader<S: JsonSource> {
    source: S,
    buffer: Vec<char>,
    pos: usize,
    limit: usize,
    line_number: usize,
    line_start: usize,
    chars_consumed: usize,
    bom_checked: bool,
    prefix_checked: bool,
    peeked: Peek,
    stack: Vec<Scope>,
    path_names: Vec<Option<String>>,
    path_indices: Vec<usize>,
    strictness: Strictness,
    nesting_limit: usize,
}

impl<S: JsonSource> Reader<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    pub fn with_config(source: S, config: ReaderConfig) -> Self {
        Reader {
            source,
            buffer: Vec::with_capacity(MAX_NUMBER_LEN),
            pos: 0,
            limit: 0,
            line_number: 1,
            line_start: 0,
            chars_consumed: 0,
            bom_checked: false,
            prefix_checked: false,
            peeked: Peek::None,
            stack: vec![Scope::EmptyDocument],
            path_names: Vec::new(),
            path_indices: Vec::new(),
            strictness: config.strictness,
            nesting_limit: config.nesting_limit,
        }
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn nesting_limit(&self) -> usize {
        self.nesting_limit
    }

    // -----------------------------------------------------------------
    // Low-level character buffer
    // -----------------------------------------------------------------

    fn fill_buffer(&mut self, min_needed: usize) -> JsonResult<bool> {
        loop {
            if self.limit - self.pos >= min_needed {
                return Ok(true);
            }
            if self.pos > 0 {
                self.buffer.copy_within(self.pos..self.limit, 0);
                self.limit -= self.pos;
                self.pos = 0;
            }
            if self.buffer.len() < MAX_NUMBER_LEN {
                self.buffer.resize(MAX_NUMBER_LEN, '\0');
            }
            if self.limit == self.buffer.len() {
                return Ok(false);
            }
            let n = self.source.fill(&mut self.buffer[self.limit..])?;
            if n == 0 {
                return Ok(false);
            }
            self.limit += n;
        }
    }

    fn peek_char0(&mut self) -> JsonResult<Option<char>> {
        self.peek_char_at(0)
    }

    fn peek_char_at(&mut self, offset: usize) -> JsonResult<Option<char>> {
        if self.pos + offset >= self.limit {
            self.fill_buffer(offset + 1)?;
        }
        Ok(self.buffer.get(self.pos + offset).copied().filter(|_| self.pos + offset < self.limit))
    }

    fn advance_char(&mut self) -> JsonResult<char> {
        match self.peek_char0()? {
            Some(c) => {
                self.pos += 1;
                self.chars_consumed += 1;
                if c == '\n' {
                    self.line_number += 1;
                    self.line_start = self.chars_consumed;
                }
                Ok(c)
            }
            None => Err(self.syntax_error("Unexpected end of input")),
        }
    }

    fn consume_n(&mut self, n: usize) -> JsonResult<()> {
        for _ in 0..n {
            self.advance_char()?;
        }
        Ok(())
    }

    fn current_mark(&self) -> Mark {
        Mark::new(self.line_number, self.chars_consumed - self.line_start + 1)
    }

    fn syntax_error(&self, message: impl Into<String>) -> JsonError {
        JsonError::syntax(message, self.current_mark(), self.get_path())
    }

    fn structural_error(&self, message: impl Into<String>) -> JsonError {
        JsonError::structural(message, self.current_mark(), self.get_path())
    }

    fn is_literal_terminator(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n' | ',' | ':' | '[' | ']' | '{' | '}' | ';' | '=')
    }

    fn skip_whitespace_and_comments(&mut self) -> JsonResult<()> {
        loop {
            match self.peek_char0()? {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance_char()?;
                }
                Some('/') if self.strictness.is_lenient() => match self.peek_char_at(1)? {
                    Some('/') => {
                        self.consume_n(2)?;
                        self.skip_line_comment()?;
                    }
                    Some('*') => {
                        self.consume_n(2)?;
                        self.skip_block_comment()?;
                    }
                    _ => return Ok(()),
                },
                Some('#') if self.strictness.is_lenient() => {
                    self.advance_char()?;
                    self.skip_line_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) -> JsonResult<()> {
        loop {
            match self.peek_char0()? {
                Some('\n') | None => return Ok(()),
                Some(_) => {
                    self.advance_char()?;
                }
            }
        }
    }

    fn skip_block_comment(&mut self) -> JsonResult<()> {
        loop {
            match self.peek_char0()? {
                None => return Err(self.syntax_error("Unterminated comment")),
                Some('*') if self.peek_char_at(1)? == Some('/') => {
                    self.consume_n(2)?;
                    return Ok(());
                }
                Some(_) => {
                    self.advance_char()?;
                }
            }
        }
    }

    fn maybe_consume_bom(&mut self) -> JsonResult<()> {
        if self.bom_checked {
            return Ok(());
        }
        self.bom_checked = true;
        if self.peek_char0()? == Some('\u{feff}') {
            self.advance_char()?;
        }
        Ok(())
    }

    /// The five-character non-execute prefix `)]}'\n`, consumed once at
    /// stream start in lenient mode.
    fn maybe_consume_non_execute_prefix(&mut self) -> JsonResult<()> {
        if self.prefix_checked {
            return Ok(());
        }
        self.prefix_checked = true;
        if !self.strictness.is_lenient() {
            return Ok(());
        }
        const PREFIX: [char; 5] = [')', ']', '}', '\'', '\n'];
        for (i, &pc) in PREFIX.iter().enumerate() {
            if self.peek_char_at(i)? != Some(pc) {
                return Ok(());
            }
        }
        self.consume_n(5)
    }

    // -----------------------------------------------------------------
    // Lookahead state machine
    // -----------------------------------------------------------------

    fn do_peek(&mut self) -> JsonResult<TokenKind> {
        if !matches!(self.peeked, Peek::None) {
            return Ok(self.peeked.token_kind());
        }
        self.maybe_consume_bom()?;
        let scope = *self.stack.last().expect("stack is never empty");
        match scope {
            Scope::Closed => Err(self.structural_error("Reader is closed")),
            Scope::EmptyDocument => {
                self.maybe_consume_non_execute_prefix()?;
                *self.stack.last_mut().unwrap() = Scope::NonemptyDocument;
                self.parse_value()
            }
            Scope::NonemptyDocument => {
                self.skip_whitespace_and_comments()?;
                if self.peek_char0()?.is_none() {
                    self.peeked = Peek::EndDocument;
                    return Ok(TokenKind::EndDocument);
                }
                if !self.strictness.is_lenient() {
                    return Err(self.syntax_error(
                        "Expected end of document; use lenient mode to accept multiple top-level values",
                    ));
                }
                self.parse_value()
            }
            Scope::EmptyArray => self.peek_in_array(true),
            Scope::NonemptyArray => self.peek_in_array(false),
            Scope::EmptyObject => self.peek_in_object(true),
            Scope::NonemptyObject => self.peek_in_object(false),
            Scope::DanglingName => self.peek_after_name(),
        }
    }

    fn peek_in_array(&mut self, first: bool) -> JsonResult<TokenKind> {
        if !first {
            self.skip_whitespace_and_comments()?;
            match self.peek_char0()? {
                Some(']') => {
                    self.advance_char()?;
                    self.peeked = Peek::EndArray;
                    return Ok(TokenKind::EndArray);
                }
                Some(',') => {
                    self.advance_char()?;
                }
                Some(';') if self.strictness.is_lenient() => {
                    self.advance_char()?;
                }
                _ => return Err(self.syntax_error("Expected ',' or ']'")),
            }
        } else {
            self.skip_whitespace_and_comments()?;
            if self.peek_char0()? == Some(']') {
                self.advance_char()?;
                self.peeked = Peek::EndArray;
                return Ok(TokenKind::EndArray);
            }
        }
        *self.stack.last_mut().unwrap() = Scope::NonemptyArray;
        self.skip_whitespace_and_comments()?;
        match self.peek_char0()? {
            Some(',') | Some(';') if self.strictness.is_lenient() => {
                self.peeked = Peek::Null;
                return Ok(TokenKind::Null);
            }
            Some(']') if self.strictness.is_lenient() && !first => {
                self.peeked = Peek::Null;
                return Ok(TokenKind::Null);
            }
            _ => {}
        }
        self.parse_value()
    }

    fn peek_in_object(&mut self, first: bool) -> JsonResult<TokenKind> {
        if !first {
            self.skip_whitespace_and_comments()?;
            match self.peek_char0()? {
                Some('}') => {
                    self.advance_char()?;
                    self.peeked = Peek::EndObject;
                    return Ok(TokenKind::EndObject);
                }
                Some(',') => {
                    self.advance_char()?;
                }
                Some(';') if self.strictness.is_lenient() => {
                    self.advance_char()?;
                }
                _ => return Err(self.syntax_error("Expected ',' or '}'")),
            }
        } else {
            self.skip_whitespace_and_comments()?;
            if self.peek_char0()? == Some('}') {
                self.advance_char()?;
                self.peeked = Peek::EndObject;
                return Ok(TokenKind::EndObject);
            }
        }
        *self.stack.last_mut().unwrap() = Scope::DanglingName;
        self.skip_whitespace_and_comments()?;
        match self.peek_char0()? {
            Some('"') => {
                let s = self.read_quoted_string('"')?;
                self.peeked = Peek::NameDoubleQuoted(s);
                Ok(TokenKind::Name)
            }
            Some('\'') if self.strictness.is_lenient() => {
                let s = self.read_quoted_string('\'')?;
                self.peeked = Peek::NameSingleQuoted(s);
                Ok(TokenKind::Name)
            }
            Some(c) if self.strictness.is_lenient() && !Self::is_literal_terminator(c) => {
                let s = self.read_unquoted_literal()?;
                self.peeked = Peek::NameUnquoted(s);
                Ok(TokenKind::Name)
            }
            _ => Err(self.syntax_error("Expected a name")),
        }
    }

    fn peek_after_name(&mut self) -> JsonResult<TokenKind> {
        self.skip_whitespace_and_comments()?;
        match self.peek_char0()? {
            Some(':') => {
                self.advance_char()?;
            }
            Some('=') if self.strictness.is_lenient() => {
                self.advance_char()?;
                if self.peek_char0()? == Some('>') {
                    self.advance_char()?;
                }
            }
            _ => return Err(self.syntax_error("Expected ':'")),
        }
        *self.stack.last_mut().unwrap() = Scope::NonemptyObject;
        self.parse_value()
    }

    fn parse_value(&mut self) -> JsonResult<TokenKind> {
        self.skip_whitespace_and_comments()?;
        let c = match self.peek_char0()? {
            Some(c) => c,
            None => return Err(self.syntax_error("Expected value")),
        };
        match c {
            '{' => {
                self.advance_char()?;
                self.push_scope(Scope::EmptyObject)?;
                self.peeked = Peek::BeginObject;
                Ok(TokenKind::BeginObject)
            }
            '[' => {
                self.advance_char()?;
                self.push_scope(Scope::EmptyArray)?;
                self.peeked = Peek::BeginArray;
                Ok(TokenKind::BeginArray)
            }
            '"' => {
                let s = self.read_quoted_string('"')?;
                self.peeked = Peek::StringDoubleQuoted(s);
                Ok(TokenKind::String)
            }
            '\'' if self.strictness.is_lenient() => {
                let s = self.read_quoted_string('\'')?;
                self.peeked = Peek::StringSingleQuoted(s);
                Ok(TokenKind::String)
            }
            _ => {
                if let Some(peek) = self.try_keyword()? {
                    let kind = peek.token_kind();
                    self.peeked = peek;
                    return Ok(kind);
                }
                if let Some(peek) = self.try_number()? {
                    let kind = peek.token_kind();
                    self.peeked = peek;
                    return Ok(kind);
                }
                if self.strictness.is_lenient() {
                    let s = self.read_unquoted_literal()?;
                    self.peeked = Peek::StringUnquoted(s);
                    Ok(TokenKind::String)
                } else {
                    Err(self.syntax_error(format!("Unexpected character '{}'", c)))
                }
            }
        }
    }

    fn push_scope(&mut self, scope: Scope) -> JsonResult<()> {
        let depth = self.stack.len() - 1;
        if depth >= self.nesting_limit {
            return Err(self.structural_error(format!(
                "Nesting limit of {} exceeded",
                self.nesting_limit
            )));
        }
        self.stack.push(scope);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Number sub-state-machine
    // -----------------------------------------------------------------

    /// Scans a number purely by lookahead (`peek_char_at`), never
    /// advancing the cursor until classification succeeds. This lets the
    /// caller fall back to an unquoted literal starting at the very first
    /// character when the text turns out not to be a well-formed number
    /// (leading zero followed by a digit, a non-terminator trailing the
    /// digits, or a literal longer than the lookahead buffer) — mirroring
    /// a classic "peek doesn't commit" number scanner, just without a
    /// mutable `pos` field to roll back.
    fn try_number(&mut self) -> JsonResult<Option<Peek>> {
        let mut state = NumState::None;
        let mut text = String::new();
        let mut value: i64 = 0;
        let mut fits_in_long = true;
        let mut negative = false;
        let mut offset = 0usize;

        loop {
            let c = match self.peek_char_at(offset)? {
                Some(c) => c,
                None => break,
            };
            let prev_state = state;
            let next_state = match (prev_state, c) {
                (NumState::None, '-') => Some(NumState::Sign),
                (NumState::None, '0') | (NumState::Sign, '0') => Some(NumState::Digit0),
                (NumState::None, '1'..='9') | (NumState::Sign, '1'..='9') => Some(NumState::Digit),
                (NumState::Digit0, '0'..='9') => {
                    // Leading zero followed by another digit: reject the
                    // whole literal without consuming anything (nothing
                    // has been consumed yet — this is still lookahead).
                    return Ok(None);
                }
                (NumState::Digit0, '.') | (NumState::Digit, '.') => Some(NumState::Decimal),
                (NumState::Digit0, 'e') | (NumState::Digit0, 'E') => Some(NumState::ExpE),
                (NumState::Digit, '0'..='9') => Some(NumState::Digit),
                (NumState::Digit, 'e') | (NumState::Digit, 'E') => Some(NumState::ExpE),
                (NumState::Decimal, '0'..='9') => Some(NumState::FractionDigit),
                (NumState::FractionDigit, '0'..='9') => Some(NumState::FractionDigit),
                (NumState::FractionDigit, 'e') | (NumState::FractionDigit, 'E') => {
                    Some(NumState::ExpE)
                }
                (NumState::ExpE, '+') | (NumState::ExpE, '-') => Some(NumState::ExpSign),
                (NumState::ExpE, '0'..='9') => Some(NumState::ExpDigit),
                (NumState::ExpSign, '0'..='9') => Some(NumState::ExpDigit),
                (NumState::ExpDigit, '0'..='9') => Some(NumState::ExpDigit),
                _ => None,
            };
            let Some(s) = next_state else { break };
            if prev_state == NumState::None && c == '-' {
                negative = true;
            }
            if matches!(s, NumState::Digit | NumState::Digit0) && c.is_ascii_digit() {
                if fits_in_long {
                    let d = (c as u8 - b'0') as i64;
                    match value.checked_mul(10).and_then(|v| v.checked_sub(d)) {
                        Some(v) => value = v,
                        None => fits_in_long = false,
                    }
                }
            }
            text.push(c);
            offset += 1;
            state = s;
            if text.len() > MAX_NUMBER_LEN {
                return Ok(None);
            }
        }

        // The character right after the scanned digits must end the
        // literal (whitespace, a structural character, EOF); otherwise
        // this isn't a number at all — e.g. lenient `123abc` must read as
        // one unquoted literal, not `123` followed by `abc`.
        if let Some(next) = self.peek_char_at(offset)? {
            if !Self::is_literal_terminator(next) {
                return Ok(None);
            }
        }

        let result = match state {
            NumState::None | NumState::Sign | NumState::Decimal | NumState::ExpE | NumState::ExpSign => {
                None
            }
            NumState::Digit0 if negative => Some(Peek::Number(text)), // "-0": preserve as NUMBER
            NumState::Digit0 => Some(Peek::Long(0)),
            NumState::Digit => {
                if !fits_in_long {
                    Some(Peek::Number(text))
                } else if negative {
                    Some(Peek::Long(value))
                } else {
                    match value.checked_neg() {
                        Some(v) => Some(Peek::Long(v)),
                        None => Some(Peek::Number(text)), // one past i64::MAX
                    }
                }
            }
            NumState::FractionDigit | NumState::ExpDigit => Some(Peek::Number(text)),
        };

        if result.is_some() {
            self.consume_n(offset)?;
        }
        Ok(result)
    }

    // -----------------------------------------------------------------
    // Keywords and unquoted literals
    // -----------------------------------------------------------------

    fn try_keyword(&mut self) -> JsonResult<Option<Peek>> {
        if self.matches_keyword("true")? {
            self.consume_n(4)?;
            return Ok(Some(Peek::Boolean(true)));
        }
        if self.matches_keyword("false")? {
            self.consume_n(5)?;
            return Ok(Some(Peek::Boolean(false)));
        }
        if self.matches_keyword("null")? {
            self.consume_n(4)?;
            return Ok(Some(Peek::Null));
        }
        Ok(None)
    }

    fn matches_keyword(&mut self, word: &str) -> JsonResult<bool> {
        let case_insensitive = self.strictness.accepts_legacy();
        let chars: Vec<char> = word.chars().collect();
        for (i, &wc) in chars.iter().enumerate() {
            match self.peek_char_at(i)? {
                Some(c) => {
                    let eq = if case_insensitive { c.eq_ignore_ascii_case(&wc) } else { c == wc };
                    if !eq {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        if let Some(next) = self.peek_char_at(chars.len())? {
            if !Self::is_literal_terminator(next) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn read_unquoted_literal(&mut self) -> JsonResult<String> {
        let mut s = String::new();
        loop {
            match self.peek_char0()? {
                Some(c) if !Self::is_literal_terminator(c) => {
                    s.push(c);
                    self.advance_char()?;
                }
                _ => break,
            }
        }
        if s.is_empty() {
            return Err(self.syntax_error("Expected value"));
        }
        Ok(s)
    }

    // -----------------------------------------------------------------
    // String decoding
    // -----------------------------------------------------------------

    fn read_quoted_string(&mut self, quote: char) -> JsonResult<String> {
        self.advance_char()?; // opening quote
        let mut s = String::new();
        loop {
            let c = self.advance_char().map_err(|_| self.syntax_error("Unterminated string"))?;
            if c == quote {
                break;
            }
            if c == '\\' {
                let esc =
                    self.advance_char().map_err(|_| self.syntax_error("Unterminated escape"))?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    '/' => s.push('/'),
                    'b' => s.push('\u{8}'),
                    'f' => s.push('\u{c}'),
                    'n' => s.push('\n'),
                    'r' => s.push('\r'),
                    't' => s.push('\t'),
                    'u' => {
                        let code = self.read_hex4()?;
                        if (0xD800..=0xDBFF).contains(&code) {
                            if let Some(low) = self.try_consume_low_surrogate()? {
                                let combined =
                                    0x10000 + (code - 0xD800) * 0x400 + (low - 0xDC00);
                                s.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                            } else {
                                s.push('\u{FFFD}');
                            }
                        } else if (0xDC00..=0xDFFF).contains(&code) {
                            s.push('\u{FFFD}'); // lone low surrogate
                        } else {
                            s.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                    }
                    '\'' if self.strictness.accepts_legacy() => s.push('\''),
                    '\n' if self.strictness.accepts_legacy() => s.push('\n'),
                    other => {
                        return Err(
                            self.syntax_error(format!("Invalid escape sequence: \\{}", other))
                        )
                    }
                }
            } else if (c as u32) < 0x20 {
                if self.strictness == Strictness::Strict {
                    return Err(self.syntax_error("Unescaped control character in string"));
                }
                s.push(c);
            } else {
                s.push(c);
            }
        }
        Ok(s)
    }

    fn read_hex4(&mut self) -> JsonResult<u32> {
        let mut code = 0u32;
        for _ in 0..4 {
            let h = self
                .advance_char()
                .map_err(|_| self.syntax_error("Unterminated unicode escape"))?;
            let d = h
                .to_digit(16)
                .ok_or_else(|| self.syntax_error("Malformed unicode escape"))?;
            code = code * 16 + d;
        }
        Ok(code)
    }

    fn try_consume_low_surrogate(&mut self) -> JsonResult<Option<u32>> {
        if self.peek_char_at(0)? != Some('\\') || self.peek_char_at(1)? != Some('u') {
            return Ok(None);
        }
        let mut code = 0u32;
        for i in 0..4 {
            match self.peek_char_at(2 + i)? {
                Some(h) => match h.to_digit(16) {
                    Some(d) => code = code * 16 + d,
                    None => return Ok(None),
                },
                None => return Ok(None),
            }
        }
        if !(0xDC00..=0xDFFF).contains(&code) {
            return Ok(None);
        }
        self.consume_n(6)?;
        Ok(Some(code))
    }

    // -----------------------------------------------------------------
    // Path bookkeeping
    // -----------------------------------------------------------------

    fn set_path_name(&mut self, depth: usize, name: Option<String>) {
        if depth >= self.path_names.len() {
            self.path_names.resize(depth + 1, None);
        }
        self.path_names[depth] = name;
    }

    fn bump_parent_array_index(&mut self) {
        if let Some(&top) = self.stack.last() {
            if top.is_array() {
                let depth = self.stack.len() - 1;
                if depth >= self.path_indices.len() {
                    self.path_indices.resize(depth + 1, 0);
                }
                self.path_indices[depth] += 1;
            }
        }
    }

    fn finish_value(&mut self) {
        self.peeked = Peek::None;
        self.bump_parent_array_index();
    }

    /// JSONPath to the position of the next (not yet consumed) token.
    pub fn get_path(&self) -> String {
        build_path(&self.stack, &self.path_names, &self.path_indices, false)
    }

    /// JSONPath to the position of the last consumed token.
    pub fn get_previous_path(&self) -> String {
        build_path(&self.stack, &self.path_names, &self.path_indices, true)
    }

    // -----------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------

    pub fn peek(&mut self) -> JsonResult<TokenKind> {
        self.do_peek()
    }

    pub fn has_next(&mut self) -> JsonResult<bool> {
        let kind = self.do_peek()?;
        Ok(!matches!(kind, TokenKind::EndObject | TokenKind::EndArray | TokenKind::EndDocument))
    }

    pub fn begin_array(&mut self) -> JsonResult<()> {
        self.do_peek()?;
        match self.peeked {
            Peek::BeginArray => {
                self.peeked = Peek::None;
                Ok(())
            }
            _ => Err(self.structural_error("Expected BEGIN_ARRAY")),
        }
    }

    pub fn end_array(&mut self) -> JsonResult<()> {
        self.do_peek()?;
        match self.peeked {
            Peek::EndArray => {
                self.peeked = Peek::None;
                self.stack.pop();
                self.bump_parent_array_index();
                Ok(())
            }
            _ => Err(self.structural_error("Expected END_ARRAY")),
        }
    }

    pub fn begin_object(&mut self) -> JsonResult<()> {
        self.do_peek()?;
        match self.peeked {
            Peek::BeginObject => {
                self.peeked = Peek::None;
                Ok(())
            }
            _ => Err(self.structural_error("Expected BEGIN_OBJECT")),
        }
    }

    pub fn end_object(&mut self) -> JsonResult<()> {
        self.do_peek()?;
        match self.peeked {
            Peek::EndObject => {
                self.peeked = Peek::None;
                self.stack.pop();
                self.bump_parent_array_index();
                Ok(())
            }
            _ => Err(self.structural_error("Expected END_OBJECT")),
        }
    }

    pub fn next_name(&mut self) -> JsonResult<String> {
        self.do_peek()?;
        let depth = self.stack.len() - 1;
        match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::NameDoubleQuoted(s) | Peek::NameSingleQuoted(s) | Peek::NameUnquoted(s) => {
                self.set_path_name(depth, Some(s.clone()));
                Ok(s)
            }
            other => {
                self.peeked = other;
                Err(self.structural_error("Expected a name"))
            }
        }
    }

    pub fn next_null(&mut self) -> JsonResult<()> {
        self.do_peek()?;
        match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::Null => {
                self.bump_parent_array_index();
                Ok(())
            }
            other => {
                self.peeked = other;
                Err(self.structural_error("Expected null"))
            }
        }
    }

    pub fn next_boolean(&mut self) -> JsonResult<bool> {
        self.do_peek()?;
        match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::Boolean(b) => {
                self.bump_parent_array_index();
                Ok(b)
            }
            other => {
                self.peeked = other;
                Err(self.structural_error("Expected a boolean"))
            }
        }
    }

    pub fn next_string(&mut self) -> JsonResult<String> {
        self.do_peek()?;
        let result = match &self.peeked {
            Peek::StringDoubleQuoted(s)
            | Peek::StringSingleQuoted(s)
            | Peek::StringUnquoted(s)
            | Peek::Buffered(s) => s.clone(),
            Peek::Long(v) => v.to_string(),
            Peek::Number(text) => text.clone(),
            _ => return Err(self.structural_error("Expected a string")),
        };
        self.finish_value();
        Ok(result)
    }

    pub fn next_double(&mut self) -> JsonResult<f64> {
        self.do_peek()?;
        let value = match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::Long(v) => v as f64,
            Peek::Number(text) => self.parse_f64(&text)?,
            Peek::StringDoubleQuoted(s)
            | Peek::StringSingleQuoted(s)
            | Peek::StringUnquoted(s)
            | Peek::Buffered(s) => self.parse_f64(&s)?,
            other => {
                self.peeked = other;
                return Err(self.structural_error("Expected a number"));
            }
        };
        if !self.strictness.is_lenient() && (value.is_nan() || value.is_infinite()) {
            return Err(self.syntax_error("NaN and Infinity are not permitted in this dialect"));
        }
        self.bump_parent_array_index();
        Ok(value)
    }

    fn parse_f64(&self, text: &str) -> JsonResult<f64> {
        match text.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse().map_err(|_| self.syntax_error(format!("Malformed number: {}", text))),
        }
    }

    pub fn next_long(&mut self) -> JsonResult<i64> {
        self.do_peek()?;
        match &self.peeked {
            Peek::Long(v) => {
                let v = *v;
                self.bump_parent_array_index();
                self.peeked = Peek::None;
                Ok(v)
            }
            _ => {
                let text = match std::mem::replace(&mut self.peeked, Peek::None) {
                    Peek::Number(t) => t,
                    Peek::StringDoubleQuoted(s)
                    | Peek::StringSingleQuoted(s)
                    | Peek::StringUnquoted(s)
                    | Peek::Buffered(s) => s,
                    other => {
                        self.peeked = other;
                        return Err(self.structural_error("Expected a long"));
                    }
                };
                self.bump_parent_array_index();
                if let Ok(v) = text.trim().parse::<i64>() {
                    return Ok(v);
                }
                let d = self.parse_f64(&text)?;
                let v = d as i64;
                if v as f64 != d {
                    return Err(self.syntax_error(format!("Expected a long but was {}", text)));
                }
                Ok(v)
            }
        }
    }

    pub fn next_int(&mut self) -> JsonResult<i32> {
        self.do_peek()?;
        match &self.peeked {
            Peek::Long(v) => {
                let v = *v;
                self.bump_parent_array_index();
                self.peeked = Peek::None;
                i32::try_from(v)
                    .map_err(|_| self.syntax_error(format!("Number out of i32 range: {}", v)))
            }
            _ => {
                let text = match std::mem::replace(&mut self.peeked, Peek::None) {
                    Peek::Number(t) => t,
                    Peek::StringDoubleQuoted(s)
                    | Peek::StringSingleQuoted(s)
                    | Peek::StringUnquoted(s)
                    | Peek::Buffered(s) => s,
                    other => {
                        self.peeked = other;
                        return Err(self.structural_error("Expected an int"));
                    }
                };
                self.bump_parent_array_index();
                if let Ok(v) = text.trim().parse::<i32>() {
                    return Ok(v);
                }
                let d = self.parse_f64(&text)?;
                let v = d as i32;
                if v as f64 != d {
                    return Err(self.syntax_error(format!("Expected an int but was {}", text)));
                }
                Ok(v)
            }
        }
    }

    /// Re-classifies the pending `NAME` peek as a same-content value peek
    /// without moving the cursor — the only supported external mutation
    /// of the pending peek, used by map-key adapters that need to read a
    /// just-scanned name as if it were a string value.
    pub fn promote_name_to_value(&mut self) -> JsonResult<()> {
        match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::NameDoubleQuoted(s) | Peek::NameSingleQuoted(s) | Peek::NameUnquoted(s) => {
                self.peeked = Peek::Buffered(s);
                Ok(())
            }
            other => {
                self.peeked = other;
                Err(self.structural_error("promote_name_to_value requires a pending NAME peek"))
            }
        }
    }

    pub fn skip_value(&mut self) -> JsonResult<()> {
        if self.do_peek()? == TokenKind::EndDocument {
            return Ok(());
        }
        let mut count: i64 = 0;
        loop {
            let kind = self.do_peek()?;
            match kind {
                TokenKind::BeginArray => {
                    self.begin_array()?;
                    count += 1;
                }
                TokenKind::BeginObject => {
                    self.begin_object()?;
                    count += 1;
                }
                TokenKind::EndArray => {
                    self.end_array()?;
                    count -= 1;
                }
                TokenKind::EndObject => {
                    self.end_object()?;
                    count -= 1;
                }
                TokenKind::Name => {
                    let depth = self.stack.len() - 1;
                    self.peeked = Peek::None;
                    self.set_path_name(depth, Some("<skipped>".to_string()));
                }
                TokenKind::EndDocument => break,
                _ => {
                    self.peeked = Peek::None;
                    self.bump_parent_array_index();
                }
            }
            if count == 0 {
                break;
            }
        }
        Ok(())
    }

    pub fn close(&mut self) -> JsonResult<()> {
        self.peeked = Peek::None;
        self.stack.clear();
        self.stack.push(Scope::Closed);
        Ok(())
    }

    /// Optional streaming-string capability: returns a bounded lazy
    /// character iterator over the next string value, with explicit
    /// end-of-value detection so the outer reader can resume once the
    /// iterator is drained.
    pub fn next_string_stream(&mut self) -> JsonResult<StringValueReader<'_, S>> {
        self.do_peek()?;
        let s = match std::mem::replace(&mut self.peeked, Peek::None) {
            Peek::StringDoubleQuoted(s)
            | Peek::StringSingleQuoted(s)
            | Peek::StringUnquoted(s)
            | Peek::Buffered(s) => s,
            other => {
                self.peeked = other;
                return Err(self.structural_error("Expected a string"));
            }
        };
        Ok(StringValueReader { reader: self, chars: s.chars().collect::<Vec<_>>().into_iter(), finished: false })
    }
}

/// A bounded lazy character sequence over a single already-resolved
/// string value (see [`Reader::next_string_stream`]). Draining the
/// iterator fully is equivalent to calling `next_string`.
pub struct StringValueReader<'r, S: JsonSource> {
    reader: &'r mut Reader<S>,
    chars: std::vec::IntoIter<char>,
    finished: bool,
}

impl<'r, S: JsonSource> StringValueReader<'r, S> {
    pub fn is_end_of_value(&self) -> bool {
        self.finished
    }
}

impl<'r, S: JsonSource> Iterator for StringValueReader<'r, S> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self.chars.next() {
            Some(c) => Some(c),
            None => {
                if !self.finished {
                    self.finished = true;
                    self.reader.finish_value();
                }
                None
            }
        }
    }
}
