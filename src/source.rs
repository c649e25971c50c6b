//! Character source and sink abstractions.
//!
//! The reader pulls from a [`JsonSource`]; the writer pushes to a
//! [`JsonSink`]. Both are plain pull/push interfaces with no seek and no
//! mark/reset. This module also provides the reference implementations
//! every caller actually reaches for: an in-memory slice source, a
//! `std::io::Read` adapter, and `String`/`std::io::Write` sinks.

use std::io;

/// A pull source of characters. `fill` writes as many characters as are
/// available (up to `buf.len()`) starting at `buf[0]` and returns how
/// many were written; `Ok(0)` signals EOF.
pub trait JsonSource {
    fn fill(&mut self, buf: &mut [char]) -> io::Result<usize>;
}

/// A push sink for characters, spans, and strings, with a flush signal.
pub trait JsonSink {
    fn write_char(&mut self, c: char) -> io::Result<()>;

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        for c in s.chars() {
            self.write_char(c)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()>;
}

/// Source over an in-memory string slice — the common case where the
/// whole document is already resident.
pub struct SliceSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> SliceSource<'a> {
    pub fn new(input: &'a str) -> Self {
        SliceSource { chars: input.chars() }
    }
}

impl<'a> JsonSource for SliceSource<'a> {
    fn fill(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.chars.next() {
                Some(c) => {
                    buf[n] = c;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// Source adapting a byte-oriented `std::io::Read`. Decoding bytes to
/// characters happens once here, at the boundary; the reader proper never
/// sees a byte, consistent with the crate's non-goal of doing UTF-8
/// byte-level decoding itself.
pub struct ReadSource<R: io::Read> {
    inner: R,
    pending: Vec<u8>,
}

impl<R: io::Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner, pending: Vec::new() }
    }
}

impl<R: io::Read> JsonSource for ReadSource<R> {
    fn fill(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        let mut byte = [0u8; 1];
        while n < buf.len() {
            if !self.pending.is_empty() {
                if let Ok(s) = std::str::from_utf8(&self.pending) {
                    if let Some(c) = s.chars().next() {
                        buf[n] = c;
                        n += 1;
                        self.pending.clear();
                        continue;
                    }
                }
            }
            let read = self.inner.read(&mut byte)?;
            if read == 0 {
                if self.pending.is_empty() {
                    break;
                }
                return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated UTF-8 sequence"));
            }
            self.pending.push(byte[0]);
            if std::str::from_utf8(&self.pending).is_ok() {
                let c = std::str::from_utf8(&self.pending).unwrap().chars().next().unwrap();
                buf[n] = c;
                n += 1;
                self.pending.clear();
            } else if self.pending.len() >= 4 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 sequence"));
            }
        }
        Ok(n)
    }
}

/// Sink writing into an owned `String`.
#[derive(Default)]
pub struct StringSink {
    pub buffer: String,
}

impl StringSink {
    pub fn new() -> Self {
        StringSink::default()
    }

    pub fn into_inner(self) -> String {
        self.buffer
    }
}

impl JsonSink for StringSink {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        self.buffer.push(c);
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.buffer.push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink adapting a byte-oriented `std::io::Write`.
pub struct IoSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        IoSink { inner }
    }
}

impl<W: io::Write> JsonSink for IoSink<W> {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        self.inner.write_all(c.encode_utf8(&mut buf).as_bytes())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.inner.write_all(s.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_fills_in_chunks() {
        let mut src = SliceSource::new("hello");
        let mut buf = ['\0'; 3];
        assert_eq!(src.fill(&mut buf).unwrap(), 3);
        assert_eq!(&buf, &['h', 'e', 'l']);
        assert_eq!(src.fill(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &['l', 'o']);
        assert_eq!(src.fill(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_source_decodes_multibyte_utf8() {
        let mut src = ReadSource::new("a\u{00e9}b".as_bytes());
        let mut buf = ['\0'; 8];
        let n = src.fill(&mut buf).unwrap();
        let s: String = buf[..n].iter().collect();
        assert_eq!(s, "a\u{00e9}b");
    }

    #[test]
    fn string_sink_accumulates() {
        let mut sink = StringSink::new();
        sink.write_str("foo").unwrap();
        sink.write_char('!').unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.into_inner(), "foo!");
    }
}
