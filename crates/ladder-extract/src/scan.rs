//! Byte-level JSON scanner.
//!
//! The scanner validates JSON structure while walking it, one byte at a time,
//! over any [`BufRead`]. A value can either be skipped (nothing retained) or
//! captured (its raw bytes copied out for `serde_json` to decode). Only the
//! value being captured is ever held in memory.

use std::io::BufRead;

use crate::{Error, Result};

/// Nesting limit, matching `serde_json`'s default recursion limit.
const MAX_DEPTH: usize = 128;

pub(crate) struct Scanner<R> {
  reader:  R,
  offset:  u64,
  capture: Option<Vec<u8>>,
}

impl<R: BufRead> Scanner<R> {
  pub fn new(reader: R) -> Self { Self { reader, offset: 0, capture: None } }

  pub fn error(&self, message: impl Into<String>) -> Error {
    Error::Malformed { offset: self.offset, message: message.into() }
  }

  // ── Bytes ─────────────────────────────────────────────────────────────────

  pub fn peek(&mut self) -> Result<Option<u8>> {
    Ok(self.reader.fill_buf()?.first().copied())
  }

  /// Consume and return the next byte, failing at end of input.
  pub fn bump(&mut self) -> Result<u8> {
    let Some(b) = self.peek()? else {
      return Err(self.error("unexpected end of input"));
    };
    self.reader.consume(1);
    self.offset += 1;
    if let Some(buf) = &mut self.capture {
      buf.push(b);
    }
    Ok(b)
  }

  /// Skip whitespace and peek at the next significant byte.
  pub fn skip_ws(&mut self) -> Result<Option<u8>> {
    loop {
      match self.peek()? {
        Some(b' ' | b'\t' | b'\n' | b'\r') => {
          self.bump()?;
        }
        other => return Ok(other),
      }
    }
  }

  /// Skip whitespace, then require `expected`.
  pub fn expect(&mut self, expected: u8) -> Result<()> {
    match self.skip_ws()? {
      Some(b) if b == expected => {
        self.bump()?;
        Ok(())
      }
      Some(b) => Err(self.error(format!(
        "expected {:?}, found {:?}",
        expected as char, b as char
      ))),
      None => Err(self.error(format!("expected {:?}, found end of input", expected as char))),
    }
  }

  /// Require that nothing but whitespace remains.
  pub fn finish(&mut self) -> Result<()> {
    match self.skip_ws()? {
      None => Ok(()),
      Some(_) => Err(self.error("trailing characters after document")),
    }
  }

  // ── Capture ───────────────────────────────────────────────────────────────

  /// Run `f`, returning every byte it consumed. Nested captures are also
  /// appended to the enclosing capture.
  fn captured(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<Vec<u8>> {
    let outer = self.capture.replace(Vec::new());
    let result = f(self);
    let buf = std::mem::replace(&mut self.capture, outer).unwrap_or_default();
    if let Some(outer) = &mut self.capture {
      outer.extend_from_slice(&buf);
    }
    result.map(|()| buf)
  }

  /// Capture the next value's raw bytes.
  pub fn capture_value(&mut self) -> Result<Vec<u8>> {
    self.skip_ws()?;
    self.captured(|s| s.value(0))
  }

  /// Read an object key and decode it.
  pub fn key(&mut self) -> Result<String> {
    match self.skip_ws()? {
      Some(b'"') => {}
      _ => return Err(self.error("expected object key")),
    }
    let raw = self.captured(|s| s.string())?;
    Ok(serde_json::from_slice(&raw)?)
  }

  /// Consume an object member separator. Returns `false` at the closing
  /// brace (or bracket), `true` when another member follows.
  pub fn more(&mut self, close: u8) -> Result<bool> {
    match self.skip_ws()? {
      Some(b',') => {
        self.bump()?;
        Ok(true)
      }
      Some(b) if b == close => {
        self.bump()?;
        Ok(false)
      }
      Some(b) => Err(self.error(format!(
        "expected ',' or {:?}, found {:?}",
        close as char, b as char
      ))),
      None => Err(self.error("unexpected end of input")),
    }
  }

  // ── Values ────────────────────────────────────────────────────────────────

  /// Walk one complete value without retaining it.
  pub fn skip_value(&mut self) -> Result<()> {
    self.skip_ws()?;
    self.value(0)
  }

  fn value(&mut self, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
      return Err(self.error("recursion limit exceeded"));
    }
    match self.peek()? {
      Some(b'{') => {
        self.bump()?;
        if self.skip_ws()? == Some(b'}') {
          self.bump()?;
          return Ok(());
        }
        loop {
          if self.skip_ws()? != Some(b'"') {
            return Err(self.error("expected object key"));
          }
          self.string()?;
          self.expect(b':')?;
          self.skip_ws()?;
          self.value(depth + 1)?;
          if !self.more(b'}')? {
            return Ok(());
          }
        }
      }
      Some(b'[') => {
        self.bump()?;
        if self.skip_ws()? == Some(b']') {
          self.bump()?;
          return Ok(());
        }
        loop {
          self.skip_ws()?;
          self.value(depth + 1)?;
          if !self.more(b']')? {
            return Ok(());
          }
        }
      }
      Some(b'"') => self.string(),
      Some(b't') => self.literal(b"true"),
      Some(b'f') => self.literal(b"false"),
      Some(b'n') => self.literal(b"null"),
      Some(b'-' | b'0'..=b'9') => self.number(),
      Some(b) => Err(self.error(format!("unexpected character {:?}", b as char))),
      None => Err(self.error("unexpected end of input")),
    }
  }

  fn string(&mut self) -> Result<()> {
    self.bump()?;
    loop {
      match self.bump()? {
        b'"' => return Ok(()),
        b'\\' => match self.bump()? {
          b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => {}
          b'u' => {
            for _ in 0..4 {
              if !self.bump()?.is_ascii_hexdigit() {
                return Err(self.error("invalid unicode escape"));
              }
            }
          }
          _ => return Err(self.error("invalid escape")),
        },
        0x00..=0x1f => return Err(self.error("control character in string")),
        _ => {}
      }
    }
  }

  fn literal(&mut self, word: &'static [u8]) -> Result<()> {
    for &expected in word {
      if self.bump()? != expected {
        return Err(self.error("invalid literal"));
      }
    }
    Ok(())
  }

  fn digits(&mut self) -> Result<usize> {
    let mut n = 0;
    while let Some(b'0'..=b'9') = self.peek()? {
      self.bump()?;
      n += 1;
    }
    Ok(n)
  }

  fn number(&mut self) -> Result<()> {
    if self.peek()? == Some(b'-') {
      self.bump()?;
    }
    match self.peek()? {
      Some(b'0') => {
        self.bump()?;
      }
      Some(b'1'..=b'9') => {
        self.digits()?;
      }
      _ => return Err(self.error("invalid number")),
    }
    if self.peek()? == Some(b'.') {
      self.bump()?;
      if self.digits()? == 0 {
        return Err(self.error("invalid number"));
      }
    }
    if let Some(b'e' | b'E') = self.peek()? {
      self.bump()?;
      if let Some(b'+' | b'-') = self.peek()? {
        self.bump()?;
      }
      if self.digits()? == 0 {
        return Err(self.error("invalid number"));
      }
    }
    Ok(())
  }
}
