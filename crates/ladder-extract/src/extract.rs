//! The two extraction passes over a payload.
//!
//! Paths are lists of object keys. The segment [`ITEM`] stands for "every
//! element of the array here", so `data.users.item` names each user object.

use std::io::BufRead;

use ladder_core::{fetch::Envelope, user::RawUser};
use serde_json::{Map, Value};

use crate::{Error, Result, scan::Scanner};

/// Path segment matching every element of an array.
pub const ITEM: &str = "item";

/// Members under this prefix are not part of the envelope.
pub const ENVELOPE_SKIP: &[&str] = &["data"];

/// Where the user records live.
pub const RECORDS_PATH: &[&str] = &["data", "users", ITEM];

// ─── Skip by prefix ──────────────────────────────────────────────────────────

/// Read the top-level object of a document, leaving out every subtree whose
/// path begins with `skip`. Skipped subtrees are still validated but never
/// materialized.
pub fn envelope<R: BufRead>(reader: R, skip: &[&str]) -> Result<Envelope> {
  let mut scanner = Scanner::new(reader);
  match scanner.skip_ws()? {
    Some(b'{') => {}
    _ => return Err(Error::EmptyEnvelope),
  }

  let mut path = Vec::new();
  let top = collect(&mut scanner, &mut path, skip)?.unwrap_or(Value::Null);
  scanner.finish()?;

  Ok(serde_json::from_value(top)?)
}

fn collect<R: BufRead>(
  scanner: &mut Scanner<R>,
  path: &mut Vec<String>,
  skip: &[&str],
) -> Result<Option<Value>> {
  if path.len() >= skip.len() && path.iter().zip(skip).all(|(a, b)| a == b) {
    scanner.skip_value()?;
    return Ok(None);
  }

  // Only containers on the way to `skip` need to be walked member by
  // member; anything else is captured whole.
  let on_skip_path = path.iter().zip(skip).all(|(a, b)| a == b);
  match scanner.skip_ws()? {
    Some(b'{') if on_skip_path => {
      scanner.bump()?;
      let mut map = Map::new();
      if scanner.skip_ws()? == Some(b'}') {
        scanner.bump()?;
        return Ok(Some(Value::Object(map)));
      }
      loop {
        let key = scanner.key()?;
        scanner.expect(b':')?;
        path.push(key);
        let value = collect(scanner, path, skip)?;
        let key = path.pop().unwrap_or_default();
        if let Some(value) = value {
          map.insert(key, value);
        }
        if !scanner.more(b'}')? {
          return Ok(Some(Value::Object(map)));
        }
      }
    }
    Some(b'[') if on_skip_path => {
      scanner.bump()?;
      let mut items = Vec::new();
      if scanner.skip_ws()? == Some(b']') {
        scanner.bump()?;
        return Ok(Some(Value::Array(items)));
      }
      loop {
        path.push(ITEM.to_owned());
        let value = collect(scanner, path, skip)?;
        path.pop();
        items.extend(value);
        if !scanner.more(b']')? {
          return Ok(Some(Value::Array(items)));
        }
      }
    }
    _ => {
      let raw = scanner.capture_value()?;
      Ok(Some(serde_json::from_slice(&raw)?))
    }
  }
}

// ─── Select by path ──────────────────────────────────────────────────────────

enum State {
  Start,
  Items { first: bool },
  Done,
}

/// Lazily yields every object at a path ending in [`ITEM`].
///
/// A document in which the path does not exist yields nothing. The first
/// error ends the sequence.
pub struct Records<R> {
  scanner: Scanner<R>,
  path:    &'static [&'static str],
  state:   State,
}

impl<R: BufRead> Records<R> {
  pub fn new(reader: R, path: &'static [&'static str]) -> Self {
    Self { scanner: Scanner::new(reader), path, state: State::Start }
  }

  /// Position the scanner just inside the target array. Returns `false` when
  /// the path is absent.
  fn seek(&mut self) -> Result<bool> {
    match self.scanner.skip_ws()? {
      Some(b'{') => descend(&mut self.scanner, self.path),
      _ => Err(Error::EmptyEnvelope),
    }
  }

  fn next_record(&mut self, first: bool) -> Result<Option<RawUser>> {
    let sc = &mut self.scanner;
    if first {
      if sc.skip_ws()? == Some(b']') {
        sc.bump()?;
        return Ok(None);
      }
    } else if !sc.more(b']')? {
      return Ok(None);
    }

    if sc.skip_ws()? != Some(b'{') {
      return Err(sc.error("record is not an object"));
    }
    let raw = sc.capture_value()?;
    Ok(Some(serde_json::from_slice(&raw)?))
  }
}

/// Walk down `path` from just before a value.
///
/// A final [`ITEM`] segment matches a literal `item` key holding an array
/// (`users: {item: [...]}`) or, when the parent value is itself an array,
/// that array's elements (`users: [...]`).
fn descend<R: BufRead>(scanner: &mut Scanner<R>, path: &[&str]) -> Result<bool> {
  let Some((segment, rest)) = path.split_first() else {
    return Ok(false);
  };

  match scanner.skip_ws()? {
    Some(b'[') if *segment == ITEM && rest.is_empty() => {
      scanner.bump()?;
      return Ok(true);
    }
    Some(b'{') => {}
    _ => return Ok(false),
  }

  scanner.bump()?;
  if scanner.skip_ws()? == Some(b'}') {
    return Ok(false);
  }
  loop {
    let key = scanner.key()?;
    scanner.expect(b':')?;
    if key == *segment {
      if rest.is_empty() {
        return enter_array(scanner);
      }
      return descend(scanner, rest);
    }
    scanner.skip_value()?;
    if !scanner.more(b'}')? {
      return Ok(false);
    }
  }
}

/// Step inside the array that follows, if the next value is one.
fn enter_array<R: BufRead>(scanner: &mut Scanner<R>) -> Result<bool> {
  if scanner.skip_ws()? != Some(b'[') {
    return Ok(false);
  }
  scanner.bump()?;
  Ok(true)
}

impl<R: BufRead> Iterator for Records<R> {
  type Item = Result<RawUser>;

  fn next(&mut self) -> Option<Self::Item> {
    let first = match self.state {
      State::Done => return None,
      State::Items { .. } => false,
      State::Start => match self.seek() {
        Ok(true) => true,
        Ok(false) => {
          self.state = State::Done;
          return None;
        }
        Err(e) => {
          self.state = State::Done;
          return Some(Err(e));
        }
      },
    };

    match self.next_record(first) {
      Ok(Some(record)) => {
        self.state = State::Items { first: false };
        Some(Ok(record))
      }
      Ok(None) => {
        self.state = State::Done;
        None
      }
      Err(e) => {
        self.state = State::Done;
        Some(Err(e))
      }
    }
  }
}
