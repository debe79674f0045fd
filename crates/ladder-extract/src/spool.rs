//! [`Spool`] — a write-once, read-many temporary file.

use std::{
  fs::File,
  io::{self, BufReader, Read, Seek, SeekFrom, Write},
};

use ladder_core::fetch::Envelope;

use crate::{ENVELOPE_SKIP, RECORDS_PATH, Records, Result, envelope};

const READ_BUFFER: usize = 64 * 1024;

/// A downloaded payload parked in an anonymous temporary file so that it can
/// be scanned from the start any number of times. The file is removed by
/// the OS once the spool is dropped.
///
/// All writes must happen before the first call to [`Spool::reader`].
#[derive(Debug)]
pub struct Spool {
  file: File,
  len:  u64,
}

impl Spool {
  pub fn new() -> io::Result<Self> {
    Ok(Self { file: tempfile::tempfile()?, len: 0 })
  }

  /// Spool everything `reader` yields.
  pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
    let mut spool = Self::new()?;
    io::copy(&mut reader, &mut spool)?;
    Ok(spool)
  }

  /// Bytes written so far.
  pub fn len(&self) -> u64 { self.len }

  pub fn is_empty(&self) -> bool { self.len == 0 }

  /// A fresh buffered reader positioned at the start of the payload.
  ///
  /// Readers share the underlying file cursor, so only one pass should be
  /// in progress at a time.
  pub fn reader(&self) -> io::Result<BufReader<File>> {
    let mut file = self.file.try_clone()?;
    file.seek(SeekFrom::Start(0))?;
    Ok(BufReader::with_capacity(READ_BUFFER, file))
  }

  /// First pass: everything except the user list.
  pub fn envelope(&self) -> Result<Envelope> {
    envelope(self.reader()?, ENVELOPE_SKIP)
  }

  /// Second pass: the user list, one record at a time.
  pub fn records(&self) -> Result<Records<BufReader<File>>> {
    Ok(Records::new(self.reader()?, RECORDS_PATH))
  }
}

impl Write for Spool {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let n = self.file.write(buf)?;
    self.len += n as u64;
    Ok(n)
  }

  fn flush(&mut self) -> io::Result<()> { self.file.flush() }
}
