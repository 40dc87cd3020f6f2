//! Spooled byte buffer backing stream interfaces.
//!
//! Content stays in memory until it grows past the spool threshold, then
//! spills to an anonymous temporary file. Appends always land at the end of
//! the buffer while readers keep their own cursor, so a reader that already
//! consumed part of the stream sees newly appended lines on its next read.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

/// Size in bytes above which a stream spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1024 * 1024;

pub struct StreamBuffer {
  spool: SpooledTempFile,
  threshold: usize,
  cursor: u64,
}

impl StreamBuffer {
  pub fn new() -> Self {
    Self::with_threshold(DEFAULT_SPOOL_THRESHOLD)
  }

  pub fn with_threshold(threshold: usize) -> Self {
    Self {
      spool: SpooledTempFile::new(threshold),
      threshold,
      cursor: 0,
    }
  }

  /// Append bytes at the end of the stream. The read cursor is not moved.
  pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
    self.spool.seek(SeekFrom::End(0))?;
    self.spool.write_all(data)?;
    self.spool.flush()
  }

  /// Read everything between the read cursor and the end, advancing the cursor.
  pub fn read_to_string(&mut self) -> io::Result<String> {
    self.spool.seek(SeekFrom::Start(self.cursor))?;
    let mut buf = Vec::new();
    let read = self.spool.read_to_end(&mut buf)?;
    self.cursor += read as u64;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
  }

  /// Move the read cursor back to the start of the stream.
  pub fn rewind(&mut self) {
    self.cursor = 0;
  }

  /// Full content from the beginning. The read cursor is left untouched.
  pub fn contents(&mut self) -> io::Result<Vec<u8>> {
    self.spool.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    self.spool.read_to_end(&mut buf)?;
    Ok(buf)
  }

  pub fn len(&mut self) -> io::Result<u64> {
    self.spool.seek(SeekFrom::End(0))
  }

  pub fn is_empty(&mut self) -> io::Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Whether the content has spilled over to a temporary file.
  pub fn is_spilled(&self) -> bool {
    self.spool.is_rolled()
  }

  /// Release the backing storage. The buffer is empty afterwards.
  pub fn close(&mut self) {
    self.spool = SpooledTempFile::new(self.threshold);
    self.cursor = 0;
  }
}

impl Default for StreamBuffer {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for StreamBuffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StreamBuffer")
      .field("threshold", &self.threshold)
      .field("cursor", &self.cursor)
      .field("spilled", &self.spool.is_rolled())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_append_keeps_reader_position() {
    let mut stream = StreamBuffer::new();
    stream.append(b"first\n").unwrap();
    assert_eq!(stream.read_to_string().unwrap(), "first\n");

    stream.append(b"second\n").unwrap();
    assert_eq!(stream.read_to_string().unwrap(), "second\n");
    assert_eq!(stream.read_to_string().unwrap(), "");

    stream.rewind();
    assert_eq!(stream.read_to_string().unwrap(), "first\nsecond\n");
  }

  #[test]
  fn test_spills_above_threshold() {
    let mut stream = StreamBuffer::with_threshold(8);
    stream.append(b"tiny").unwrap();
    assert!(!stream.is_spilled());

    stream.append(b"over the threshold").unwrap();
    assert!(stream.is_spilled());
    assert_eq!(stream.contents().unwrap(), b"tinyover the threshold");
  }

  #[test]
  fn test_close_releases_content() {
    let mut stream = StreamBuffer::with_threshold(4);
    stream.append(b"spilled content").unwrap();
    stream.close();

    assert!(stream.is_empty().unwrap());
    assert!(!stream.is_spilled());
  }
}
