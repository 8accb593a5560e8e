//! Forward-only reader with position tracking

use std::io::{self, Read};

use crate::{CaptureError, Result};

/// Wraps a non-seekable source and counts consumed bytes
///
/// Moving forward discards input. Moving backward is impossible for a pipe or
/// socket, so it is rejected with [`CaptureError::UnsupportedBackwardSeek`].
pub struct ForwardReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ForwardReader<R> {
    /// Wrap a source positioned at offset zero
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to an absolute offset at or after the current position
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedBackwardSeek` if `offset` was already passed, or
    /// `Truncated` if the source ends before `offset`
    pub fn seek_to(&mut self, offset: u64) -> Result<u64> {
        if offset < self.position {
            return Err(CaptureError::UnsupportedBackwardSeek {
                requested: offset,
                position: self.position,
            });
        }
        self.skip(offset - self.position)?;
        Ok(self.position)
    }

    /// Discard exactly `count` bytes
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if the source ends early
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let start = self.position;
        let skipped = io::copy(&mut self.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(CaptureError::Truncated {
                offset: start,
                needed: count,
                available: skipped,
            });
        }
        Ok(())
    }

    /// Fill `buf` completely, or report how many bytes were available
    ///
    /// Returns `Ok(0)` only when the source was already exhausted.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if the source ends part-way through `buf`
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = self.position;
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled != 0 && filled < buf.len() {
            return Err(CaptureError::Truncated {
                offset: start,
                needed: buf.len() as u64,
                available: filled as u64,
            });
        }
        Ok(filled)
    }
}

impl<R: Read> Read for ForwardReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}
