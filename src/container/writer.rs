//! Append-only chunk writer

use std::io::Write;

use tracing::debug;

use super::{ChunkHeader, ChunkTag};
use crate::{CaptureError, Result};

/// Appends chunks to a byte sink
///
/// Every chunk is flushed as soon as it is written, so a reader never sees a
/// half-buffered chunk boundary because of this writer.
pub struct ChunkWriter<W: Write> {
    inner: W,
    chunk_count: usize,
    octets_written: u64,
}

impl<W: Write> ChunkWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            chunk_count: 0,
            octets_written: 0,
        }
    }

    /// Append one chunk
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit the length field or the write fails
    pub fn write_chunk(&mut self, tag: ChunkTag, payload: &[u8]) -> Result<()> {
        self.write_chunk_parts(tag, &[payload])
    }

    /// Append one chunk whose payload is the concatenation of `parts`
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit the length field or the write fails
    pub fn write_chunk_parts(&mut self, tag: ChunkTag, parts: &[&[u8]]) -> Result<()> {
        let size: usize = parts.iter().map(|part| part.len()).sum();
        let octet_count = u32::try_from(size).map_err(|_| CaptureError::DataTooLarge {
            size,
            limit: u32::MAX as usize,
        })?;

        let header = ChunkHeader { tag, octet_count };
        self.inner.write_all(&header.encode())?;
        for part in parts {
            self.inner.write_all(part)?;
        }
        self.inner.flush()?;

        self.chunk_count += 1;
        self.octets_written += header.chunk_size();

        debug!("Wrote chunk '{}' ({} bytes)", tag, octet_count);

        Ok(())
    }

    /// Number of chunks written so far
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Total bytes written so far, headers included
    #[must_use]
    pub fn octets_written(&self) -> u64 {
        self.octets_written
    }

    /// Flush and hand back the sink
    ///
    /// # Errors
    ///
    /// Returns error if flush fails
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
