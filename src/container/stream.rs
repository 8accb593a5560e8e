//! Forward-only chunk parser

use std::io::Read;

use bytes::Bytes;
use tracing::debug;

use super::{ChunkHeader, ChunkTag, ForwardReader, CHUNK_HEADER_SIZE};
use crate::{CaptureError, Result};

/// Parses chunks from a source that cannot rewind
///
/// The header of the next chunk is read ahead on demand and held as pending
/// until its payload is consumed or skipped.
pub struct ChunkStream<R> {
    reader: ForwardReader<R>,
    pending: Option<ChunkHeader>,
    exhausted: bool,
    chunks_consumed: usize,
    max_chunk_octets: u32,
}

impl<R: Read> ChunkStream<R> {
    /// Wrap a forward-only source
    pub fn new(source: R, max_chunk_octets: u32) -> Self {
        Self {
            reader: ForwardReader::new(source),
            pending: None,
            exhausted: false,
            chunks_consumed: 0,
            max_chunk_octets,
        }
    }

    /// Tag of the next chunk, without consuming it; `None` at end of input
    ///
    /// # Errors
    ///
    /// Returns error if the next header is truncated or unreadable
    pub fn peek_pending_tag(&mut self) -> Result<Option<ChunkTag>> {
        Ok(self.pending_header()?.map(|header| header.tag))
    }

    /// Whether the source is exhausted at a chunk boundary
    ///
    /// # Errors
    ///
    /// Returns error if probing for the next header fails
    pub fn is_at_end(&mut self) -> Result<bool> {
        Ok(self.pending_header()?.is_none())
    }

    /// Consume the next chunk; `None` at end of input
    ///
    /// The returned ordinal counts chunks consumed or skipped by this stream.
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is truncated or exceeds the size limit
    pub fn read_chunk(&mut self) -> Result<Option<(usize, ChunkHeader, Bytes)>> {
        let Some(header) = self.pending_header()? else {
            return Ok(None);
        };

        self.pending = None;
        let mut payload = vec![0u8; header.octet_count as usize];
        let offset = self.reader.position();
        let filled = self.reader.read_full(&mut payload)?;
        if filled < payload.len() {
            return Err(CaptureError::Truncated {
                offset,
                needed: payload.len() as u64,
                available: filled as u64,
            });
        }

        let ordinal = self.chunks_consumed;
        self.chunks_consumed += 1;
        debug!("Read chunk #{} '{}' ({} bytes)", ordinal, header.tag, header.octet_count);

        Ok(Some((ordinal, header, Bytes::from(payload))))
    }

    /// Consume the next chunk without materializing its payload
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` at end of input, or `Truncated` if the payload is cut short
    pub fn skip_chunk(&mut self) -> Result<ChunkHeader> {
        let header = self.pending_header()?.ok_or(CaptureError::EndOfStream)?;
        self.pending = None;
        self.reader.skip(u64::from(header.octet_count))?;
        self.chunks_consumed += 1;
        Ok(header)
    }

    /// Chunks consumed or skipped so far
    #[must_use]
    pub fn chunks_consumed(&self) -> usize {
        self.chunks_consumed
    }

    /// Offset of the next unconsumed chunk
    #[must_use]
    pub fn position(&self) -> u64 {
        match self.pending {
            Some(_) => self.reader.position() - CHUNK_HEADER_SIZE as u64,
            None => self.reader.position(),
        }
    }

    /// Move forward to an absolute offset, which must be a chunk boundary
    ///
    /// Walks the chunk headers between here and `offset`, discarding their
    /// payloads. Chunks passed over are not counted as consumed.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedBackwardSeek` if `offset` lies before the next
    /// unconsumed chunk, `MisalignedSeek` if it falls inside a chunk (which
    /// then stays pending), or `Truncated` if the source ends first
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let position = self.position();
        if offset < position {
            return Err(CaptureError::UnsupportedBackwardSeek {
                requested: offset,
                position,
            });
        }

        while self.position() < offset {
            let chunk_start = self.position();
            let Some(header) = self.pending_header()? else {
                return Err(CaptureError::Truncated {
                    offset: chunk_start,
                    needed: offset - chunk_start,
                    available: 0,
                });
            };

            let chunk_end = chunk_start + header.chunk_size();
            if chunk_end > offset {
                return Err(CaptureError::MisalignedSeek {
                    offset,
                    chunk_start,
                    chunk_end,
                });
            }

            // Cleared first so position() tracks the source even if the skip fails
            self.pending = None;
            self.reader.skip(u64::from(header.octet_count))?;
        }

        Ok(())
    }

    fn pending_header(&mut self) -> Result<Option<ChunkHeader>> {
        if self.pending.is_some() || self.exhausted {
            return Ok(self.pending);
        }

        let mut raw = [0u8; CHUNK_HEADER_SIZE];
        if self.reader.read_full(&mut raw)? == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let header = ChunkHeader::decode(&raw);
        if header.octet_count > self.max_chunk_octets {
            return Err(CaptureError::DataTooLarge {
                size: header.octet_count as usize,
                limit: self.max_chunk_octets as usize,
            });
        }

        self.pending = Some(header);
        Ok(self.pending)
    }
}
