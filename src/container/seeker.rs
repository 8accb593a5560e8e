//! Random-access chunk reader

use super::{ChunkHeader, CHUNK_HEADER_SIZE};
use crate::{CaptureError, Result};

/// Directory entry for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekHeader {
    /// Decoded chunk header
    pub header: ChunkHeader,
    /// Offset of the first payload byte
    pub payload_offset: usize,
}

impl SeekHeader {
    fn payload_range(&self) -> std::ops::Range<usize> {
        self.payload_offset..self.payload_offset + self.header.octet_count as usize
    }
}

/// Random access over a container held in memory or memory-mapped
///
/// Opening walks the chunk headers only, hopping over each payload by its
/// declared length, so the directory is built without touching payload bytes.
pub struct ChunkSeeker<S> {
    source: S,
    headers: Vec<SeekHeader>,
}

impl<S: AsRef<[u8]>> ChunkSeeker<S> {
    /// Scan the chunk directory of `source`
    ///
    /// # Errors
    ///
    /// Returns error if a header or payload is truncated, or a chunk exceeds
    /// `max_chunk_octets`
    pub fn open(source: S, max_chunk_octets: u32) -> Result<Self> {
        let bytes = source.as_ref();
        let mut headers = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            let available = bytes.len() - offset;
            if available < CHUNK_HEADER_SIZE {
                return Err(CaptureError::Truncated {
                    offset: offset as u64,
                    needed: CHUNK_HEADER_SIZE as u64,
                    available: available as u64,
                });
            }

            let mut raw = [0u8; CHUNK_HEADER_SIZE];
            raw.copy_from_slice(&bytes[offset..offset + CHUNK_HEADER_SIZE]);
            let header = ChunkHeader::decode(&raw);

            if header.octet_count > max_chunk_octets {
                return Err(CaptureError::DataTooLarge {
                    size: header.octet_count as usize,
                    limit: max_chunk_octets as usize,
                });
            }

            let payload_offset = offset + CHUNK_HEADER_SIZE;
            let remaining = bytes.len() - payload_offset;
            if (header.octet_count as usize) > remaining {
                return Err(CaptureError::Truncated {
                    offset: payload_offset as u64,
                    needed: u64::from(header.octet_count),
                    available: remaining as u64,
                });
            }

            headers.push(SeekHeader {
                header,
                payload_offset,
            });
            offset = payload_offset + header.octet_count as usize;
        }

        Ok(Self { source, headers })
    }

    /// Chunk directory in file order
    #[must_use]
    pub fn all_headers(&self) -> &[SeekHeader] {
        &self.headers
    }

    /// Number of chunks
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.headers.len()
    }

    /// Read a chunk's full payload
    ///
    /// # Errors
    ///
    /// Returns error if `ordinal` is out of range
    pub fn read_chunk(&self, ordinal: usize) -> Result<(ChunkHeader, &[u8])> {
        let seek_header = self.seek_header(ordinal)?;
        Ok((
            seek_header.header,
            &self.source.as_ref()[seek_header.payload_range()],
        ))
    }

    /// Read at most the first `max_octets` bytes of a chunk's payload
    ///
    /// # Errors
    ///
    /// Returns error if `ordinal` is out of range
    pub fn read_partial_chunk(
        &self,
        ordinal: usize,
        max_octets: usize,
    ) -> Result<(ChunkHeader, &[u8])> {
        let seek_header = self.seek_header(ordinal)?;
        let range = seek_header.payload_range();
        let end = range.start + max_octets.min(range.len());
        Ok((seek_header.header, &self.source.as_ref()[range.start..end]))
    }

    fn seek_header(&self, ordinal: usize) -> Result<&SeekHeader> {
        self.headers.get(ordinal).ok_or(CaptureError::EndOfIndex {
            position: ordinal,
            len: self.headers.len(),
        })
    }
}
