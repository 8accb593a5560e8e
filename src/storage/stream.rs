//! Streaming capture reader for forward-only sources

use std::io::Read;

use bytes::Bytes;

use super::format::{
    decode_file_header, decode_packet, decode_schema, decode_state, expect_tag, ChunkKind,
    FileHeader, PacketRecord, StateRecord, FILE_HEADER_TAG, PACKET_TAG, SCHEMA_TAG, STATE_TAG,
};
use crate::config::LimitsConfig;
use crate::container::{ChunkHeader, ChunkStream, ChunkTag};
use crate::{CaptureError, Result};

/// What the next chunk of a stream holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextKind {
    /// A chunk from the capture vocabulary
    Known(ChunkKind),
    /// A chunk with a tag outside the capture vocabulary
    Unknown(ChunkTag),
    /// The source is exhausted
    End,
}

/// One decoded chunk from a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `pac1` file header
    Header(FileHeader),
    /// `sch1` schema payload
    Schema(Bytes),
    /// `pkt1` packet
    Packet(PacketRecord),
    /// `sta1` state snapshot
    State(StateRecord),
}

/// Reads a capture one chunk at a time from a source that cannot seek
///
/// Suited to pipes and live captures of unknown length. There is no index and
/// no time-based seeking, and no check that a schema follows the header:
/// callers inspect [`CaptureStream::peek_next_kind`] before each read.
pub struct CaptureStream<R> {
    chunks: ChunkStream<R>,
}

impl<R: Read> CaptureStream<R> {
    /// Wrap a source with default limits
    pub fn new(source: R) -> Self {
        Self::with_limits(source, &LimitsConfig::default())
    }

    /// Wrap a source
    pub fn with_limits(source: R, limits: &LimitsConfig) -> Self {
        Self {
            chunks: ChunkStream::new(source, limits.max_chunk_octets),
        }
    }

    /// Inspect the next chunk without consuming it
    ///
    /// # Errors
    ///
    /// Returns error if the next chunk header is truncated or unreadable
    pub fn peek_next_kind(&mut self) -> Result<NextKind> {
        Ok(match self.chunks.peek_pending_tag()? {
            Some(tag) => ChunkKind::from_tag(tag).map_or(NextKind::Unknown(tag), NextKind::Known),
            None => NextKind::End,
        })
    }

    /// Whether the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns error if probing for the next chunk header fails
    pub fn is_at_end(&mut self) -> Result<bool> {
        self.chunks.is_at_end()
    }

    /// Consume a `pac1` chunk
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream`, `TypeMismatch`, or `MalformedHeader`
    pub fn read_next_file_header(&mut self) -> Result<FileHeader> {
        let (_, header, payload) = self.next_chunk(FILE_HEADER_TAG)?;
        decode_file_header(&header, &payload)
    }

    /// Consume a `sch1` chunk
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` or `TypeMismatch`
    pub fn read_next_schema(&mut self) -> Result<Bytes> {
        let (_, header, payload) = self.next_chunk(SCHEMA_TAG)?;
        decode_schema(&header, &payload)
    }

    /// Consume a `sch1` chunk as text, replacing invalid UTF-8
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` or `TypeMismatch`
    pub fn read_next_schema_text(&mut self) -> Result<String> {
        let schema = self.read_next_schema()?;
        Ok(String::from_utf8_lossy(&schema).into_owned())
    }

    /// Consume a `pkt1` chunk
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream`, `TypeMismatch`, or `MalformedHeader`
    pub fn read_next_packet(&mut self) -> Result<PacketRecord> {
        let (ordinal, header, payload) = self.next_chunk(PACKET_TAG)?;
        decode_packet(ordinal, &header, &payload)
    }

    /// Consume a `sta1` chunk
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream`, `TypeMismatch`, or `MalformedHeader`
    pub fn read_next_state(&mut self) -> Result<StateRecord> {
        let (ordinal, header, payload) = self.next_chunk(STATE_TAG)?;
        decode_state(ordinal, &header, &payload)
    }

    /// Consume and decode whatever chunk comes next; `None` at end of input
    ///
    /// # Errors
    ///
    /// Returns `UnknownChunkType` for a tag outside the capture vocabulary
    /// (the chunk stays pending), or a decode error
    pub fn read_next_record(&mut self) -> Result<Option<Record>> {
        let record = match self.peek_next_kind()? {
            NextKind::End => return Ok(None),
            NextKind::Unknown(tag) => {
                return Err(CaptureError::UnknownChunkType {
                    position: self.chunks_consumed(),
                    tag,
                })
            }
            NextKind::Known(ChunkKind::Header) => Record::Header(self.read_next_file_header()?),
            NextKind::Known(ChunkKind::Schema) => Record::Schema(self.read_next_schema()?),
            NextKind::Known(ChunkKind::Packet) => Record::Packet(self.read_next_packet()?),
            NextKind::Known(ChunkKind::State) => Record::State(self.read_next_state()?),
        };
        Ok(Some(record))
    }

    /// Consume the next chunk without decoding it
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` at end of input
    pub fn skip_next_chunk(&mut self) -> Result<ChunkTag> {
        Ok(self.chunks.skip_chunk()?.tag)
    }

    /// Byte offset of the next unconsumed chunk
    #[must_use]
    pub fn position(&self) -> u64 {
        self.chunks.position()
    }

    /// Move forward to a chunk boundary at `offset`
    ///
    /// Chunks passed over this way do not count toward record positions.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedBackwardSeek` if `offset` was already passed,
    /// `MisalignedSeek` if it falls inside a chunk, or `Truncated` if the
    /// source ends before it
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.chunks.seek_to(offset)
    }

    fn chunks_consumed(&self) -> usize {
        self.chunks.chunks_consumed()
    }

    // A chunk of the wrong kind stays pending
    fn next_chunk(&mut self, expected: ChunkTag) -> Result<(usize, ChunkHeader, Bytes)> {
        let tag = self
            .chunks
            .peek_pending_tag()?
            .ok_or(CaptureError::EndOfStream)?;
        expect_tag(expected, tag)?;
        self.chunks.read_chunk()?.ok_or(CaptureError::EndOfStream)
    }
}
