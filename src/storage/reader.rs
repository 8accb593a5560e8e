//! Indexed capture reader

use std::fs::File;
use std::path::Path;

use bytes::Bytes;
use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::cursor::CaptureCursor;
use super::format::{
    decode_file_header, decode_packet, decode_packet_header, decode_schema, decode_state,
    decode_state_header, ChunkKind, Direction, FileHeader, PacketRecord, StateRecord,
    FILE_HEADER_TAG, PACKET_HEADER_SIZE, SCHEMA_TAG, STATE_HEADER_SIZE,
};
use crate::config::{Config, ReaderConfig};
use crate::container::ChunkSeeker;
use crate::{CaptureError, Result};

/// Summary of one chunk, built once at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Ordinal position of the chunk
    pub position: usize,
    /// Chunk classification
    pub kind: ChunkKind,
    /// Timestamp in milliseconds; zero for header and schema entries
    pub timestamp_ms: u64,
    /// Direction for packet entries
    pub direction: Option<Direction>,
    /// Payload size in bytes, sub-header included
    pub octet_count: u32,
}

/// Random-access reader for capture files
///
/// Holds the container and its index for its whole lifetime. The index is
/// read-only once built, so any number of [`CaptureCursor`]s may borrow the
/// same reader.
pub struct CaptureReader<S = Mmap> {
    chunks: ChunkSeeker<S>,
    file_header: Option<FileHeader>,
    schema: Bytes,
    entries: Vec<IndexEntry>,
    state_positions: Vec<usize>,
    first_record: usize,
}

impl CaptureReader {
    /// Open a capture file with default configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or mapped, or is malformed
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &Config::default())
    }

    /// Open a capture file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or mapped, or is malformed
    pub fn open_with_config(path: &Path, config: &Config) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: read-only mapping; the capture must not be modified while open
        let mmap = unsafe { Mmap::map(&file)? };

        debug!("Mapped capture {} ({} bytes)", path.display(), mmap.len());

        Self::from_source(mmap, config)
    }
}

impl<S: AsRef<[u8]>> CaptureReader<S> {
    /// Index a capture held in memory
    ///
    /// # Errors
    ///
    /// Returns `MissingSchema`, `UnknownChunkType`, `UnexpectedChunk`,
    /// `MalformedHeader`, `Truncated` or `DataTooLarge` for a malformed
    /// capture, and `MissingState` / `NonMonotonicTimestamp` when the reader
    /// configuration asks for those checks
    pub fn from_source(source: S, config: &Config) -> Result<Self> {
        let chunks = ChunkSeeker::open(source, config.limits.max_chunk_octets)?;
        let mut entries = Vec::with_capacity(chunks.chunk_count());

        let file_header = match chunks.all_headers().first() {
            Some(first) if first.header.tag == FILE_HEADER_TAG => {
                let (header, payload) = chunks.read_chunk(0)?;
                entries.push(IndexEntry::leading(0, ChunkKind::Header, header.octet_count));
                Some(decode_file_header(&header, payload)?)
            }
            _ => None,
        };

        let schema_position = entries.len();
        let schema = match chunks.all_headers().get(schema_position) {
            Some(seek_header) if seek_header.header.tag == SCHEMA_TAG => {
                let (header, payload) = chunks.read_chunk(schema_position)?;
                entries.push(IndexEntry::leading(
                    schema_position,
                    ChunkKind::Schema,
                    header.octet_count,
                ));
                decode_schema(&header, payload)?
            }
            other => {
                return Err(CaptureError::MissingSchema {
                    found: other.map(|seek_header| seek_header.header.tag),
                })
            }
        };

        let first_record = entries.len();
        scan_records(&chunks, first_record, &config.reader, &mut entries)?;

        let state_positions: Vec<usize> = entries
            .iter()
            .filter(|entry| entry.kind == ChunkKind::State)
            .map(|entry| entry.position)
            .collect();

        info!(
            "Indexed capture: {} chunks, {} packets, {} states",
            entries.len(),
            entries.len() - first_record - state_positions.len(),
            state_positions.len()
        );

        if state_positions.is_empty() {
            if config.reader.require_states {
                return Err(CaptureError::MissingState);
            }
            warn!("Capture contains no states; seeking by time is unavailable");
        }

        Ok(Self {
            chunks,
            file_header,
            schema,
            entries,
            state_positions,
            first_record,
        })
    }

    /// File header, if the capture starts with one
    #[must_use]
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }

    /// Opaque schema payload
    #[must_use]
    pub fn schema(&self) -> &Bytes {
        &self.schema
    }

    /// Every index entry in file order, leading header and schema included
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of index entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty (never true for an opened capture)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index entry at `position`
    #[must_use]
    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Position of the first entry after the schema
    #[must_use]
    pub fn first_record_position(&self) -> usize {
        self.first_record
    }

    /// Number of state entries
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.state_positions.len()
    }

    /// Number of packet entries
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.entries.len() - self.first_record - self.state_positions.len()
    }

    /// Whether the capture can be sought by time
    #[must_use]
    pub fn has_states(&self) -> bool {
        !self.state_positions.is_empty()
    }

    /// Surface the missing-state advisory as an error
    ///
    /// # Errors
    ///
    /// Returns `MissingState` if the capture holds no state chunks
    pub fn require_states(&self) -> Result<()> {
        if self.has_states() {
            Ok(())
        } else {
            Err(CaptureError::MissingState)
        }
    }

    /// Timestamp of the first packet or state
    #[must_use]
    pub fn first_timestamp(&self) -> Option<u64> {
        self.records().first().map(|entry| entry.timestamp_ms)
    }

    /// Timestamp of the last packet or state
    #[must_use]
    pub fn last_timestamp(&self) -> Option<u64> {
        self.records().last().map(|entry| entry.timestamp_ms)
    }

    /// Read the packet at `position`
    ///
    /// # Errors
    ///
    /// Returns `EndOfIndex` past the last entry, `WrongKind` if the entry is
    /// not a packet, or a decode error
    pub fn read_packet_at(&self, position: usize) -> Result<PacketRecord> {
        self.expect_kind(position, ChunkKind::Packet)?;
        let (header, payload) = self.chunks.read_chunk(position)?;
        decode_packet(position, &header, payload)
    }

    /// Read the state at `position`
    ///
    /// # Errors
    ///
    /// Returns `EndOfIndex` past the last entry, `WrongKind` if the entry is
    /// not a state, or a decode error
    pub fn read_state_at(&self, position: usize) -> Result<StateRecord> {
        self.expect_kind(position, ChunkKind::State)?;
        let (header, payload) = self.chunks.read_chunk(position)?;
        decode_state(position, &header, payload)
    }

    /// Last state whose timestamp is at or before `timestamp_ms`
    ///
    /// Relies on state timestamps being non-decreasing in file order.
    #[must_use]
    pub fn find_nearest_state_at_or_before(&self, timestamp_ms: u64) -> Option<&IndexEntry> {
        let count = self
            .state_positions
            .partition_point(|&position| self.entries[position].timestamp_ms <= timestamp_ms);
        count
            .checked_sub(1)
            .map(|i| &self.entries[self.state_positions[i]])
    }

    /// Cursor positioned at the first entry after the schema
    #[must_use]
    pub fn cursor(&self) -> CaptureCursor<'_, S> {
        CaptureCursor::new(self)
    }

    fn records(&self) -> &[IndexEntry] {
        &self.entries[self.first_record..]
    }

    fn expect_kind(&self, position: usize, expected: ChunkKind) -> Result<()> {
        let entry = self.entries.get(position).ok_or(CaptureError::EndOfIndex {
            position,
            len: self.entries.len(),
        })?;
        if entry.kind != expected {
            return Err(CaptureError::WrongKind {
                position,
                expected,
                actual: entry.kind,
            });
        }
        Ok(())
    }
}

impl IndexEntry {
    fn leading(position: usize, kind: ChunkKind, octet_count: u32) -> Self {
        Self {
            position,
            kind,
            timestamp_ms: 0,
            direction: None,
            octet_count,
        }
    }
}

/// Classify every chunk from `start` on, reading only fixed sub-headers
fn scan_records<S: AsRef<[u8]>>(
    chunks: &ChunkSeeker<S>,
    start: usize,
    reader_config: &ReaderConfig,
    entries: &mut Vec<IndexEntry>,
) -> Result<()> {
    let mut previous_ms: Option<u64> = None;

    for (position, seek_header) in chunks.all_headers().iter().enumerate().skip(start) {
        let tag = seek_header.header.tag;
        let octet_count = seek_header.header.octet_count;

        let entry = match ChunkKind::from_tag(tag) {
            Some(ChunkKind::Packet) => {
                let (_, prefix) = chunks.read_partial_chunk(position, PACKET_HEADER_SIZE)?;
                let (direction, timestamp_ms) = decode_packet_header(prefix)?;
                IndexEntry {
                    position,
                    kind: ChunkKind::Packet,
                    timestamp_ms,
                    direction: Some(direction),
                    octet_count,
                }
            }
            Some(ChunkKind::State) => {
                let (_, prefix) = chunks.read_partial_chunk(position, STATE_HEADER_SIZE)?;
                IndexEntry {
                    position,
                    kind: ChunkKind::State,
                    timestamp_ms: decode_state_header(prefix)?,
                    direction: None,
                    octet_count,
                }
            }
            Some(ChunkKind::Header | ChunkKind::Schema) => {
                return Err(CaptureError::UnexpectedChunk { position, tag });
            }
            None => return Err(CaptureError::UnknownChunkType { position, tag }),
        };

        if let Some(previous_ms) = previous_ms {
            if reader_config.enforce_monotonic && entry.timestamp_ms < previous_ms {
                return Err(CaptureError::NonMonotonicTimestamp {
                    position,
                    previous_ms,
                    timestamp_ms: entry.timestamp_ms,
                });
            }
        }
        previous_ms = Some(entry.timestamp_ms);

        entries.push(entry);
    }

    Ok(())
}
