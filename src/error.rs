//! Error types for statecap

use std::io;
use thiserror::Error;

use crate::container::ChunkTag;
use crate::storage::ChunkKind;

/// Result type for statecap operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that can occur while writing or reading a capture
#[derive(Debug, Error)]
pub enum CaptureError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The schema chunk is absent from its leading slot
    #[error("Missing schema chunk (found {found:?})")]
    MissingSchema {
        /// Tag found where the schema was expected, `None` for an empty container
        found: Option<ChunkTag>,
    },

    /// A chunk carries a different tag than the decoder expects
    #[error("Chunk type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch {
        /// Tag the decoder expected
        expected: ChunkTag,
        /// Tag found in the container
        actual: ChunkTag,
    },

    /// A chunk tag outside the capture vocabulary
    #[error("Unknown chunk type '{tag}' at position {position}")]
    UnknownChunkType {
        /// Ordinal position of the chunk
        position: usize,
        /// Offending tag
        tag: ChunkTag,
    },

    /// A header or schema chunk found after the leading slots
    #[error("Unexpected '{tag}' chunk at position {position}")]
    UnexpectedChunk {
        /// Ordinal position of the chunk
        position: usize,
        /// Offending tag
        tag: ChunkTag,
    },

    /// A packet/state sub-header or file header could not be decoded
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The container holds no state chunks; seeking by time is unavailable
    #[error("Capture contains no state chunks")]
    MissingState,

    /// The entry at a position is not the requested kind
    #[error("Wrong chunk kind at position {position}: expected {expected:?}, found {actual:?}")]
    WrongKind {
        /// Ordinal position that was read
        position: usize,
        /// Kind the caller asked for
        expected: ChunkKind,
        /// Kind stored at the position
        actual: ChunkKind,
    },

    /// No state exists at or before the requested time
    #[error("No state at or before timestamp {timestamp_ms} ms")]
    NoStateFound {
        /// Query timestamp
        timestamp_ms: u64,
    },

    /// The source has no further chunks
    #[error("End of stream")]
    EndOfStream,

    /// Random access beyond the last index entry
    #[error("Position {position} is beyond the end of the index ({len} entries)")]
    EndOfIndex {
        /// Requested position
        position: usize,
        /// Number of index entries
        len: usize,
    },

    /// A forward-only source was asked to move to an offset it already passed
    #[error("Cannot seek backward to offset {requested}, already at {position}")]
    UnsupportedBackwardSeek {
        /// Requested offset
        requested: u64,
        /// Current read offset
        position: u64,
    },

    /// A forward seek target falls inside a chunk
    #[error("Offset {offset} is inside the chunk spanning {chunk_start}..{chunk_end}")]
    MisalignedSeek {
        /// Requested offset
        offset: u64,
        /// Offset of the straddling chunk's header
        chunk_start: u64,
        /// Offset just past the straddling chunk
        chunk_end: u64,
    },

    /// The container ends inside a chunk header or payload
    #[error("Truncated container at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Offset where the short read started
        offset: u64,
        /// Bytes required
        needed: u64,
        /// Bytes actually present
        available: u64,
    },

    /// A packet/state timestamp went backwards
    #[error("Timestamp {timestamp_ms} ms at position {position} precedes previous {previous_ms} ms")]
    NonMonotonicTimestamp {
        /// Ordinal position of the offending chunk
        position: usize,
        /// Timestamp of the preceding packet/state
        previous_ms: u64,
        /// Offending timestamp
        timestamp_ms: u64,
    },

    /// Payload or string too large for its length field or configured limit
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
