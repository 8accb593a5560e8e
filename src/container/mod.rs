//! Generic chunked binary container
//!
//! A container is a plain concatenation of chunks. Each chunk is an 8-byte
//! header followed by its payload:
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬─────────────────┐
//! │ Type tag         │ Payload length       │ Payload         │
//! │ 4 bytes (ASCII)  │ 4 bytes (big-endian) │ length bytes    │
//! └──────────────────┴──────────────────────┴─────────────────┘
//! ```
//!
//! Three access paths share this framing: [`ChunkWriter`] appends,
//! [`ChunkSeeker`] gives random access over bytes held in memory (or mapped),
//! and [`ChunkStream`] parses a forward-only source one chunk at a time.

mod forward;
mod seeker;
mod stream;
mod writer;

use std::fmt;

use bytemuck::{Pod, Zeroable};

pub use forward::ForwardReader;
pub use seeker::{ChunkSeeker, SeekHeader};
pub use stream::ChunkStream;
pub use writer::ChunkWriter;

/// Chunk header size in bytes
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Four-character chunk type identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag([u8; 4]);

impl ChunkTag {
    /// Create a tag from raw bytes
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw tag bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(u8::is_ascii_graphic) {
            // All four bytes are printable ASCII
            self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag({self})")
    }
}

/// Decoded chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk type
    pub tag: ChunkTag,
    /// Payload length in bytes (header excluded)
    pub octet_count: u32,
}

/// On-disk chunk header layout
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawChunkHeader {
    tag: [u8; 4],
    octet_count: [u8; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<RawChunkHeader>(), CHUNK_HEADER_SIZE);

impl ChunkHeader {
    /// Encode to the 8-byte wire form
    #[must_use]
    pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let raw = RawChunkHeader {
            tag: self.tag.0,
            octet_count: self.octet_count.to_be_bytes(),
        };
        bytemuck::cast(raw)
    }

    /// Decode from the 8-byte wire form
    #[must_use]
    pub fn decode(bytes: &[u8; CHUNK_HEADER_SIZE]) -> Self {
        let raw: RawChunkHeader = bytemuck::cast(*bytes);
        Self {
            tag: ChunkTag(raw.tag),
            octet_count: u32::from_be_bytes(raw.octet_count),
        }
    }

    /// Total chunk size on disk (header + payload)
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        CHUNK_HEADER_SIZE as u64 + u64::from(self.octet_count)
    }
}
