//! Capture file writer

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::format::{
    encode_packet_header, encode_state_header, Direction, FileHeader, FILE_HEADER_TAG,
    PACKET_TAG, SCHEMA_TAG, STATE_TAG,
};
use crate::container::ChunkWriter;
use crate::Result;

/// Writer for capture files
///
/// Emits the optional file header and the schema on creation, then one chunk
/// per packet or state. Timestamps are expected to be non-decreasing; the
/// writer only warns when they are not.
pub struct CaptureWriter<W: Write = BufWriter<File>> {
    chunks: ChunkWriter<W>,
    packet_count: usize,
    state_count: usize,
    last_timestamp_ms: Option<u64>,
}

impl CaptureWriter {
    /// Create a capture file, truncating any existing file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created, the header is invalid, or
    /// the leading chunks cannot be written
    pub fn create(path: &Path, header: Option<&FileHeader>, schema: &[u8]) -> Result<Self> {
        // Before truncating, so a rejected header leaves any existing file intact
        header.map(FileHeader::validate).transpose()?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        info!("Creating capture: {}", path.display());

        Self::new(BufWriter::new(file), header, schema)
    }

    /// Flush and close the file
    ///
    /// # Errors
    ///
    /// Returns error if flush fails
    pub fn close(self) -> Result<()> {
        let file = self
            .finish()?
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(())
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Start a capture on any sink
    ///
    /// # Errors
    ///
    /// Returns error if the header is invalid or the leading chunks cannot be written
    pub fn new(sink: W, header: Option<&FileHeader>, schema: &[u8]) -> Result<Self> {
        let mut chunks = ChunkWriter::new(sink);

        if let Some(header) = header {
            header.validate()?;
            chunks.write_chunk(FILE_HEADER_TAG, &header.encode())?;
        }
        chunks.write_chunk(SCHEMA_TAG, schema)?;

        Ok(Self {
            chunks,
            packet_count: 0,
            state_count: 0,
            last_timestamp_ms: None,
        })
    }

    /// Append a packet
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn write_packet(
        &mut self,
        direction: Direction,
        timestamp_ms: u64,
        payload: &[u8],
    ) -> Result<()> {
        self.observe_timestamp(timestamp_ms);
        let sub_header = encode_packet_header(direction, timestamp_ms);
        self.chunks
            .write_chunk_parts(PACKET_TAG, &[&sub_header[..], payload])?;
        self.packet_count += 1;
        Ok(())
    }

    /// Append a packet received by the recording side
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn write_incoming(&mut self, timestamp_ms: u64, payload: &[u8]) -> Result<()> {
        self.write_packet(Direction::Incoming, timestamp_ms, payload)
    }

    /// Append a packet sent by the recording side
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn write_outgoing(&mut self, timestamp_ms: u64, payload: &[u8]) -> Result<()> {
        self.write_packet(Direction::Outgoing, timestamp_ms, payload)
    }

    /// Append a full state snapshot
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn write_state(&mut self, timestamp_ms: u64, payload: &[u8]) -> Result<()> {
        self.observe_timestamp(timestamp_ms);
        let sub_header = encode_state_header(timestamp_ms);
        self.chunks.write_chunk_parts(STATE_TAG, &[&sub_header[..], payload])?;
        self.state_count += 1;
        Ok(())
    }

    /// Packets written so far
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// States written so far
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Flush and hand back the sink
    ///
    /// # Errors
    ///
    /// Returns error if flush fails
    pub fn finish(self) -> Result<W> {
        debug!(
            "Finishing capture: {} packets, {} states, {} bytes",
            self.packet_count,
            self.state_count,
            self.chunks.octets_written()
        );
        self.chunks.finish()
    }

    fn observe_timestamp(&mut self, timestamp_ms: u64) {
        if let Some(previous) = self.last_timestamp_ms {
            if timestamp_ms < previous {
                warn!(
                    "Timestamp went backwards: {} ms after {} ms",
                    timestamp_ms, previous
                );
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);
    }
}
