//! Sequential cursor over an indexed capture

use tracing::debug;

use super::format::{ChunkKind, PacketRecord, StateRecord};
use super::reader::CaptureReader;
use crate::{CaptureError, Result};

/// Caller-owned traversal position over a [`CaptureReader`]
///
/// Starts at the first entry after the schema. Sequential reads only move
/// forward; [`CaptureCursor::seek_and_get_state`] and
/// [`CaptureCursor::rewind`] may move it anywhere.
pub struct CaptureCursor<'r, S> {
    reader: &'r CaptureReader<S>,
    position: usize,
}

impl<'r, S: AsRef<[u8]>> CaptureCursor<'r, S> {
    /// Cursor at the first entry after the schema
    #[must_use]
    pub fn new(reader: &'r CaptureReader<S>) -> Self {
        Self {
            reader,
            position: reader.first_record_position(),
        }
    }

    /// Current position
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the cursor is past the last entry
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.position >= self.reader.len()
    }

    /// Whether the current entry is a state
    #[must_use]
    pub fn at_state(&self) -> bool {
        self.kind() == Some(ChunkKind::State)
    }

    /// Whether the current entry is a packet
    #[must_use]
    pub fn at_packet(&self) -> bool {
        self.kind() == Some(ChunkKind::Packet)
    }

    /// Read the next packet, stepping over any states before it
    ///
    /// Returns `Ok(None)` once no packet remains.
    ///
    /// # Errors
    ///
    /// Returns error if the packet cannot be decoded
    pub fn read_next_packet(&mut self) -> Result<Option<PacketRecord>> {
        while self.at_state() {
            self.position += 1;
        }
        if self.is_at_end() {
            return Ok(None);
        }
        let packet = self.reader.read_packet_at(self.position)?;
        self.position += 1;
        Ok(Some(packet))
    }

    /// Read the state at the current position
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` at the end, `WrongKind` if the current entry is
    /// not a state, or a decode error
    pub fn read_next_state(&mut self) -> Result<StateRecord> {
        if self.is_at_end() {
            return Err(CaptureError::EndOfStream);
        }
        let state = self.reader.read_state_at(self.position)?;
        self.position += 1;
        Ok(state)
    }

    /// Jump to the nearest state at or before `timestamp_ms` and read it
    ///
    /// The cursor ends up just after the returned state, so the next
    /// [`Self::read_next_packet`] resumes from there.
    ///
    /// # Errors
    ///
    /// Returns `MissingState` if the capture has no states, `NoStateFound` if
    /// every state is later than `timestamp_ms`, or a decode error
    pub fn seek_and_get_state(&mut self, timestamp_ms: u64) -> Result<StateRecord> {
        self.reader.require_states()?;
        let entry = self
            .reader
            .find_nearest_state_at_or_before(timestamp_ms)
            .ok_or(CaptureError::NoStateFound { timestamp_ms })?;

        debug!(
            "Seek to {} ms found state at position {} ({} ms)",
            timestamp_ms, entry.position, entry.timestamp_ms
        );

        self.position = entry.position;
        self.read_next_state()
    }

    /// Move back to the first entry after the schema
    pub fn rewind(&mut self) {
        self.position = self.reader.first_record_position();
    }

    /// Iterate the remaining packets, stepping over states
    pub fn packets(&mut self) -> Packets<'_, 'r, S> {
        Packets { cursor: self }
    }

    fn kind(&self) -> Option<ChunkKind> {
        self.reader.entry(self.position).map(|entry| entry.kind)
    }
}

/// Iterator returned by [`CaptureCursor::packets`]
pub struct Packets<'c, 'r, S> {
    cursor: &'c mut CaptureCursor<'r, S>,
}

impl<S: AsRef<[u8]>> Iterator for Packets<'_, '_, S> {
    type Item = Result<PacketRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.read_next_packet().transpose()
    }
}
