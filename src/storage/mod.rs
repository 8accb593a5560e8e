//! Capture format on top of the chunk container
//!
//! A capture is an optional `pac1` file header, a mandatory `sch1` schema,
//! then any interleaving of `pkt1` packets and `sta1` state snapshots.

mod cursor;
mod format;
mod reader;
mod stream;
mod writer;

pub use cursor::{CaptureCursor, Packets};
pub use format::{
    decode_file_header, decode_packet, decode_packet_header, decode_schema, decode_state,
    decode_state_header, encode_length_prefixed_string, encode_packet_header,
    encode_state_header, expect_tag, ChunkKind, Direction, FileHeader, NameVersion, PacketRecord,
    StateRecord, FILE_HEADER_TAG, MAX_STRING_OCTETS, PACKET_HEADER_SIZE, PACKET_TAG, SCHEMA_TAG,
    STATE_HEADER_SIZE, STATE_TAG,
};
pub use reader::{CaptureReader, IndexEntry};
pub use stream::{CaptureStream, NextKind, Record};
pub use writer::CaptureWriter;
