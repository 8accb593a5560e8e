//! Capture chunk vocabulary and payload codec
//!
//! | Tag    | Payload                                                      |
//! |--------|--------------------------------------------------------------|
//! | `pac1` | nine length-prefixed strings (see [`FileHeader`])            |
//! | `sch1` | opaque schema bytes                                          |
//! | `pkt1` | direction (1 byte) + timestamp ms (8 bytes BE) + packet data |
//! | `sta1` | timestamp ms (8 bytes BE) + full state snapshot              |

use std::fmt;

use bytemuck::{Pod, Zeroable};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::container::{ChunkHeader, ChunkTag};
use crate::{CaptureError, Result};

/// File header chunk tag
pub const FILE_HEADER_TAG: ChunkTag = ChunkTag::new(*b"pac1");

/// Schema chunk tag
pub const SCHEMA_TAG: ChunkTag = ChunkTag::new(*b"sch1");

/// Packet chunk tag
pub const PACKET_TAG: ChunkTag = ChunkTag::new(*b"pkt1");

/// State chunk tag
pub const STATE_TAG: ChunkTag = ChunkTag::new(*b"sta1");

/// Packet sub-header size (direction + timestamp)
pub const PACKET_HEADER_SIZE: usize = 9;

/// State sub-header size (timestamp)
pub const STATE_HEADER_SIZE: usize = 8;

/// Longest string a single length octet can describe
pub const MAX_STRING_OCTETS: usize = 255;

/// Packet direction, encoded in the high bit of the direction octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Received by the recording side
    Incoming = 0x01,
    /// Sent by the recording side
    Outgoing = 0x81,
}

impl Direction {
    /// Wire value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = CaptureError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Incoming),
            0x81 => Ok(Self::Outgoing),
            other => Err(CaptureError::MalformedHeader(format!(
                "unknown packet direction {other:#04x}"
            ))),
        }
    }
}

/// Classification of a chunk within a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// `pac1` file header
    Header,
    /// `sch1` schema
    Schema,
    /// `pkt1` packet
    Packet,
    /// `sta1` state snapshot
    State,
}

impl ChunkKind {
    /// Classify a tag; `None` for tags outside the capture vocabulary
    #[must_use]
    pub fn from_tag(tag: ChunkTag) -> Option<Self> {
        match tag {
            FILE_HEADER_TAG => Some(Self::Header),
            SCHEMA_TAG => Some(Self::Schema),
            PACKET_TAG => Some(Self::Packet),
            STATE_TAG => Some(Self::State),
            _ => None,
        }
    }

    /// Tag written for this kind
    #[must_use]
    pub const fn tag(self) -> ChunkTag {
        match self {
            Self::Header => FILE_HEADER_TAG,
            Self::Schema => SCHEMA_TAG,
            Self::Packet => PACKET_TAG,
            Self::State => STATE_TAG,
        }
    }
}

/// Packet sub-header layout
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawPacketHeader {
    direction: u8,
    timestamp_ms: [u8; 8],
}

/// State sub-header layout
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawStateHeader {
    timestamp_ms: [u8; 8],
}

static_assertions::const_assert_eq!(std::mem::size_of::<RawPacketHeader>(), PACKET_HEADER_SIZE);
static_assertions::const_assert_eq!(std::mem::size_of::<RawStateHeader>(), STATE_HEADER_SIZE);

/// Encode a packet sub-header
#[must_use]
pub fn encode_packet_header(direction: Direction, timestamp_ms: u64) -> [u8; PACKET_HEADER_SIZE] {
    bytemuck::cast(RawPacketHeader {
        direction: direction.as_u8(),
        timestamp_ms: timestamp_ms.to_be_bytes(),
    })
}

/// Decode a packet sub-header from the start of `bytes`
///
/// # Errors
///
/// Returns `MalformedHeader` if fewer than 9 bytes are present or the
/// direction octet is not recognized
pub fn decode_packet_header(bytes: &[u8]) -> Result<(Direction, u64)> {
    if bytes.len() < PACKET_HEADER_SIZE {
        return Err(CaptureError::MalformedHeader(format!(
            "packet sub-header needs {PACKET_HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    let raw: RawPacketHeader = bytemuck::pod_read_unaligned(&bytes[..PACKET_HEADER_SIZE]);
    let direction = Direction::try_from(raw.direction)?;
    Ok((direction, u64::from_be_bytes(raw.timestamp_ms)))
}

/// Encode a state sub-header
#[must_use]
pub fn encode_state_header(timestamp_ms: u64) -> [u8; STATE_HEADER_SIZE] {
    bytemuck::cast(RawStateHeader {
        timestamp_ms: timestamp_ms.to_be_bytes(),
    })
}

/// Decode a state sub-header from the start of `bytes`
///
/// # Errors
///
/// Returns `MalformedHeader` if fewer than 8 bytes are present
pub fn decode_state_header(bytes: &[u8]) -> Result<u64> {
    if bytes.len() < STATE_HEADER_SIZE {
        return Err(CaptureError::MalformedHeader(format!(
            "state sub-header needs {STATE_HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    let raw: RawStateHeader = bytemuck::pod_read_unaligned(&bytes[..STATE_HEADER_SIZE]);
    Ok(u64::from_be_bytes(raw.timestamp_ms))
}

/// Append a string prefixed by its length in one octet
///
/// # Panics
///
/// Panics if `s` is longer than 255 bytes
pub fn encode_length_prefixed_string(buf: &mut impl BufMut, s: &str) {
    assert!(
        s.len() <= MAX_STRING_OCTETS,
        "length-prefixed string too long: {} > {MAX_STRING_OCTETS}",
        s.len()
    );
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
}

fn decode_length_prefixed_string(buf: &mut &[u8], field: &str) -> Result<String> {
    if !buf.has_remaining() {
        return Err(CaptureError::MalformedHeader(format!(
            "missing length of {field}"
        )));
    }
    let len = buf.get_u8() as usize;
    if buf.remaining() < len {
        return Err(CaptureError::MalformedHeader(format!(
            "{field} needs {len} bytes, got {}",
            buf.remaining()
        )));
    }
    let value = std::str::from_utf8(&buf[..len])
        .map_err(|e| CaptureError::MalformedHeader(format!("{field} is not UTF-8: {e}")))?
        .to_string();
    buf.advance(len);
    Ok(value)
}

/// Fail with `TypeMismatch` unless `actual` is `expected`
///
/// # Errors
///
/// Returns `TypeMismatch` carrying both tags
pub fn expect_tag(expected: ChunkTag, actual: ChunkTag) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CaptureError::TypeMismatch { expected, actual })
    }
}

/// Name and version pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameVersion {
    /// Name
    pub name: String,
    /// Version string
    pub version: String,
}

impl NameVersion {
    /// Create a name/version pair
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for NameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Optional leading `pac1` chunk describing who produced the capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// Company name
    pub company: String,
    /// Recording application
    pub application: NameVersion,
    /// Schema describing state and packet payloads
    pub schema: NameVersion,
    /// Network engine
    pub engine: NameVersion,
    /// Wire protocol
    pub protocol: NameVersion,
}

impl FileHeader {
    fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("company", self.company.as_str()),
            ("application name", self.application.name.as_str()),
            ("application version", self.application.version.as_str()),
            ("schema name", self.schema.name.as_str()),
            ("schema version", self.schema.version.as_str()),
            ("engine name", self.engine.name.as_str()),
            ("engine version", self.engine.version.as_str()),
            ("protocol name", self.protocol.name.as_str()),
            ("protocol version", self.protocol.version.as_str()),
        ]
    }

    /// Check every string fits its length octet
    ///
    /// # Errors
    ///
    /// Returns `DataTooLarge` for the first string longer than 255 bytes
    pub fn validate(&self) -> Result<()> {
        for (_, value) in self.fields() {
            if value.len() > MAX_STRING_OCTETS {
                return Err(CaptureError::DataTooLarge {
                    size: value.len(),
                    limit: MAX_STRING_OCTETS,
                });
            }
        }
        Ok(())
    }

    /// Encode as a `pac1` payload
    ///
    /// # Panics
    ///
    /// Panics if a string is longer than 255 bytes; call [`Self::validate`] first
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let fields = self.fields();
        let mut buf = BytesMut::with_capacity(fields.iter().map(|(_, v)| 1 + v.len()).sum());
        for (_, value) in fields {
            encode_length_prefixed_string(&mut buf, value);
        }
        buf.freeze()
    }

    /// Decode a `pac1` payload
    ///
    /// # Errors
    ///
    /// Returns `MalformedHeader` if a string is missing, truncated, or not
    /// UTF-8, or if bytes follow the ninth string
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        let mut next = |field| decode_length_prefixed_string(&mut buf, field);
        let header = Self {
            company: next("company")?,
            application: NameVersion::new(next("application name")?, next("application version")?),
            schema: NameVersion::new(next("schema name")?, next("schema version")?),
            engine: NameVersion::new(next("engine name")?, next("engine version")?),
            protocol: NameVersion::new(next("protocol name")?, next("protocol version")?),
        };
        if !buf.is_empty() {
            return Err(CaptureError::MalformedHeader(format!(
                "{} trailing bytes after protocol version",
                buf.len()
            )));
        }
        Ok(header)
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} schema: {} engine: {} protocol: {}",
            self.company, self.application, self.schema, self.engine, self.protocol
        )
    }
}

/// A decoded `pkt1` chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// Ordinal position of the chunk
    pub position: usize,
    /// Direction of travel
    pub direction: Direction,
    /// Monotonic timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Packet bytes after the sub-header
    pub payload: Bytes,
}

/// A decoded `sta1` chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// Ordinal position of the chunk
    pub position: usize,
    /// Monotonic timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Full state snapshot after the sub-header
    pub payload: Bytes,
}

/// Decode a full `pkt1` chunk
///
/// # Errors
///
/// Returns `TypeMismatch` for another tag, or `MalformedHeader` for a bad sub-header
pub fn decode_packet(position: usize, header: &ChunkHeader, payload: &[u8]) -> Result<PacketRecord> {
    expect_tag(PACKET_TAG, header.tag)?;
    let (direction, timestamp_ms) = decode_packet_header(payload)?;
    Ok(PacketRecord {
        position,
        direction,
        timestamp_ms,
        payload: Bytes::copy_from_slice(&payload[PACKET_HEADER_SIZE..]),
    })
}

/// Decode a full `sta1` chunk
///
/// # Errors
///
/// Returns `TypeMismatch` for another tag, or `MalformedHeader` for a bad sub-header
pub fn decode_state(position: usize, header: &ChunkHeader, payload: &[u8]) -> Result<StateRecord> {
    expect_tag(STATE_TAG, header.tag)?;
    let timestamp_ms = decode_state_header(payload)?;
    Ok(StateRecord {
        position,
        timestamp_ms,
        payload: Bytes::copy_from_slice(&payload[STATE_HEADER_SIZE..]),
    })
}

/// Decode a `sch1` chunk
///
/// # Errors
///
/// Returns `TypeMismatch` for another tag
pub fn decode_schema(header: &ChunkHeader, payload: &[u8]) -> Result<Bytes> {
    expect_tag(SCHEMA_TAG, header.tag)?;
    Ok(Bytes::copy_from_slice(payload))
}

/// Decode a `pac1` chunk
///
/// # Errors
///
/// Returns `TypeMismatch` for another tag, or `MalformedHeader` for bad strings
pub fn decode_file_header(header: &ChunkHeader, payload: &[u8]) -> Result<FileHeader> {
    expect_tag(FILE_HEADER_TAG, header.tag)?;
    FileHeader::decode(payload)
}
