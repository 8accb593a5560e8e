//! Integration tests for the write / index / stream cycle

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use statecap::config::Config;
use statecap::storage::{
    CaptureReader, CaptureStream, CaptureWriter, ChunkKind, Direction, FileHeader, NameVersion,
    NextKind, Record,
};
use statecap::CaptureError;

/// Write the two-record capture used by most tests
fn write_scenario(path: &Path) {
    let mut writer = CaptureWriter::create(path, None, b"").unwrap();
    writer.write_state(41, b"this is a state").unwrap();
    writer
        .write_packet(Direction::Outgoing, 42, b"this is a string")
        .unwrap();
    writer.close().unwrap();
}

#[test]
fn test_sequential_read_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.cap");
    write_scenario(&path);

    let reader = CaptureReader::open(&path).unwrap();
    assert!(reader.file_header().is_none());
    assert!(reader.schema().is_empty());
    assert_eq!(reader.state_count(), 1);
    assert_eq!(reader.packet_count(), 1);

    let mut cursor = reader.cursor();
    assert!(cursor.at_state());

    let state = cursor.read_next_state().unwrap();
    assert_eq!(state.timestamp_ms, 41);
    assert_eq!(&state.payload[..], b"this is a state");

    let packet = cursor.read_next_packet().unwrap().unwrap();
    assert_eq!(packet.direction, Direction::Outgoing);
    assert_eq!(packet.timestamp_ms, 42);
    assert_eq!(&packet.payload[..], b"this is a string");

    assert!(cursor.read_next_packet().unwrap().is_none());
    assert!(matches!(
        cursor.read_next_state(),
        Err(CaptureError::EndOfStream)
    ));
}

#[test]
fn test_seek_to_nearest_state_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.cap");
    write_scenario(&path);

    let reader = CaptureReader::open(&path).unwrap();
    let mut cursor = reader.cursor();

    let state = cursor.seek_and_get_state(51).unwrap();
    assert_eq!(state.timestamp_ms, 41);
    assert_eq!(&state.payload[..], b"this is a state");

    let packet = cursor.read_next_packet().unwrap().unwrap();
    assert_eq!(packet.direction, Direction::Outgoing);
    assert_eq!(packet.timestamp_ms, 42);
    assert_eq!(&packet.payload[..], b"this is a string");
}

#[test]
fn test_seek_before_first_state_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.cap");
    write_scenario(&path);

    let reader = CaptureReader::open(&path).unwrap();
    let mut cursor = reader.cursor();

    assert!(matches!(
        cursor.seek_and_get_state(10),
        Err(CaptureError::NoStateFound { timestamp_ms: 10 })
    ));

    // Rewind recovers a usable cursor
    cursor.rewind();
    assert_eq!(cursor.read_next_state().unwrap().timestamp_ms, 41);
}

#[test]
fn test_streaming_matches_indexed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.cap");
    write_scenario(&path);

    let reader = CaptureReader::open(&path).unwrap();
    let mut cursor = reader.cursor();
    let indexed_state = cursor.read_next_state().unwrap();
    let indexed_packet = cursor.read_next_packet().unwrap().unwrap();

    let file = File::open(&path).unwrap();
    let mut stream = CaptureStream::new(BufReader::new(file));

    assert_eq!(stream.peek_next_kind().unwrap(), NextKind::Known(ChunkKind::Schema));
    assert_eq!(
        stream.read_next_schema_text().unwrap(),
        String::from_utf8_lossy(reader.schema())
    );
    assert_eq!(stream.read_next_state().unwrap(), indexed_state);
    assert_eq!(stream.read_next_packet().unwrap(), indexed_packet);
    assert!(stream.is_at_end().unwrap());

    assert!(matches!(
        stream.seek_to(0),
        Err(CaptureError::UnsupportedBackwardSeek { requested: 0, .. })
    ));
}

#[test]
fn test_file_header_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("with-header.cap");

    let header = FileHeader {
        company: "Acme Games".to_string(),
        application: NameVersion::new("arena", "2.1.0"),
        schema: NameVersion::new("arena-state", "7"),
        engine: NameVersion::new("netcode", "0.9"),
        protocol: NameVersion::new("udp-reliable", "3"),
    };
    let mut writer = CaptureWriter::create(&path, Some(&header), b"{\"fields\":[]}").unwrap();
    writer.write_incoming(5, b"hello").unwrap();
    writer.write_state(6, b"snapshot").unwrap();
    writer.close().unwrap();

    let reader = CaptureReader::open(&path).unwrap();
    assert_eq!(reader.file_header(), Some(&header));
    assert_eq!(&reader.schema()[..], b"{\"fields\":[]}");
    assert_eq!(reader.first_timestamp(), Some(5));
    assert_eq!(reader.last_timestamp(), Some(6));
    assert_eq!(
        header.to_string(),
        "Acme Games arena 2.1.0 schema: arena-state 7 engine: netcode 0.9 protocol: udp-reliable 3"
    );

    let mut stream = CaptureStream::new(BufReader::new(File::open(&path).unwrap()));
    assert_eq!(stream.read_next_record().unwrap(), Some(Record::Header(header)));
}

#[test]
fn test_stateless_capture() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no-states.cap");

    let mut writer = CaptureWriter::create(&path, None, b"").unwrap();
    writer.write_incoming(1, b"a").unwrap();
    writer.write_outgoing(2, b"b").unwrap();
    writer.close().unwrap();

    let reader = CaptureReader::open(&path).unwrap();
    assert!(!reader.has_states());
    assert!(matches!(
        reader.require_states(),
        Err(CaptureError::MissingState)
    ));
    assert_eq!(reader.cursor().packets().count(), 2);

    let mut config = Config::default();
    config.reader.require_states = true;
    assert!(matches!(
        CaptureReader::open_with_config(&path, &config),
        Err(CaptureError::MissingState)
    ));
}

#[test]
fn test_missing_schema_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.cap");
    std::fs::write(&path, b"").unwrap();

    assert!(CaptureReader::open(&path).is_err());

    let mut stream = CaptureStream::new(&b""[..]);
    assert_eq!(stream.peek_next_kind().unwrap(), NextKind::End);
    assert!(matches!(
        stream.read_next_schema(),
        Err(CaptureError::EndOfStream)
    ));
}

#[derive(Debug, Clone)]
enum Op {
    Packet(Direction, u64, Vec<u8>),
    State(u64, Vec<u8>),
}

#[derive(Debug, Clone)]
struct Capture {
    header: Option<FileHeader>,
    ops: Vec<Op>,
}

impl Capture {
    /// Header and schema entries ahead of the first record
    fn leading(&self) -> usize {
        usize::from(self.header.is_some()) + 1
    }
}

fn arb_header() -> impl Strategy<Value = Option<FileHeader>> {
    prop::option::of(prop::collection::vec("[a-zA-Z0-9 .-]{0,16}", 9).prop_map(|strings| {
        let mut strings = strings.into_iter();
        let mut next = || strings.next().unwrap_or_default();
        FileHeader {
            company: next(),
            application: NameVersion::new(next(), next()),
            schema: NameVersion::new(next(), next()),
            engine: NameVersion::new(next(), next()),
            protocol: NameVersion::new(next(), next()),
        }
    }))
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = (
        any::<bool>(),
        any::<bool>(),
        0u64..1000,
        prop::collection::vec(any::<u8>(), 0..64),
    );
    prop::collection::vec(op, 0..40).prop_map(|raw| {
        let mut now = 0u64;
        raw.into_iter()
            .map(|(is_state, outgoing, delta, payload)| {
                now += delta;
                if is_state {
                    Op::State(now, payload)
                } else {
                    let direction = if outgoing {
                        Direction::Outgoing
                    } else {
                        Direction::Incoming
                    };
                    Op::Packet(direction, now, payload)
                }
            })
            .collect()
    })
}

fn arb_capture() -> impl Strategy<Value = Capture> {
    (arb_header(), arb_ops()).prop_map(|(header, ops)| Capture { header, ops })
}

fn write_capture(capture: &Capture) -> Vec<u8> {
    let mut writer = CaptureWriter::new(Vec::new(), capture.header.as_ref(), b"schema").unwrap();
    for op in &capture.ops {
        match op {
            Op::Packet(direction, timestamp_ms, payload) => {
                writer.write_packet(*direction, *timestamp_ms, payload).unwrap();
            }
            Op::State(timestamp_ms, payload) => writer.write_state(*timestamp_ms, payload).unwrap(),
        }
    }
    writer.finish().unwrap()
}

proptest! {
    #[test]
    fn cursor_replays_every_record_in_order(capture in arb_capture()) {
        let bytes = write_capture(&capture);
        let reader = CaptureReader::from_source(bytes, &Config::default()).unwrap();
        prop_assert_eq!(reader.file_header(), capture.header.as_ref());
        prop_assert_eq!(&reader.schema()[..], &b"schema"[..]);
        prop_assert_eq!(reader.len(), capture.leading() + capture.ops.len());

        let mut cursor = reader.cursor();
        for (i, op) in capture.ops.iter().enumerate() {
            let position = capture.leading() + i;
            prop_assert_eq!(cursor.position(), position);
            match op {
                Op::Packet(direction, timestamp_ms, payload) => {
                    prop_assert!(cursor.at_packet());
                    prop_assert!(!cursor.at_state());
                    let packet = cursor.read_next_packet().unwrap().unwrap();
                    prop_assert_eq!(packet.position, position);
                    prop_assert_eq!(packet.direction, *direction);
                    prop_assert_eq!(packet.timestamp_ms, *timestamp_ms);
                    prop_assert_eq!(&packet.payload[..], &payload[..]);
                }
                Op::State(timestamp_ms, payload) => {
                    prop_assert!(cursor.at_state());
                    prop_assert!(!cursor.at_packet());
                    let state = cursor.read_next_state().unwrap();
                    prop_assert_eq!(state.position, position);
                    prop_assert_eq!(state.timestamp_ms, *timestamp_ms);
                    prop_assert_eq!(&state.payload[..], &payload[..]);
                }
            }
        }
        prop_assert!(cursor.is_at_end());
        prop_assert!(cursor.read_next_packet().unwrap().is_none());
    }

    #[test]
    fn cursor_yields_packets_in_order(capture in arb_capture()) {
        let bytes = write_capture(&capture);
        let reader = CaptureReader::from_source(bytes, &Config::default()).unwrap();

        let expected: Vec<(Direction, u64, Vec<u8>)> = capture
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Packet(direction, timestamp_ms, payload) => {
                    Some((*direction, *timestamp_ms, payload.clone()))
                }
                Op::State(..) => None,
            })
            .collect();

        let mut cursor = reader.cursor();
        let actual: Vec<(Direction, u64, Vec<u8>)> = cursor
            .packets()
            .map(|packet| {
                let packet = packet.unwrap();
                (packet.direction, packet.timestamp_ms, packet.payload.to_vec())
            })
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn seek_finds_latest_state_not_after(capture in arb_capture(), query in 0u64..40_000) {
        let bytes = write_capture(&capture);
        let reader = CaptureReader::from_source(bytes, &Config::default()).unwrap();
        let mut cursor = reader.cursor();

        let expected = capture
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::State(timestamp_ms, payload) if *timestamp_ms <= query => {
                    Some((*timestamp_ms, payload.clone()))
                }
                _ => None,
            })
            .last();
        let has_states = capture.ops.iter().any(|op| matches!(op, Op::State(..)));

        match cursor.seek_and_get_state(query) {
            Ok(state) => {
                prop_assert_eq!(Some((state.timestamp_ms, state.payload.to_vec())), expected);
            }
            Err(CaptureError::NoStateFound { .. }) => {
                prop_assert!(has_states);
                prop_assert!(expected.is_none());
            }
            Err(CaptureError::MissingState) => prop_assert!(!has_states),
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn stream_sees_every_record(capture in arb_capture()) {
        let bytes = write_capture(&capture);
        let mut stream = CaptureStream::new(&bytes[..]);

        if let Some(header) = &capture.header {
            prop_assert_eq!(&stream.read_next_file_header().unwrap(), header);
        }
        prop_assert_eq!(&stream.read_next_schema().unwrap()[..], &b"schema"[..]);

        for op in &capture.ops {
            match (op, stream.read_next_record().unwrap()) {
                (Op::Packet(direction, timestamp_ms, payload), Some(Record::Packet(packet))) => {
                    prop_assert_eq!(packet.direction, *direction);
                    prop_assert_eq!(packet.timestamp_ms, *timestamp_ms);
                    prop_assert_eq!(&packet.payload[..], &payload[..]);
                }
                (Op::State(timestamp_ms, payload), Some(Record::State(state))) => {
                    prop_assert_eq!(state.timestamp_ms, *timestamp_ms);
                    prop_assert_eq!(&state.payload[..], &payload[..]);
                }
                (op, record) => prop_assert!(false, "{:?} read back as {:?}", op, record),
            }
        }
        prop_assert!(stream.read_next_record().unwrap().is_none());
    }
}
