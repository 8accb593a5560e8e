//! Text rendering of capture records

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::ViewConfig;
use crate::storage::{Direction, PacketRecord, StateRecord};

const HEX_DUMP_ROW: usize = 16;

/// Hex dump with offsets and an ASCII gutter, 16 bytes per row
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(HEX_DUMP_ROW).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:08x} ", row * HEX_DUMP_ROW));

        let encoded = hex::encode(chunk);
        for column in 0..HEX_DUMP_ROW {
            // Extra gap between the two halves of a row
            if column == HEX_DUMP_ROW / 2 {
                out.push(' ');
            }
            match encoded.get(column * 2..column * 2 + 2) {
                Some(pair) => {
                    out.push(' ');
                    out.push_str(pair);
                }
                None => out.push_str("   "),
            }
        }

        out.push_str("  |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('|');
    }
    out
}

/// Standard base64 encoding
#[must_use]
pub fn base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Arrow label for a packet direction
#[must_use]
pub const fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "<< (in)",
        Direction::Outgoing => ">> (out)",
    }
}

/// One-line summary of a packet
#[must_use]
pub fn packet_line(packet: &PacketRecord) -> String {
    format!(
        "#{:04} {} time:{} ({} octets)",
        packet.position,
        direction_label(packet.direction),
        packet.timestamp_ms,
        packet.payload.len()
    )
}

/// One-line summary of a state snapshot
#[must_use]
pub fn state_line(state: &StateRecord) -> String {
    format!(
        "#{:04} * (state) time:{} ({} octets)",
        state.position,
        state.timestamp_ms,
        state.payload.len()
    )
}

/// Payload body as configured: hex dump and/or base64, clipped to
/// `max_dump_octets`
#[must_use]
pub fn render_payload(payload: &[u8], config: &ViewConfig) -> String {
    let shown = &payload[..payload.len().min(config.max_dump_octets)];
    let mut sections = Vec::with_capacity(3);

    if config.hex_dump && !shown.is_empty() {
        sections.push(hex_dump(shown));
    }
    if config.base64 {
        sections.push(base64(shown));
    }
    if shown.len() < payload.len() {
        sections.push(format!("... {} more octets", payload.len() - shown.len()));
    }

    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_hex_dump_rows() {
        let dump = hex_dump(b"this is a string");
        assert_eq!(
            dump,
            "00000000  74 68 69 73 20 69 73 20  61 20 73 74 72 69 6e 67  |this is a string|"
        );

        let dump = hex_dump(b"0123456789abcdef\x00\xff");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "00000010  00 ff                                             |..|"
        );
    }

    #[test]
    fn test_hex_dump_empty() {
        assert_eq!(hex_dump(b""), "");
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64(b"this is a state"), "dGhpcyBpcyBhIHN0YXRl");
    }

    #[test]
    fn test_record_lines() {
        let packet = PacketRecord {
            position: 2,
            direction: Direction::Outgoing,
            timestamp_ms: 42,
            payload: Bytes::from_static(b"this is a string"),
        };
        assert_eq!(packet_line(&packet), "#0002 >> (out) time:42 (16 octets)");

        let state = StateRecord {
            position: 1,
            timestamp_ms: 41,
            payload: Bytes::from_static(b"this is a state"),
        };
        assert_eq!(state_line(&state), "#0001 * (state) time:41 (15 octets)");

        assert_eq!(direction_label(Direction::Incoming), "<< (in)");
    }

    #[test]
    fn test_render_payload_clipped() {
        let config = ViewConfig {
            hex_dump: false,
            base64: true,
            max_dump_octets: 3,
        };
        assert_eq!(render_payload(b"abcdef", &config), "YWJj\n... 3 more octets");
    }

    #[test]
    fn test_render_payload_default() {
        let rendered = render_payload(b"hi", &ViewConfig::default());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  68 69"));
        assert_eq!(lines[1], "aGk=");
    }
}
