//! Statecap CLI
//!
//! Dumps a capture file: the file header, the schema, then every packet and
//! state with a hex/base64 rendering of its payload.
//!
//! ```bash
//! statecap session.cap
//! cat session.cap | statecap
//! statecap session.cap --from 120000
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use statecap::config::{Config, ViewConfig};
use statecap::storage::{CaptureReader, CaptureStream, ChunkKind, NextKind, Record};
use statecap::view;

#[derive(Parser)]
#[command(name = "statecap")]
#[command(version, about = "Dump packet/state capture files", long_about = None)]
struct Cli {
    /// Capture file; standard input when omitted
    path: Option<PathBuf>,

    /// Start at the nearest state at or before this timestamp (ms)
    #[arg(long, value_name = "MS", requires = "path")]
    from: Option<u64>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match (&cli.path, cli.from) {
        (Some(path), Some(timestamp_ms)) => dump_from(path, timestamp_ms, &config, &mut out),
        (Some(path), None) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            info!("Dumping {}", path.display());
            dump_stream(BufReader::new(file), &config, &mut out)
        }
        (None, _) => dump_stream(io::stdin().lock(), &config, &mut out),
    }
}

fn dump_stream(source: impl Read, config: &Config, out: &mut impl Write) -> Result<()> {
    let mut stream = CaptureStream::with_limits(source, &config.limits);

    if stream.peek_next_kind()? == NextKind::Known(ChunkKind::Header) {
        let header = stream.read_next_file_header()?;
        writeln!(out, "{header}")?;
    }

    if stream.peek_next_kind()? != NextKind::Known(ChunkKind::Schema) {
        bail!("Capture must start with a schema");
    }
    let schema = stream.read_next_schema_text()?;
    writeln!(out, "schema:\n{schema}\n")?;

    let mut records = 0usize;
    while let Some(record) = stream
        .read_next_record()
        .with_context(|| format!("Failed at byte offset {}", stream.position()))?
    {
        match record {
            Record::Packet(packet) => {
                writeln!(out, "{}", view::packet_line(&packet))?;
                write_payload(out, &packet.payload, &config.view)?;
            }
            Record::State(state) => {
                writeln!(out, "{}", view::state_line(&state))?;
                write_payload(out, &state.payload, &config.view)?;
            }
            Record::Header(_) | Record::Schema(_) => {
                bail!("Header or schema chunk after the first record")
            }
        }
        records += 1;
    }

    info!("Done: {} records", records);
    Ok(())
}

fn dump_from(path: &Path, timestamp_ms: u64, config: &Config, out: &mut impl Write) -> Result<()> {
    let reader = CaptureReader::open_with_config(path, config)
        .with_context(|| format!("Failed to open capture {}", path.display()))?;

    if let Some(header) = reader.file_header() {
        writeln!(out, "{header}")?;
    }
    writeln!(
        out,
        "schema:\n{}\n",
        String::from_utf8_lossy(reader.schema())
    )?;

    let mut cursor = reader.cursor();
    let state = cursor
        .seek_and_get_state(timestamp_ms)
        .with_context(|| format!("Failed to seek to {timestamp_ms} ms"))?;
    writeln!(out, "{}", view::state_line(&state))?;
    write_payload(out, &state.payload, &config.view)?;

    for packet in cursor.packets() {
        let packet = packet?;
        writeln!(out, "{}", view::packet_line(&packet))?;
        write_payload(out, &packet.payload, &config.view)?;
    }

    Ok(())
}

fn write_payload(out: &mut impl Write, payload: &[u8], config: &ViewConfig) -> io::Result<()> {
    let rendered = view::render_payload(payload, config);
    if rendered.is_empty() {
        writeln!(out)
    } else {
        writeln!(out, "{rendered}\n")
    }
}
