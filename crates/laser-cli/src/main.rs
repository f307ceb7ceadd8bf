//! `lasercut` entry point.
//!
//! Decodes, compiles and sends programs for the laser cutter controller.
//!
//! # Usage
//!
//! ```text
//! lasercut [--config <PATH>] decode <INFILE> <OUTFILE> [--listing]
//! lasercut [--config <PATH>] compile <GEOMETRY.json> <OUTFILE>
//! lasercut [--config <PATH>] send <PROGRAM> [--device <PATH>]
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML file or defaults
//!  └─ tracing_subscriber      -- RUST_LOG, else [general] log_level
//!  └─ subcommand
//!       ├─ decode   read file → decode_and_verify → write file
//!       ├─ compile  read_layers → compile_job → write file
//!       └─ send     read file → FileChannel + ResetSequence → send_program
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use laser_cli::application::compile_job::compile_job;
use laser_cli::application::decode_file::{decode_and_verify, render_listing};
use laser_cli::application::send_program::send_program;
use laser_cli::infrastructure::geometry_input::read_layers;
use laser_cli::infrastructure::storage::config::{load_config, AppConfig};
use laser_cli::infrastructure::transport::file::FileChannel;
use laser_cli::infrastructure::transport::{ResetSequence, Transport};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Laser cutter program tool.
#[derive(Debug, Parser)]
#[command(
    name = "lasercut",
    about = "Decode, compile and send laser cutter programs",
    version
)]
struct Cli {
    /// Configuration file.  Defaults to the platform config directory.
    #[arg(long, global = true, env = "LASERCUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a program, re-encode it and check the result is identical.
    Decode {
        /// Scrambled program file to read.
        infile: PathBuf,
        /// Where to write the re-encoded program.
        outfile: PathBuf,
        /// Print every decoded message and a machine-state summary.
        #[arg(long)]
        listing: bool,
    },

    /// Compile a JSON geometry file into a scrambled program.
    Compile {
        /// Geometry input (layers with line segments in millimetres).
        geometry: PathBuf,
        /// Where to write the program.
        outfile: PathBuf,
    },

    /// Reset the controller and send a program file to it.
    Send {
        /// Scrambled program file to send.
        program: PathBuf,
        /// Device node.  Overrides `[transport] device`.
        #[arg(long)]
        device: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    match cli.command {
        Command::Decode {
            infile,
            outfile,
            listing,
        } => run_decode(&config, &infile, &outfile, listing),
        Command::Compile { geometry, outfile } => run_compile(&config, &geometry, &outfile),
        Command::Send { program, device } => run_send(&config, &program, device),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_decode(config: &AppConfig, infile: &Path, outfile: &Path, listing: bool) -> anyhow::Result<()> {
    let wire = std::fs::read(infile).with_context(|| format!("failed to read {}", infile.display()))?;

    let report = decode_and_verify(&wire, config.decode.strict)
        .with_context(|| format!("failed to decode {}", infile.display()))?;

    std::fs::write(outfile, &report.output)
        .with_context(|| format!("failed to write {}", outfile.display()))?;

    if listing {
        print!("{}", render_listing(&report.program));
    }
    info!(
        "{} → {}: {} bytes, round trip identical",
        infile.display(),
        outfile.display(),
        wire.len()
    );
    Ok(())
}

fn run_compile(config: &AppConfig, geometry: &Path, outfile: &Path) -> anyhow::Result<()> {
    let layers = read_layers(geometry)?;

    let job = compile_job(&layers, config.compiler)
        .with_context(|| format!("failed to compile {}", geometry.display()))?;

    std::fs::write(outfile, &job.wire)
        .with_context(|| format!("failed to write {}", outfile.display()))?;

    info!("{} → {}: {} bytes", geometry.display(), outfile.display(), job.wire.len());
    Ok(())
}

fn run_send(config: &AppConfig, program: &Path, device: Option<PathBuf>) -> anyhow::Result<()> {
    let wire = std::fs::read(program).with_context(|| format!("failed to read {}", program.display()))?;

    let device = device.unwrap_or_else(|| config.transport.device.clone());
    let channel = FileChannel::open(&device)?;
    let reset = ResetSequence::new(
        Duration::from_millis(config.transport.reset_settle_ms),
        Duration::from_millis(config.transport.init_pulse_ms),
    );
    info!(
        device = %device.display(),
        baud_rate = config.transport.baud_rate,
        "sending program"
    );

    let mut transport = Transport::new(channel, reset);
    let report = send_program(&mut transport, &wire)
        .with_context(|| format!("failed to send {}", program.display()))?;

    info!("sent {} bytes ({} messages)", report.bytes, report.messages);
    Ok(())
}
