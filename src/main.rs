//! Relaybench simulator: replays a JSON step list against a simulated
//! fixture.
//!
//! ```text
//! relaybench-sim [--config fixture.json] [--verbose] script.json
//! ```
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │  JsonConfigFile   SimulatedDaq   SystemClock   LogEventSink
//! │  (ConfigPort)     (OutputPort)   (Clock)       (EventSink)
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │        Bench (relays · power · safety)         │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Violations are logged and the script continues; the process exits
//! non-zero if any step failed.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};

use relaybench::Bench;
use relaybench::adapters::config_file::JsonConfigFile;
use relaybench::adapters::log_sink::LogEventSink;
use relaybench::adapters::sim::SimulatedDaq;
use relaybench::adapters::time::SystemClock;
use relaybench::app::commands::BenchCommand;
use relaybench::app::ports::ConfigPort;
use relaybench::config::BenchConfig;

/// Replay a JSON step list against a simulated fixture.
#[derive(Parser)]
#[command(name = "relaybench-sim", version)]
struct Args {
    /// Fixture description (defaults to the built-in 18-relay fixture)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Step list to replay
    script: PathBuf,

    /// Show debug messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .format_target(false)
        .init();

    info!("Relaybench simulator v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Fixture description ────────────────────────────────
    let config = match &args.config {
        Some(path) => JsonConfigFile::new(path)
            .load()
            .with_context(|| format!("loading fixture config {}", path.display()))?,
        None => BenchConfig::default(),
    };

    // ── 2. Step list ──────────────────────────────────────────
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;
    let steps: Vec<BenchCommand> =
        serde_json::from_str(&text).with_context(|| format!("parsing script {}", args.script.display()))?;
    info!("{} steps loaded from {}", steps.len(), args.script.display());

    // ── 3. Bench ──────────────────────────────────────────────
    let port = SimulatedDaq::new(config.relays.iter().copied());
    let mut bench = Bench::new(&config, port, SystemClock::new(), LogEventSink::new())
        .context("building bench")?;

    // ── 4. Replay ─────────────────────────────────────────────
    let mut failed = 0usize;
    for (i, step) in steps.iter().enumerate() {
        if let Err(e) = bench.handle_command(step) {
            error!("step {}: {}", i + 1, e);
            failed += 1;
        }
    }

    info!(
        "Done: enabled={:?} rail={} aux={}",
        bench.enabled().iter().map(|r| r.0).collect::<Vec<_>>(),
        bench
            .voltage()
            .map_or_else(|| "unmapped".to_owned(), |v| v.to_string()),
        bench.aux()
    );
    if failed > 0 {
        bail!("{failed} of {} steps failed", steps.len());
    }
    Ok(())
}
