//! Replays an allocation trace against a fresh heap and records the outcome
//! of every allocation.

use std::{
  fs::File,
  io::BufWriter,
  path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use fitalloc::trace::{self, Trace};
use tracing_subscriber::EnvFilter;

/// Replay a trace file through the first-fit allocator.
#[derive(Parser)]
#[command(name = "fitalloc-trace")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Trace file to replay
  #[arg(short, long)]
  trace: PathBuf,

  /// File that receives one `success<TAB>payload_offset<TAB>hops` line per allocation
  #[arg(short, long)]
  output: PathBuf,

  /// Increase verbosity (-v, -vv, -vvv)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = match cli.verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  tracing::info!(trace = %cli.trace.display(), "testing trace file");
  let trace = Trace::from_path(&cli.trace)
    .with_context(|| format!("Failed to read trace file: {}", cli.trace.display()))?;

  let output = File::create(&cli.output)
    .with_context(|| format!("Could not open {} for writing output", cli.output.display()))?;

  let summary = trace::replay(&trace, BufWriter::new(output))
    .with_context(|| format!("Failed to replay {}", cli.trace.display()))?;

  tracing::info!(
    allocations = summary.allocations,
    failed = summary.failed_allocations,
    frees = summary.frees,
    rejected_frees = summary.rejected_frees,
    free_bytes = summary.stats.free_bytes,
    largest_free = summary.stats.largest_free,
    "replay finished"
  );
  println!("output has been written to: {}", cli.output.display());

  Ok(())
}
