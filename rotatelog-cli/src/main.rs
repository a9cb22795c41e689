//! rotatelog — copy a byte stream into a log file, rotating it by size.
//!
//! # Usage
//!
//! ```text
//! rotatelog --log-path <PATH> --max-log-size <MB>
//!           [--fifo-path <PATH>]
//!           [--rotation-log-path <PATH>] [--max-rotation-log-size <MB>]
//! ```
//!
//! Without `--fifo-path` the stream is read from stdin. Rotated files are
//! named `<log-path>.<YYYYMMDD-HH:MM:SS>`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Dispatch;

use rotatelog_core::{InputSource, SizeLimit, StreamConfig};
use rotatelog_runtime::{build_dispatch, LogOutput, RunOutcome, Supervisor};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rotatelog",
    version,
    about = "Log rotation utility: copy a FIFO or stdin into a size-rotated log file",
    long_about = None,
)]
struct Cli {
    /// FIFO file path; if not provided, read from stdin.
    #[arg(long)]
    fifo_path: Option<PathBuf>,

    /// Log file path.
    #[arg(long)]
    log_path: PathBuf,

    /// Max log file size (MB); 0 for no rotation.
    #[arg(long, allow_negative_numbers = true)]
    max_log_size: i64,

    /// Path of the log output of this rotation process; if not provided, output to stderr.
    #[arg(long)]
    rotation_log_path: Option<PathBuf>,

    /// Max file size (MB) for this rotation log; 0 for no rotation.
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    max_rotation_log_size: i64,
}

impl Cli {
    fn log_output(&self) -> LogOutput {
        match &self.rotation_log_path {
            Some(path) => LogOutput::File {
                path: path.clone(),
                limit: SizeLimit::from_megabytes(self.max_rotation_log_size),
            },
            None => LogOutput::Stderr,
        }
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            input: InputSource::from_path(self.fifo_path.clone()),
            log_path: self.log_path.clone(),
            limit: SizeLimit::from_megabytes(self.max_log_size),
        }
    }

    fn run(self, supervisor: Supervisor, sink: Dispatch) -> Result<RunOutcome> {
        let config = self.stream_config();
        let (rotation_log_path, max_rotation_log_size) = match self.log_output() {
            LogOutput::File { path, limit } => {
                (path.display().to_string(), limit.bytes().unwrap_or(0))
            }
            LogOutput::Stderr => ("stderr".to_string(), 0),
        };
        // Sizes in bytes; 0 means rotation is disabled.
        tracing::info!(
            input = %config.input.describe(),
            log_path = %config.log_path.display(),
            max_log_size = config.limit.bytes().unwrap_or(0),
            rotation_log_path = %rotation_log_path,
            max_rotation_log_size,
            "Start logging and rotating",
        );
        supervisor
            .run(config, sink)
            .with_context(|| format!("rotating into {} failed", self.log_path.display()))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Signal handlers go in first so no later startup step can miss one.
    let supervisor = match Supervisor::install() {
        Ok(supervisor) => supervisor,
        Err(err) => {
            eprintln!("rotatelog: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let sink = match build_dispatch(&cli.log_output()) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("rotatelog: cannot set up logging: {err}");
            return ExitCode::FAILURE;
        }
    };
    let _scope = tracing::dispatcher::set_default(&sink);

    let code = match cli.run(supervisor, sink.clone()) {
        Ok(RunOutcome::Finished(report)) => {
            tracing::info!(
                bytes = report.bytes,
                dropped = report.dropped,
                rotations = report.rotations,
                skipped_rotations = report.skipped_rotations,
                "stream closed",
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Interrupted(_)) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("Process finished.");
    code
}
