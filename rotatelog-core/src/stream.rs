//! The copy-rotate loop.
//!
//! ```text
//! loop {
//!     open <log_path> (append)
//!     copy one byte at a time, flushing each
//!         until a '\n' leaves the file at or above the limit
//!     close, rename to <log_path>.<timestamp>
//! } until end of input
//! ```
//!
//! Reading single bytes keeps a rotation boundary from ever splitting a
//! multi-byte character; the size is only looked at right after a newline.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use tracing::Dispatch;

use crate::error::StreamError;
use crate::input::InputSource;
use crate::limit::SizeLimit;
use crate::paths::{ensure_parent_dir, open_append};
use crate::rotation::{RotationOutcome, Rotator};
use crate::shutdown::Shutdown;

/// What to copy, where to, and when to rotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub input: InputSource,
    pub log_path: PathBuf,
    pub limit: SizeLimit,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    EndOfInput,
    Cancelled,
}

/// Totals for one run of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub bytes: u64,
    /// Bytes read but lost to a failed write.
    pub dropped: u64,
    pub rotations: u64,
    pub skipped_rotations: u64,
    pub outcome: CopyOutcome,
}

enum Segment {
    Boundary,
    EndOfInput,
    Cancelled,
}

/// Copies `input` into the active log file, rotating on newline boundaries.
pub struct StreamRotator<R> {
    input: R,
    log_path: PathBuf,
    limit: SizeLimit,
    rotator: Rotator,
    shutdown: Shutdown,
    sink: Dispatch,
}

impl<R: Read> StreamRotator<R> {
    /// The logging sink defaults to the dispatcher current at construction.
    pub fn new(input: R, log_path: impl Into<PathBuf>, limit: SizeLimit) -> Self {
        Self {
            input,
            log_path: log_path.into(),
            limit,
            rotator: Rotator::new(),
            shutdown: Shutdown::new(),
            sink: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    pub fn with_rotator(mut self, rotator: Rotator) -> Self {
        self.rotator = rotator;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_sink(mut self, sink: Dispatch) -> Self {
        self.sink = sink;
        self
    }

    /// Run until end of input or a shutdown request.
    ///
    /// # Errors
    /// Opening the active file, creating its directory, or renaming it are
    /// fatal. Read and write failures on individual bytes are logged and the
    /// loop moves on to the next read; a byte whose write failed is dropped.
    pub fn run(&mut self) -> Result<CopyReport, StreamError> {
        let sink = self.sink.clone();
        tracing::dispatcher::with_default(&sink, || self.run_loop())
    }

    fn run_loop(&mut self) -> Result<CopyReport, StreamError> {
        let mut report = CopyReport {
            bytes: 0,
            dropped: 0,
            rotations: 0,
            skipped_rotations: 0,
            outcome: CopyOutcome::EndOfInput,
        };

        loop {
            ensure_parent_dir(&self.log_path)?;
            let file = open_append(&self.log_path)?;

            // `file` is moved in and dropped before rotation.
            match self.copy_segment(file, &mut report) {
                Segment::Boundary => {}
                Segment::EndOfInput => {
                    tracing::info!("Read EOF, now closing...");
                    report.outcome = CopyOutcome::EndOfInput;
                    return Ok(report);
                }
                Segment::Cancelled => {
                    tracing::info!(path = %self.log_path.display(), "shutdown requested, active log closed");
                    report.outcome = CopyOutcome::Cancelled;
                    return Ok(report);
                }
            }

            match self.rotator.rotate(&self.log_path)? {
                RotationOutcome::Renamed { from, to } => {
                    tracing::info!(from = %from.display(), to = %to.display(), "rotated log file");
                    report.rotations += 1;
                }
                RotationOutcome::Skipped { from, reason } => {
                    tracing::warn!(path = %from.display(), %reason, "skipped log rotation");
                    report.skipped_rotations += 1;
                }
            }
        }
    }

    fn copy_segment(&mut self, mut file: File, report: &mut CopyReport) -> Segment {
        let mut byte = [0u8; 1];
        loop {
            if self.shutdown.is_requested() {
                return Segment::Cancelled;
            }

            match self.input.read(&mut byte) {
                Ok(0) => return Segment::EndOfInput,
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!(error = %err, "read from input failed");
                    continue;
                }
            }

            if let Err(err) = file.write_all(&byte).and_then(|()| file.flush()) {
                tracing::error!(
                    path = %self.log_path.display(),
                    error = %err,
                    "write to active log failed, byte dropped",
                );
                report.dropped += 1;
                continue;
            }
            report.bytes += 1;

            if byte[0] == b'\n' && self.limit_reached(&file) {
                return Segment::Boundary;
            }
        }
    }

    fn limit_reached(&self, file: &File) -> bool {
        if !self.limit.is_enabled() {
            return false;
        }
        match file.metadata() {
            Ok(meta) => self.limit.is_reached(meta.len()),
            Err(err) => {
                tracing::error!(
                    path = %self.log_path.display(),
                    error = %err,
                    "could not stat active log",
                );
                false
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
