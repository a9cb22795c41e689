//! Operational log sink.
//!
//! Every event becomes one line:
//!
//! ```text
//! 2024-01-15 14:30:05.123 - 4242 - INFO - rotated log file from=/var/log/app.log to=...
//! ```
//!
//! Lines go to stderr, or to a file that rotates itself by size with the same
//! timestamped-rename scheme as the data stream. No global subscriber is
//! installed; callers receive a [`Dispatch`] and scope it where needed.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use rotatelog_core::paths::{ensure_parent_dir, open_append};
use rotatelog_core::{RotationOutcome, Rotator, SizeLimit};

use crate::error::{io_err, RuntimeError};

/// Millisecond-precision local time at the start of every line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Where operational log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File { path: PathBuf, limit: SizeLimit },
}

/// `timestamp - pid - LEVEL - message fields`
#[derive(Debug, Clone)]
pub struct LineFormat {
    pid: u32,
}

impl LineFormat {
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
        }
    }
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - {} - ",
            Local::now().format(TIMESTAMP_FORMAT),
            self.pid,
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Build the logging sink for `output`.
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`.
pub fn build_dispatch(output: &LogOutput) -> Result<Dispatch, RuntimeError> {
    let writer = match output {
        LogOutput::Stderr => BoxMakeWriter::new(io::stderr),
        LogOutput::File { path, limit } => {
            BoxMakeWriter::new(Mutex::new(RotatingLogFile::open(path, *limit)?))
        }
    };
    Ok(dispatch_with_writer(writer))
}

pub(crate) fn dispatch_with_writer<W>(writer: W) -> Dispatch
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(LineFormat::new())
        .with_writer(writer)
        .finish();
    Dispatch::new(subscriber)
}

/// Append-only log file that renames itself once it reaches `limit`.
///
/// The size is checked before each write: if the incoming record would take
/// a non-empty file to the limit, the file is closed, rotated, and reopened
/// first. Rotation problems are reported on stderr since this writer *is*
/// the log.
#[derive(Debug)]
pub struct RotatingLogFile {
    path: PathBuf,
    limit: SizeLimit,
    rotator: Rotator,
    file: Option<File>,
    size: u64,
}

impl RotatingLogFile {
    pub fn open(path: impl AsRef<Path>, limit: SizeLimit) -> Result<Self, RuntimeError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;
        let file = open_append(&path)?;
        let size = file.metadata().map_err(|e| io_err(&path, e))?.len();
        Ok(Self {
            path,
            limit,
            rotator: Rotator::new(),
            file: Some(file),
            size,
        })
    }

    pub fn with_rotator(mut self, rotator: Rotator) -> Self {
        self.rotator = rotator;
        self
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        self.size > 0 && self.limit.is_reached(self.size.saturating_add(incoming as u64))
    }

    fn rotate(&mut self) {
        // Close before renaming.
        self.file = None;
        match self.rotator.rotate(&self.path) {
            Ok(RotationOutcome::Renamed { .. }) => {}
            Ok(RotationOutcome::Skipped { from, reason }) => {
                eprintln!("rotatelog: skipped rotation of {}: {reason}", from.display());
            }
            Err(err) => eprintln!("rotatelog: {err}"),
        }
    }

    fn active_file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            ensure_parent_dir(&self.path).map_err(io::Error::other)?;
            let file = open_append(&self.path).map_err(io::Error::other)?;
            self.size = file.metadata()?.len();
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            self.rotate();
        }
        let written = self.active_file()?.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
