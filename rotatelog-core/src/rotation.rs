//! Timestamp-based rotation of the active file.
//!
//! The active file `<path>` is renamed to `<path>.<YYYYMMDD-HH:MM:SS>` in
//! local time. When that name is already taken (two rotations inside the
//! same second) a zero-padded counter is appended: `<path>.<ts>.001`,
//! `<path>.<ts>.002`, … so a plain lexical sort lists rotations in order.
//! An existing file is never overwritten.
//!
//! Nothing in here emits log events: the operational log writer rotates its
//! own file through this module while it is being called by the logging
//! sink. Callers log the returned [`RotationOutcome`].

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{io_err, StreamError};
use crate::paths::ensure_parent_dir;

/// strftime pattern appended to the active path, leading dot included.
pub const ROTATED_SUFFIX_FORMAT: &str = ".%Y%m%d-%H:%M:%S";

/// Highest counter tried before a rotation is skipped.
pub const MAX_COLLISION_SUFFIX: u32 = 999;

type Clock = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Result of one rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    /// The active file was left where it is.
    Skipped { from: PathBuf, reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Every candidate name starting at `base` already exists.
    DestinationTaken { base: PathBuf },
    /// The active file disappeared before it could be renamed.
    SourceMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DestinationTaken { base } => write!(
                f,
                "{} and its {MAX_COLLISION_SUFFIX} numbered variants already exist",
                base.display()
            ),
            SkipReason::SourceMissing => f.write_str("active file no longer exists"),
        }
    }
}

/// Renames the active file to a free timestamped name.
pub struct Rotator {
    clock: Clock,
}

impl Default for Rotator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Rotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rotator").finish_non_exhaustive()
    }
}

impl Rotator {
    /// Rotator stamping names with the current local time.
    pub fn new() -> Self {
        Self::with_clock(Local::now)
    }

    pub fn with_clock(clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    /// Rename `path` to its timestamped name.
    ///
    /// # Errors
    /// Fails on directory creation or rename errors other than a missing
    /// source; collisions and a vanished source are reported as
    /// [`RotationOutcome::Skipped`].
    pub fn rotate(&self, path: &Path) -> Result<RotationOutcome, StreamError> {
        let base = rotated_path(path, (self.clock)());
        let Some(dest) = free_destination(&base) else {
            return Ok(RotationOutcome::Skipped {
                from: path.to_path_buf(),
                reason: SkipReason::DestinationTaken { base },
            });
        };

        ensure_parent_dir(&dest)?;

        match fs::rename(path, &dest) {
            Ok(()) => Ok(RotationOutcome::Renamed {
                from: path.to_path_buf(),
                to: dest,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !occupied(path) => {
                Ok(RotationOutcome::Skipped {
                    from: path.to_path_buf(),
                    reason: SkipReason::SourceMissing,
                })
            }
            Err(err) => Err(io_err(path, err)),
        }
    }
}

/// `<path>.<YYYYMMDD-HH:MM:SS>` for the given instant — pure, no I/O.
pub fn rotated_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(at.format(ROTATED_SUFFIX_FORMAT).to_string());
    PathBuf::from(name)
}

fn numbered(base: &Path, n: u32) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!(".{n:03}"));
    PathBuf::from(name)
}

fn free_destination(base: &Path) -> Option<PathBuf> {
    if !occupied(base) {
        return Some(base.to_path_buf());
    }
    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| numbered(base, n))
        .find(|candidate| !occupied(candidate))
}

// Dangling symlinks count as taken.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 14, 30, 5).unwrap()
    }

    fn fixed_rotator() -> Rotator {
        Rotator::with_clock(fixed_time)
    }

    #[test]
    fn rotated_name_appends_local_timestamp() {
        let path = Path::new("/var/log/app.log");
        assert_eq!(
            rotated_path(path, fixed_time()),
            PathBuf::from("/var/log/app.log.20240115-14:30:05")
        );
    }

    #[test]
    fn rotate_renames_active_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        fs::write(&log, b"line\n").unwrap();

        let outcome = fixed_rotator().rotate(&log).unwrap();
        let expected = dir.path().join("app.log.20240115-14:30:05");
        assert_eq!(
            outcome,
            RotationOutcome::Renamed {
                from: log.clone(),
                to: expected.clone()
            }
        );
        assert!(!log.exists(), "active path is free after rotation");
        assert_eq!(fs::read(&expected).unwrap(), b"line\n");
    }

    #[test]
    fn same_second_collision_gets_counter_suffix() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        let rotator = fixed_rotator();

        for round in 0..3u8 {
            fs::write(&log, [b'a' + round, b'\n']).unwrap();
            rotator.rotate(&log).unwrap();
        }

        let base = dir.path().join("app.log.20240115-14:30:05");
        assert_eq!(fs::read(&base).unwrap(), b"a\n");
        assert_eq!(fs::read(numbered(&base, 1)).unwrap(), b"b\n");
        assert_eq!(fs::read(numbered(&base, 2)).unwrap(), b"c\n");
    }

    #[test]
    fn lexical_order_of_collided_names_is_rotation_order() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        let rotator = fixed_rotator();

        for round in 0..12u32 {
            fs::write(&log, format!("{round}\n")).unwrap();
            rotator.rotate(&log).unwrap();
        }

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names[2], "app.log.20240115-14:30:05.002");
        assert_eq!(names[10], "app.log.20240115-14:30:05.010");

        let contents: Vec<String> = names
            .iter()
            .map(|n| fs::read_to_string(dir.path().join(n)).unwrap())
            .collect();
        let expected: Vec<String> = (0..12).map(|round| format!("{round}\n")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn exhausted_names_skip_without_overwriting() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        let base = rotated_path(&log, fixed_time());
        fs::write(&base, b"earliest").unwrap();
        for n in 1..=MAX_COLLISION_SUFFIX {
            fs::write(numbered(&base, n), b"older").unwrap();
        }
        fs::write(&log, b"active\n").unwrap();

        let outcome = fixed_rotator().rotate(&log).unwrap();
        assert!(matches!(
            outcome,
            RotationOutcome::Skipped {
                reason: SkipReason::DestinationTaken { .. },
                ..
            }
        ));
        assert_eq!(fs::read(&log).unwrap(), b"active\n", "active file stays put");
        assert_eq!(fs::read(&base).unwrap(), b"earliest");
    }

    #[test]
    fn vanished_active_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("gone.log");

        let outcome = fixed_rotator().rotate(&log).unwrap();
        assert_eq!(
            outcome,
            RotationOutcome::Skipped {
                from: log,
                reason: SkipReason::SourceMissing
            }
        );
    }
}
