//! Filesystem helpers for the active log path.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::error::{io_err, StreamError};

/// Create every missing parent directory of `path`.
///
/// A bare file name (empty parent) is a no-op; existing directories are fine.
pub fn ensure_parent_dir(path: &Path) -> Result<(), StreamError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))
        }
        _ => Ok(()),
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_append(path: &Path) -> Result<File, StreamError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))
}
