//! Input source selection and named-pipe validation.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{io_err, StreamError};

/// Where the byte stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// The process's standard input.
    Stdin,
    /// A pre-existing named pipe. Never created by rotatelog.
    Fifo(PathBuf),
}

impl InputSource {
    /// Absent path ⇒ stdin.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => InputSource::Fifo(path),
            None => InputSource::Stdin,
        }
    }

    /// Label used in log lines.
    pub fn describe(&self) -> String {
        match self {
            InputSource::Stdin => "stdin".to_string(),
            InputSource::Fifo(path) => path.display().to_string(),
        }
    }

    /// Check that a configured FIFO path exists and is a named pipe.
    ///
    /// Stdin is accepted unconditionally.
    pub fn validate(&self) -> Result<(), StreamError> {
        match self {
            InputSource::Stdin => Ok(()),
            InputSource::Fifo(path) => check_fifo(path),
        }
    }

    /// Validate, then open the source for reading.
    ///
    /// Opening a FIFO blocks until a writer connects.
    pub fn open(&self) -> Result<Box<dyn Read + Send>, StreamError> {
        self.validate()?;
        match self {
            InputSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            InputSource::Fifo(path) => {
                let file = File::open(path).map_err(|e| io_err(path, e))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

fn check_fifo(path: &Path) -> Result<(), StreamError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StreamError::InputNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(path, err)),
    };

    if is_fifo(&meta) {
        Ok(())
    } else {
        Err(StreamError::NotAFifo {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(unix)]
fn is_fifo(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_fifo()
}

#[cfg(not(unix))]
fn is_fifo(_meta: &fs::Metadata) -> bool {
    false
}
