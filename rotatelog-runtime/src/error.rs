use std::path::PathBuf;

use rotatelog_core::StreamError;
use thiserror::Error;

/// Error surface for logging setup and the supervised run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install {signal} handler: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("copy task join failure: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        path: path.into(),
        source,
    }
}
