//! Error types for rotatelog-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while validating input or copying the stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured FIFO path does not exist.
    #[error("{path} does not exist")]
    InputNotFound { path: PathBuf },

    /// The configured FIFO path exists but is some other kind of file.
    #[error("{path} exists and is not a FIFO")]
    NotAFifo { path: PathBuf },
}

impl StreamError {
    /// `true` for errors caused by bad configuration rather than runtime I/O.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StreamError::InputNotFound { .. } | StreamError::NotAFifo { .. }
        )
    }
}

/// Convenience constructor for [`StreamError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StreamError {
    StreamError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_offending_path() {
        let err = StreamError::NotAFifo {
            path: PathBuf::from("/tmp/input"),
        };
        assert!(err.is_config_error());
        assert_eq!(err.to_string(), "/tmp/input exists and is not a FIFO");

        let err = StreamError::InputNotFound {
            path: PathBuf::from("/tmp/missing"),
        };
        assert!(err.is_config_error());
        assert_eq!(err.to_string(), "/tmp/missing does not exist");
    }

    #[test]
    fn io_errors_are_not_config_errors() {
        let err = io_err(
            "/var/log/app.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_config_error());
        assert!(err.to_string().contains("/var/log/app.log"));
    }
}
