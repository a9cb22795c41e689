//! rotatelog core — stream copying with size-triggered rotation.
//!
//! - [`input`] — stdin / named-pipe input validation
//! - [`paths`] — parent directory creation, append-mode opening
//! - [`limit`] — [`SizeLimit`] threshold
//! - [`rotation`] — timestamped rename of the active file
//! - [`stream`] — the byte-wise copy-rotate loop
//! - [`error`] — [`StreamError`]

pub mod error;
pub mod input;
pub mod limit;
pub mod paths;
pub mod rotation;
pub mod shutdown;
pub mod stream;

pub use error::StreamError;
pub use input::InputSource;
pub use limit::{SizeLimit, BYTES_PER_MEGABYTE};
pub use rotation::{rotated_path, RotationOutcome, Rotator};
pub use shutdown::Shutdown;
pub use stream::{CopyOutcome, CopyReport, StreamConfig, StreamRotator};
