//! Rotation threshold.

/// Multiplier used for every megabyte-denominated size option.
pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Size at which the active file is rotated; `None` disables rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeLimit(Option<u64>);

impl SizeLimit {
    /// Rotation never happens.
    pub const DISABLED: SizeLimit = SizeLimit(None);

    /// Zero or negative disables rotation.
    pub fn from_bytes(bytes: i64) -> Self {
        if bytes <= 0 {
            Self::DISABLED
        } else {
            SizeLimit(Some(bytes as u64))
        }
    }

    /// Zero or negative disables rotation. Saturates instead of overflowing.
    pub fn from_megabytes(megabytes: i64) -> Self {
        if megabytes <= 0 {
            Self::DISABLED
        } else {
            SizeLimit(Some((megabytes as u64).saturating_mul(BYTES_PER_MEGABYTE)))
        }
    }

    pub fn bytes(&self) -> Option<u64> {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// `size >= limit` when enabled.
    pub fn is_reached(&self, size: u64) -> bool {
        match self.0 {
            Some(limit) => size >= limit,
            None => false,
        }
    }
}
