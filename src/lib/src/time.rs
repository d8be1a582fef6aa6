//! Time sources for the authoring path.
//!
//! Validation never samples a clock: expiration checks use the commit's
//! reference time supplied by the git collaborator, so a validation run is
//! deterministic and replayable. Only the authoring path needs "now" to
//! stamp expirations on new documents, and takes it through this
//! abstraction so tests and offline signing ceremonies can pin it.

use crate::error::SealError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pluggable source of the current time.
pub trait TimeSource: Send + Sync {
    /// Current time as Unix seconds.
    fn now_unix(&self) -> Result<u64, SealError>;
}

/// System clock. The default for interactive authoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_unix(&self) -> Result<u64, SealError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SealError::Internal(format!("system clock before epoch: {}", e)))?;
        Ok(now.as_secs())
    }
}

/// Fixed timestamp, for tests and reproducible signing ceremonies.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(u64);

impl FixedTimeSource {
    /// Pin the source to a Unix timestamp.
    pub fn from_unix_secs(secs: u64) -> Self {
        FixedTimeSource(secs)
    }
}

impl TimeSource for FixedTimeSource {
    fn now_unix(&self) -> Result<u64, SealError> {
        Ok(self.0)
    }
}
