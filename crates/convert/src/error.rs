//! Convert Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::time::Duration;

/// A conversion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// None of the configured converter tools were found on this system.
    #[display("no converter backend available (install AAXtoMP3 or FFmpeg)")]
    NoBackendAvailable,
    /// A configured backend id isn't one we know how to drive.
    #[display("unknown converter backend: {_0}")]
    UnknownBackend(#[error(not(source))] String),
    /// The converter process couldn't be started.
    #[display("unable to start converter")]
    Spawn,
    /// The converter exited unsuccessfully. `code` is `None` when it was
    /// killed by a signal.
    #[display("conversion failed (exit code {code:?}): {reason}")]
    Failed { code: Option<i32>, reason: String },
    /// The converter ran past the configured wall-clock limit and was killed.
    #[display("conversion timed out after {}s", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
    /// The caller cancelled the conversion; the converter was killed.
    #[display("conversion cancelled")]
    Cancelled,
    /// The converter reported success but produced no audio.
    #[display("converter produced no audio files")]
    NoOutput,
    #[display("I/O error during conversion")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io)
    }
}
