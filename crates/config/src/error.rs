//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant means the configuration needs fixing by hand.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported configuration format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A value has the wrong type or shape.
    #[display("invalid configuration: {_0}")]
    Extract(#[error(not(source))] String),
    #[display("tracks.index_width must be 3 or 4, got {_0}")]
    IndexWidth(#[error(not(source))] usize),
    #[display("converter.timeout must be at least one second")]
    Timeout,
    #[display("converter.backends must list at least one backend")]
    NoBackends,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
