//! Database Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Loading never fails (a missing or corrupt sidecar is an empty database),
/// so everything here is about writing.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The in-memory database could not be serialized.
    #[display("unable to serialize database")]
    Serialize,
    /// Writing the sidecar file failed. The in-memory database is unchanged
    /// and saving can be retried.
    #[display("unable to persist database to {}", _0.display())]
    Persist(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist(_))
    }
}
