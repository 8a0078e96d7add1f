//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures from the lower crates are
//! re-raised under one of the kinds here, keeping the original as the cause.

use derive_more::{Display, Error};
use slotkeeper_storage::SlotId;
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Requested slot number is outside `01..=99`.
    #[display("invalid slot: {_0}")]
    InvalidSlot(#[error(not(source))] String),
    /// Every slot up to 99 is taken, so there is nothing to allocate.
    #[display("store is full; delete a slot first")]
    StoreFull,
    #[display("no audio found in {}", _0.display())]
    NoAudioFound(#[error(not(source))] PathBuf),
    /// Protected audio was supplied without an activation secret.
    #[display("an activation secret is required for protected audio")]
    MissingSecret,
    /// More tracks than the configured index width can number.
    #[display("too many tracks: {_0}")]
    TooManyTracks(#[error(not(source))] usize),
    #[display("content name must not be empty")]
    InvalidName,
    /// The slot is occupied and the caller chose not to replace it. Nothing
    /// was changed.
    #[display("slot {_0} already exists and was not replaced")]
    ReplacementDeclined(#[error(not(source))] SlotId),
    /// Deleting a slot that has neither a directory nor a record.
    #[display("slot {_0} does not exist")]
    SlotNotFound(#[error(not(source))] SlotId),
    #[display("operation cancelled")]
    Cancelled,
    #[display("conversion failed")]
    Convert,
    /// Reading the store (listing slots, fingerprinting) failed.
    #[display("unable to read store")]
    Storage,
    /// Creating, copying or removing something on the store failed.
    #[display("filesystem operation failed on {}", _0.display())]
    Filesystem(#[error(not(source))] PathBuf),
    /// The database couldn't be saved. The in-memory state already reflects
    /// the change; [`Library::save`](crate::Library::save) retries.
    #[display("unable to save database")]
    Persistence,
    #[display("invalid track name template")]
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence | Self::Filesystem(_) | Self::Storage)
    }
}
