//! JSON sidecar database.
//!
//! The sidecar maps each slot id (`"01"`..`"99"`) to a [`ContentRecord`]
//! describing what was put there: a name, a [`ContentType`], the track list
//! and the slot fingerprint taken at ingest time. The slot directories on the
//! storage device are the source of truth for *what is there*; the sidecar is
//! the only place that knows *what it is*.
//!
//! A [`Database`] is loaded once, mutated in memory and saved after every
//! mutation. There is no journal and no locking here; callers serialize
//! access (see the library crate).

mod db;
pub mod error;
mod models;

pub use crate::db::Database;
pub use crate::models::{ContentRecord, ContentType, TrackRecord, UnknownContentType};
