//! Physical side of a slot store.
//!
//! A store is a root directory holding numbered slot folders (`01`..`99`),
//! each containing fixed-width numbered track files. This crate knows how to
//! find them ([`list_slots`], [`track_files`]), how to fingerprint their
//! contents ([`slot_digest`]) and which number comes next ([`next_free`]).
//! It knows nothing about the sidecar database.

mod allocate;
pub mod error;
mod fingerprint;
mod scan;
mod slot;

pub use crate::allocate::next_free;
pub use crate::fingerprint::{file_digest, is_empty_slot, slot_digest, try_file_digest};
pub use crate::scan::{AudioKind, audio_inputs, list_slots, slot_dir, track_count, track_files};
pub use crate::slot::{MAX_SLOT, MIN_SLOT, SlotId};
