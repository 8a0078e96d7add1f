//! Slot number allocation.
//!
//! Allocation is advisory only: nothing is reserved, and a directory created
//! by someone else between [`next_free`] and the actual write goes unnoticed.
//! Callers re-run it immediately before committing (while holding the store
//! lock) rather than caching the answer.

use crate::error::Result;
use crate::scan::list_slots;
use std::path::Path;

/// One past the highest existing slot number, or `1` for an empty store.
///
/// Gaps left by deleted slots are not reused. The result is `100` when slot
/// `99` is taken; it is up to the caller to reject that via
/// [`SlotId::new`](crate::SlotId::new).
pub async fn next_free(root: &Path) -> Result<u32> {
    let highest = list_slots(root).await?.into_iter().map(|slot| u32::from(slot.number())).max();
    Ok(highest.map_or(1, |n| n + 1))
}
