//! Comparing the store against the database.
//!
//! Status is never persisted; it's recomputed from the files on every scan.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use slotkeeper_database::{ContentRecord, Database};
use slotkeeper_storage::{SlotId, list_slots, slot_digest, slot_dir, track_files};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Relationship between a slot directory and its database record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Fingerprint and track count both match the record.
    Synced,
    /// The files changed since the record was written (or the record has no
    /// usable fingerprint).
    Modified,
    /// Fingerprint matches but the recorded track count doesn't. Only happens
    /// when the database was edited by hand.
    TrackCountMismatch,
    /// The directory has no record at all.
    Unregistered,
}

/// One slot directory and what was observed in it.
#[derive(Clone, Debug)]
pub struct SlotStatus {
    pub slot: SlotId,
    pub status: SyncStatus,
    /// Track files found in the directory.
    pub observed_tracks: usize,
    pub record: Option<ContentRecord>,
}

/// Outcome of a read-only reconciliation pass.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Every slot directory, ascending.
    pub slots: Vec<SlotStatus>,
    /// Records whose slot directory is missing.
    pub orphaned: Vec<SlotId>,
    pub synced: usize,
    pub modified: usize,
    pub track_count_mismatch: usize,
    pub unregistered: usize,
}
impl Report {
    fn push(&mut self, slot: SlotStatus) {
        match slot.status {
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Modified => self.modified += 1,
            SyncStatus::TrackCountMismatch => self.track_count_mismatch += 1,
            SyncStatus::Unregistered => self.unregistered += 1,
        }
        self.slots.push(slot);
    }

    /// Whether everything on disk is registered and matches its record, and
    /// no record is dangling.
    pub fn is_clean(&self) -> bool {
        self.synced == self.slots.len() && self.orphaned.is_empty()
    }
}

/// Fingerprint and track count of a slot directory as it is right now.
struct Observed {
    hash: String,
    tracks: usize,
}

async fn observe(dir: &Path) -> Result<Observed> {
    let files: Vec<PathBuf> = track_files(dir).await.or_raise(|| ErrorKind::Storage)?;
    Ok(Observed {
        hash: slot_digest(&files).await,
        tracks: files.len(),
    })
}

/// The per-slot state machine. The fingerprint is checked before the count:
/// changed content is the stronger signal.
pub fn classify(record: Option<&ContentRecord>, observed_hash: &str, observed_tracks: usize) -> SyncStatus {
    let Some(record) = record else {
        return SyncStatus::Unregistered;
    };
    // An empty stored hash means "unknown" and never matches.
    if record.hash.is_empty() || observed_hash != record.hash {
        SyncStatus::Modified
    } else if observed_tracks != record.track_count {
        SyncStatus::TrackCountMismatch
    } else {
        SyncStatus::Synced
    }
}

/// Status of a single slot.
pub async fn slot_status(db: &Database, root: &Path, slot: SlotId) -> Result<SlotStatus> {
    let record = db.get(&slot);
    let (status, observed_tracks) = match record {
        None => {
            // No need to hash files we have nothing to compare against.
            let tracks = track_files(&slot_dir(root, slot)).await.or_raise(|| ErrorKind::Storage)?.len();
            (SyncStatus::Unregistered, tracks)
        },
        Some(record) => {
            let observed = observe(&slot_dir(root, slot)).await?;
            (classify(Some(record), &observed.hash, observed.tracks), observed.tracks)
        },
    };
    Ok(SlotStatus {
        slot,
        status,
        observed_tracks,
        record: record.cloned(),
    })
}

/// Classifies every slot directory and lists orphaned records. Changes
/// nothing.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn reconcile_report(db: &Database, root: &Path) -> Result<Report> {
    let slots = list_slots(root).await.or_raise(|| ErrorKind::Storage)?;
    let mut report = Report::default();
    for &slot in &slots {
        report.push(slot_status(db, root, slot).await?);
    }
    report.orphaned = db.iter().map(|(slot, _)| *slot).filter(|slot| slots.binary_search(slot).is_err()).collect();
    tracing::debug!(
        synced = report.synced,
        modified = report.modified,
        mismatched = report.track_count_mismatch,
        unregistered = report.unregistered,
        orphaned = report.orphaned.len(),
        "Reconciliation report"
    );
    Ok(report)
}

/// Repairs drift in place: every slot that exists on disk *and* in the
/// database, whose fingerprint changed, gets the observed fingerprint and
/// track count written into its record.
///
/// Unregistered slots are left alone; there's no name or type to give them.
/// The database is only saved when something was repaired, so running this
/// twice in a row writes at most once. Returns the repaired slots.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn reconcile_silently(db: &mut Database, root: &Path) -> Result<Vec<SlotId>> {
    let slots = list_slots(root).await.or_raise(|| ErrorKind::Storage)?;
    let mut repaired = Vec::new();
    for slot in slots {
        if !db.contains(&slot) {
            continue;
        }
        let observed = observe(&slot_dir(root, slot)).await?;
        let Some(record) = db.get_mut(&slot) else {
            continue;
        };
        if record.hash == observed.hash {
            continue;
        }
        tracing::info!(%slot, tracks = observed.tracks, "Slot changed outside the tool; updating its fingerprint");
        record.hash = observed.hash;
        record.track_count = observed.tracks;
        repaired.push(slot);
    }
    if !repaired.is_empty() {
        db.save().or_raise(|| ErrorKind::Persistence)?;
    }
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use slotkeeper_database::{ContentType, TrackRecord};

    fn record(hash: &str, track_count: usize) -> ContentRecord {
        let mut record = ContentRecord::new("Name", ContentType::Album, hash, vec![TrackRecord::new("001", "Name")]);
        record.track_count = track_count;
        record
    }

    #[rstest]
    #[case(Some(record("abc", 2)), "abc", 2, SyncStatus::Synced)]
    #[case(Some(record("abc", 2)), "def", 2, SyncStatus::Modified)]
    // The fingerprint wins over the count.
    #[case(Some(record("abc", 2)), "def", 3, SyncStatus::Modified)]
    #[case(Some(record("abc", 2)), "abc", 3, SyncStatus::TrackCountMismatch)]
    #[case(Some(record("", 0)), "", 0, SyncStatus::Modified)]
    #[case(None, "abc", 2, SyncStatus::Unregistered)]
    fn test_classify(
        #[case] record: Option<ContentRecord>,
        #[case] hash: &str,
        #[case] tracks: usize,
        #[case] expected: SyncStatus,
    ) {
        assert_eq!(classify(record.as_ref(), hash, tracks), expected);
    }
}
