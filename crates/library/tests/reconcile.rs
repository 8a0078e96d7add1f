mod common;

use common::{Fixture, ingest};
use slotkeeper_database::{ContentType, Database};
use slotkeeper_library::{IngestRequest, SyncStatus};
use slotkeeper_storage::SlotId;
use std::fs;

fn slot(s: &str) -> SlotId {
    s.parse().unwrap()
}

/// A store with two registered slots: 01 (two tracks) and 02 (one track).
async fn populated() -> Fixture {
    let fixture = Fixture::new();
    let library = fixture.library();
    let album = fixture.source().join("album");
    fs::create_dir(&album).unwrap();
    fs::write(album.join("a.mp3"), b"track a").unwrap();
    fs::write(album.join("b.mp3"), b"track b").unwrap();
    ingest(&library, IngestRequest::new(&album, "Album", ContentType::Album), false).await.unwrap();
    let single = fixture.add_source("single.mp3", b"single");
    ingest(&library, IngestRequest::new(single, "Single", ContentType::Single), false).await.unwrap();
    fixture
}

fn statuses(report: &slotkeeper_library::Report) -> Vec<(SlotId, SyncStatus)> {
    report.slots.iter().map(|s| (s.slot, s.status)).collect()
}

#[tokio::test]
async fn test_freshly_ingested_slots_are_synced() {
    let fixture = populated().await;
    let library = fixture.library();

    let report = library.reconcile_report().await.unwrap();
    assert_eq!(statuses(&report), [(slot("01"), SyncStatus::Synced), (slot("02"), SyncStatus::Synced)]);
    assert_eq!(report.synced, 2);
    assert!(report.is_clean());
    assert_eq!(report.slots[0].observed_tracks, 2);
    assert_eq!(report.slots[0].record.as_ref().unwrap().name, "Album");
}

#[tokio::test]
async fn test_changed_bytes_are_modified() {
    let fixture = populated().await;
    let library = fixture.library();
    // Same name, same count, different content.
    fs::write(fixture.root().join("01/002.mp3"), b"track B").unwrap();

    let slots = library.list_slots_with_status().await.unwrap();
    assert_eq!(slots[0].status, SyncStatus::Modified);
    assert_eq!(slots[1].status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_renamed_track_is_modified() {
    let fixture = populated().await;
    let library = fixture.library();
    let dir = fixture.root().join("01");
    fs::rename(dir.join("002.mp3"), dir.join("003.mp3")).unwrap();

    let report = library.reconcile_report().await.unwrap();
    assert_eq!(report.slots[0].status, SyncStatus::Modified);
    assert_eq!(report.modified, 1);
}

#[tokio::test]
async fn test_unregistered_and_orphaned() {
    let fixture = populated().await;
    {
        let library = fixture.library();
        fs::create_dir(fixture.root().join("05")).unwrap();
        fs::write(fixture.root().join("05/001.mp3"), b"stray").unwrap();
        fs::remove_dir_all(fixture.root().join("02")).unwrap();

        let report = library.reconcile_report().await.unwrap();
        assert_eq!(statuses(&report), [(slot("01"), SyncStatus::Synced), (slot("05"), SyncStatus::Unregistered)]);
        assert_eq!(report.unregistered, 1);
        assert_eq!(report.orphaned, [slot("02")]);
        assert!(!report.is_clean());

        // Neither is touched by the silent pass.
        assert!(library.reconcile_silently().await.unwrap().is_empty());
        assert!(library.record(slot("05")).await.is_none());
        assert!(library.record(slot("02")).await.is_some());
    }
}

#[tokio::test]
async fn test_edited_track_count_is_a_mismatch() {
    let fixture = populated().await;
    // Edit the sidecar by hand while no library holds it.
    let mut db = Database::load(fixture.database_path());
    db.get_mut(&slot("01")).unwrap().track_count = 5;
    db.save().unwrap();

    let library = fixture.library();
    let report = library.reconcile_report().await.unwrap();
    assert_eq!(report.slots[0].status, SyncStatus::TrackCountMismatch);
    assert_eq!(report.track_count_mismatch, 1);
}

#[tokio::test]
async fn test_silent_reconcile_repairs_drift() {
    let fixture = populated().await;
    let library = fixture.library();
    fs::write(fixture.root().join("01/003.mp3"), b"bonus track").unwrap();

    let repaired = library.reconcile_silently().await.unwrap();
    assert_eq!(repaired, [slot("01")]);
    let record = library.record(slot("01")).await.unwrap();
    assert_eq!(record.track_count, 3);
    assert_eq!(
        Database::load(fixture.database_path()).get(&slot("01")).unwrap().hash,
        record.hash
    );
    assert!(library.reconcile_report().await.unwrap().is_clean());
}

#[tokio::test]
async fn test_silent_reconcile_is_idempotent() {
    let fixture = populated().await;
    let library = fixture.library();
    fs::write(fixture.root().join("02/001.mp3"), b"re-recorded").unwrap();

    assert_eq!(library.reconcile_silently().await.unwrap(), [slot("02")]);
    // With the sidecar gone, any write on the second pass would recreate it.
    fs::remove_file(fixture.database_path()).unwrap();
    assert!(library.reconcile_silently().await.unwrap().is_empty());
    assert!(!fixture.database_path().exists());
}

#[tokio::test]
async fn test_missing_hash_is_modified_and_repaired() {
    let fixture = populated().await;
    let mut db = Database::load(fixture.database_path());
    db.get_mut(&slot("02")).unwrap().hash.clear();
    db.save().unwrap();

    let library = fixture.library();
    assert_eq!(library.list_slots_with_status().await.unwrap()[1].status, SyncStatus::Modified);
    assert_eq!(library.reconcile_silently().await.unwrap(), [slot("02")]);
    assert_eq!(library.list_slots_with_status().await.unwrap()[1].status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_empty_store() {
    let fixture = Fixture::new();
    let library = fixture.library();
    let report = library.reconcile_report().await.unwrap();
    assert!(report.slots.is_empty());
    assert!(report.is_clean());
    assert_eq!(library.next_free_slot().await.unwrap(), 1);
}
