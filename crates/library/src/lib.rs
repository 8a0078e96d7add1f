//! The slot store engine.
//!
//! A [`Library`] ties a store root, its sidecar database and a converter
//! [`Gateway`] together and exposes the operations a front end needs:
//!
//! - [`list_slots_with_status`](Library::list_slots_with_status) and
//!   [`reconcile_report`](Library::reconcile_report): read-only comparison of
//!   the slot directories against the database.
//! - [`reconcile_silently`](Library::reconcile_silently): repairs fingerprints
//!   of slots edited outside the tool.
//! - [`next_free_slot`](Library::next_free_slot).
//! - [`ingest`](Library::ingest): copy or convert audio into a slot, as a
//!   cancellable stream of progress events.
//! - [`delete_slot`](Library::delete_slot).
//!
//! Operations on the same store root are serialized through one shared lock,
//! even across separately opened libraries.

mod delete;
pub mod error;
mod ingest;
mod lock;
mod names;
pub mod reconcile;

use crate::error::{ErrorKind, Result};
use crate::lock::SharedDatabase;
use exn::ResultExt;
use slotkeeper_config::Config;
use slotkeeper_convert::{Converter, Gateway};
use slotkeeper_database::ContentRecord;
use slotkeeper_storage::{SlotId, next_free};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use crate::delete::Deletion;
pub use crate::ingest::{IngestEvent, IngestRequest};
pub use crate::names::TrackNamer;
pub use crate::reconcile::{Report, SlotStatus, SyncStatus};

pub struct Library {
    root: PathBuf,
    db: SharedDatabase,
    gateway: Arc<dyn Gateway>,
    namer: TrackNamer,
    index_width: usize,
    default_secret: Option<String>,
}

impl Library {
    /// Opens the store described by `config`, probing for a converter
    /// backend. Blocking: probing may run external programs.
    pub fn open(config: &Config) -> Result<Self> {
        let converter = Converter::discover(config.converter.backends.as_slice(), config.converter.timeout())
            .or_raise(|| ErrorKind::Convert)?;
        Self::with_gateway(config, Arc::new(converter))
    }

    /// Opens the store described by `config` with a specific converter.
    pub fn with_gateway(config: &Config, gateway: Arc<dyn Gateway>) -> Result<Self> {
        let namer = TrackNamer::new(&config.tracks.chapter_template, &config.tracks.track_template)?;
        let root = config.store.root.clone();
        let db = lock::shared_database(&root, &config.store.database_path());
        Ok(Self {
            root,
            db,
            gateway,
            namer,
            index_width: config.tracks.index_width,
            default_secret: config.converter.secret.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    /// Every slot directory with its sync status, ascending.
    pub async fn list_slots_with_status(&self) -> Result<Vec<SlotStatus>> {
        Ok(self.reconcile_report().await?.slots)
    }

    /// Read-only classification of every slot, with totals and orphaned
    /// records.
    pub async fn reconcile_report(&self) -> Result<Report> {
        let db = self.db.lock().await;
        reconcile::reconcile_report(&db, &self.root).await
    }

    /// Repairs fingerprints of registered slots that changed on disk,
    /// returning the repaired slots.
    pub async fn reconcile_silently(&self) -> Result<Vec<SlotId>> {
        let mut db = self.db.lock().await;
        reconcile::reconcile_silently(&mut db, &self.root).await
    }

    /// One past the highest slot directory, or 1 for an empty store. May be
    /// above 99 when the store is full. Advisory only: nothing is reserved.
    pub async fn next_free_slot(&self) -> Result<u32> {
        next_free(&self.root).await.or_raise(|| ErrorKind::Storage)
    }

    /// The current record for `slot`.
    pub async fn record(&self, slot: SlotId) -> Option<ContentRecord> {
        self.db.lock().await.get(&slot).cloned()
    }

    /// Persists the in-memory database again, after an operation failed with
    /// [`ErrorKind::Persistence`].
    pub async fn save(&self) -> Result<()> {
        self.db.lock().await.save().or_raise(|| ErrorKind::Persistence)
    }

    /// Where the database is saved.
    pub async fn database_path(&self) -> PathBuf {
        self.db.lock().await.path().to_path_buf()
    }
}
