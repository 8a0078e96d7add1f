//! Removing a slot: its directory first, then its record.

use crate::Library;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use slotkeeper_database::ContentRecord;
use slotkeeper_storage::{SlotId, slot_dir};
use tokio::fs;
use tracing::instrument;

/// What [`Library::delete_slot`] actually removed.
#[derive(Clone, Debug)]
pub struct Deletion {
    pub slot: SlotId,
    /// Whether a slot directory existed and was removed.
    pub removed_directory: bool,
    /// The record that was removed, if there was one.
    pub removed_record: Option<ContentRecord>,
}

impl Library {
    /// Removes a slot's directory and then its record.
    ///
    /// The directory goes first: if saving the database then fails, the next
    /// reconciliation sees a record without a directory instead of a directory
    /// that silently lost its record. Either half may be missing already; the
    /// database is only saved when a record was removed. A slot with neither
    /// is [`ErrorKind::SlotNotFound`].
    #[instrument(skip_all, fields(slot = %slot))]
    pub async fn delete_slot(&self, slot: SlotId) -> Result<Deletion> {
        let mut db = self.db.lock().await;
        let dir = slot_dir(&self.root, slot);
        let removed_directory = match fs::remove_dir_all(&dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Filesystem(dir.clone())),
        };
        if removed_directory {
            tracing::info!(path = %dir.display(), "Removed slot directory");
        }

        let removed_record = db.remove(&slot);
        if removed_record.is_some() {
            tracing::info!("Removed slot record");
            db.save().or_raise(|| ErrorKind::Persistence)?;
        }
        if !removed_directory && removed_record.is_none() {
            exn::bail!(ErrorKind::SlotNotFound(slot));
        }
        Ok(Deletion {
            slot,
            removed_directory,
            removed_record,
        })
    }
}
