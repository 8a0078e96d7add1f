//! Loading, mutating and persisting the sidecar document.

use crate::error::{ErrorKind, Result};
use crate::models::ContentRecord;
use exn::ResultExt;
use serde_json::{Map, Value};
use slotkeeper_storage::SlotId;
use std::collections::BTreeMap;
use std::collections::btree_map::Iter;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;

/// In-memory view of the sidecar, authoritative for the lifetime of a
/// session.
///
/// Mutations ([`upsert`](Self::upsert), [`remove`](Self::remove)) only touch
/// memory; callers persist with [`save`](Self::save) straight afterwards.
/// A failed save leaves memory as it was, so saving can simply be retried.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    records: BTreeMap<SlotId, ContentRecord>,
    /// Top-level entries that aren't a valid slot or record. Written back
    /// verbatim rather than silently dropped.
    unrecognized: Map<String, Value>,
}

impl Database {
    /// An empty database that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
            unrecognized: Map::new(),
        }
    }

    /// Loads the sidecar at `path`.
    ///
    /// Never fails: a missing, unreadable or unparsable file yields an empty
    /// database (logged), since resynchronizing can rebuild it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut db = Self::empty(path);
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No database file yet; starting empty");
                return db;
            },
            Err(e) => {
                tracing::warn!(error = %e, "Unable to read database; starting empty");
                return db;
            },
        };
        let document: Map<String, Value> = match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Database is not a valid JSON object; starting empty");
                return db;
            },
        };
        for (key, value) in document {
            let Ok(slot) = key.parse::<SlotId>() else {
                tracing::warn!(key = %key, "Ignoring database entry with an invalid slot key");
                db.unrecognized.insert(key, value);
                continue;
            };
            match serde_json::from_value::<ContentRecord>(value.clone()) {
                Ok(mut record) => {
                    if record.track_count == 0 {
                        record.track_count = record.tracks.len();
                    }
                    db.records.insert(slot, record);
                },
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Ignoring malformed database record");
                    db.unrecognized.insert(key, value);
                },
            }
        }
        tracing::debug!(records = db.records.len(), "Database loaded");
        db
    }

    /// Writes the whole document to disk.
    ///
    /// Keys are sorted so that the file diffs cleanly. The document is
    /// written to a sibling temporary file which then replaces the target,
    /// so an interrupted save never leaves a truncated sidecar behind.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<()> {
        let mut document = self.unrecognized.clone();
        for (slot, record) in &self.records {
            let value = serde_json::to_value(record).or_raise(|| ErrorKind::Serialize)?;
            document.insert(slot.to_string(), value);
        }
        let mut json = serde_json::to_string_pretty(&document).or_raise(|| ErrorKind::Serialize)?;
        json.push('\n');

        let persist = || ErrorKind::Persist(self.path.clone());
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).or_raise(persist)?;
        let mut tmp = NamedTempFile::new_in(parent).or_raise(persist)?;
        tmp.write_all(json.as_bytes()).or_raise(persist)?;
        tmp.as_file().sync_all().or_raise(persist)?;
        tmp.persist(&self.path).or_raise(persist)?;
        tracing::debug!(records = self.records.len(), "Database saved");
        Ok(())
    }

    /// Inserts or overwrites the record for `slot`, returning the previous one.
    pub fn upsert(&mut self, slot: SlotId, record: ContentRecord) -> Option<ContentRecord> {
        self.unrecognized.remove(&slot.to_string());
        self.records.insert(slot, record)
    }

    /// Removes the record for `slot`. Removing a missing slot is a no-op.
    pub fn remove(&mut self, slot: &SlotId) -> Option<ContentRecord> {
        self.records.remove(slot)
    }

    pub fn get(&self, slot: &SlotId) -> Option<&ContentRecord> {
        self.records.get(slot)
    }

    pub fn get_mut(&mut self, slot: &SlotId) -> Option<&mut ContentRecord> {
        self.records.get_mut(slot)
    }

    pub fn contains(&self, slot: &SlotId) -> bool {
        self.records.contains_key(slot)
    }

    /// Records in ascending slot order.
    pub fn iter(&self) -> Iter<'_, SlotId, ContentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Where [`save`](Self::save) writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<'a> IntoIterator for &'a Database {
    type Item = (&'a SlotId, &'a ContentRecord);
    type IntoIter = Iter<'a, SlotId, ContentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
