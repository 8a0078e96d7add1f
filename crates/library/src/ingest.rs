//! Ingesting audio into a slot.
//!
//! The whole pipeline runs under the store lock and is exposed as a stream of
//! [`IngestEvent`]s so callers can show progress on long conversions. Events
//! follow a strict ordering:
//!
//! 1. [`Started`](IngestEvent::Started), exactly once, after validation and
//!    slot resolution.
//! 2. [`Converting`](IngestEvent::Converting) and
//!    [`Converted`](IngestEvent::Converted), once per protected input.
//! 3. [`Replaced`](IngestEvent::Replaced), only when an existing slot
//!    directory was removed.
//! 4. [`Copied`](IngestEvent::Copied), once per track.
//! 5. [`Committed`](IngestEvent::Committed), exactly once, after the record
//!    was saved.
//!
//! An error terminates the stream. No record is written unless every track
//! was copied. Conversion happens in a scratch directory *before* an existing
//! slot is removed, so a failed or cancelled conversion leaves the slot as it
//! was. Dropping the stream part-way kills any running converter and removes
//! the scratch directory.

use crate::Library;
use crate::error::{ErrorKind, Result};
use async_stream::try_stream;
use exn::ResultExt;
use futures::Stream;
use slotkeeper_convert::error::ErrorKind as ConvertErrorKind;
use slotkeeper_database::{ContentRecord, ContentType, Database, TrackRecord};
use slotkeeper_storage::{AudioKind, MAX_SLOT, SlotId, audio_inputs, next_free, slot_digest, slot_dir, track_files};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// What to ingest and where.
#[derive(Clone, Debug)]
pub struct IngestRequest {
    /// An audio file, or a directory whose audio files (not recursive) are
    /// ingested in name order.
    pub source: PathBuf,
    pub name: String,
    pub content_type: ContentType,
    /// Target slot number; `None` allocates the next free one.
    pub slot: Option<u32>,
    /// Activation secret for protected audio. Falls back to the configured
    /// default.
    pub secret: Option<String>,
}
impl IngestRequest {
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            content_type,
            slot: None,
            secret: None,
        }
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// Inputs were validated and the target slot resolved.
    Started { slot: SlotId, inputs: usize },
    /// A protected input is being converted; this may take a long time.
    Converting { source: PathBuf },
    Converted { source: PathBuf, files: usize },
    /// The previous contents of the slot were removed.
    Replaced { slot: SlotId },
    /// One track is in place.
    Copied { index: String, source: PathBuf },
    /// The record was written and saved.
    Committed { slot: SlotId, record: ContentRecord },
}

impl Library {
    /// Streams the ingestion of `request`.
    ///
    /// When the target slot is occupied (a directory or a record exists),
    /// `confirm` is called with the slot and its current record; returning
    /// `false` ends the stream with [`ErrorKind::ReplacementDeclined`] and
    /// leaves the slot untouched. Cancelling `cancel` stops at the next
    /// conversion or copy and ends the stream with [`ErrorKind::Cancelled`].
    pub fn ingest<'a, F, Fut>(
        &'a self,
        request: IngestRequest,
        confirm: F,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<IngestEvent>> + 'a
    where
        F: FnOnce(SlotId, Option<ContentRecord>) -> Fut + Send + 'a,
        Fut: Future<Output = bool> + Send + 'a,
    {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        try_stream!({
            let name = validate_name(&request.name)?;
            let inputs = gather_inputs(&request.source).await?;
            let secret = self.resolve_secret(&request, &inputs)?;

            let mut db = self.db.lock().await;
            let slot = self.resolve_slot(request.slot).await?;
            let dir = slot_dir(&self.root, slot);
            let dir_exists = ensure_replaceable(&db, slot, &dir, confirm).await?;
            tracing::info!(%slot, name = %name, inputs = inputs.len(), "Ingesting");
            yield IngestEvent::Started { slot, inputs: inputs.len() };

            // Dropped (and deleted) on every exit path.
            let scratch = tempfile::Builder::new()
                .prefix(".slotkeeper-")
                .tempdir()
                .or_raise(|| ErrorKind::Filesystem(std::env::temp_dir()))?;
            let mut tracks: Vec<PathBuf> = Vec::new();
            for (position, (source, kind)) in inputs.into_iter().enumerate() {
                check_cancelled(&cancel)?;
                match kind {
                    AudioKind::Plain => tracks.push(source),
                    AudioKind::Protected => {
                        yield IngestEvent::Converting { source: source.clone() };
                        let work_dir = scratch.path().join(position.to_string());
                        let outputs = self.convert(&source, secret.as_deref().unwrap_or_default(), &work_dir, &cancel).await?;
                        yield IngestEvent::Converted { source, files: outputs.len() };
                        tracks.extend(outputs);
                    },
                }
            }
            let width = self.index_width;
            check_track_count(tracks.len(), width)?;

            check_cancelled(&cancel)?;
            if dir_exists {
                fs::remove_dir_all(&dir).await.or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
                tracing::info!(%slot, "Removed previous slot contents");
                yield IngestEvent::Replaced { slot };
            }
            fs::create_dir_all(&dir).await.or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
            let mut indices = Vec::with_capacity(tracks.len());
            for (number, source) in (1..).zip(tracks) {
                check_cancelled(&cancel)?;
                let index = format!("{number:0width$}");
                let mut target = dir.join(&index);
                target.set_extension(AudioKind::TRACK_EXTENSION);
                copy_track(&source, &target).await?;
                indices.push(index.clone());
                yield IngestEvent::Copied { index, source };
            }
            if let Err(e) = scratch.close() {
                tracing::warn!(error = %e, "Unable to remove scratch directory");
            }

            let record = self.build_record(&dir, name, request.content_type, &indices).await?;
            db.upsert(slot, record.clone());
            let saved = db.save();
            // Release the store before a save error reaches the caller, who may retry.
            drop(db);
            saved.or_raise(|| ErrorKind::Persistence)?;
            tracing::info!(%slot, tracks = record.track_count, "Slot committed");
            yield IngestEvent::Committed { slot, record };
        })
    }

    fn resolve_secret(&self, request: &IngestRequest, inputs: &[(PathBuf, AudioKind)]) -> Result<Option<String>> {
        if !inputs.iter().any(|(_, kind)| *kind == AudioKind::Protected) {
            return Ok(None);
        }
        if self.gateway.backend().is_none() {
            return Err(exn::Exn::from(ConvertErrorKind::NoBackendAvailable).raise(ErrorKind::Convert));
        }
        let secret = request
            .secret
            .as_deref()
            .or(self.default_secret.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match secret {
            Some(secret) => Ok(Some(secret.to_string())),
            None => exn::bail!(ErrorKind::MissingSecret),
        }
    }

    /// Range-checks a requested slot, or allocates the next free one.
    async fn resolve_slot(&self, requested: Option<u32>) -> Result<SlotId> {
        match requested {
            Some(number) => SlotId::new(number).or_raise(|| ErrorKind::InvalidSlot(number.to_string())),
            None => {
                let number = next_free(&self.root).await.or_raise(|| ErrorKind::Storage)?;
                if number > u32::from(MAX_SLOT) {
                    exn::bail!(ErrorKind::StoreFull);
                }
                SlotId::new(number).or_raise(|| ErrorKind::StoreFull)
            },
        }
    }

    async fn convert(
        &self,
        source: &Path,
        secret: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        match self.gateway.convert(source, secret, work_dir, cancel).await {
            Ok(outputs) => Ok(outputs),
            Err(e) if matches!(&*e, ConvertErrorKind::Cancelled) => Err(e.raise(ErrorKind::Cancelled)),
            Err(e) => Err(e.raise(ErrorKind::Convert)),
        }
    }

    /// Fingerprints the finished slot directory and names its tracks.
    async fn build_record(
        &self,
        dir: &Path,
        name: String,
        content_type: ContentType,
        indices: &[String],
    ) -> Result<ContentRecord> {
        let files = track_files(dir).await.or_raise(|| ErrorKind::Storage)?;
        let hash = slot_digest(&files).await;
        let total = indices.len();
        let tracks = indices
            .iter()
            .enumerate()
            .map(|(i, index)| {
                let track_name = self.namer.name(&name, content_type, i + 1, total, index)?;
                Ok(TrackRecord::new(index.as_str(), track_name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ContentRecord::new(name, content_type, hash, tracks))
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        exn::bail!(ErrorKind::InvalidName);
    }
    Ok(name.to_string())
}

/// Asks `confirm` whether an occupied slot may be replaced. Returns whether
/// the slot directory exists.
async fn ensure_replaceable<F, Fut>(db: &Database, slot: SlotId, dir: &Path, confirm: F) -> Result<bool>
where
    F: FnOnce(SlotId, Option<ContentRecord>) -> Fut,
    Fut: Future<Output = bool>,
{
    let dir_exists = fs::try_exists(dir).await.or_raise(|| ErrorKind::Filesystem(dir.to_path_buf()))?;
    if (dir_exists || db.contains(&slot)) && !confirm(slot, db.get(&slot).cloned()).await {
        tracing::info!(%slot, "Replacement declined; slot left unchanged");
        exn::bail!(ErrorKind::ReplacementDeclined(slot));
    }
    Ok(dir_exists)
}

/// Track indices must all have the same width to sort correctly.
fn check_track_count(count: usize, width: usize) -> Result<()> {
    let limit = u32::try_from(width).ok().and_then(|w| 10usize.checked_pow(w)).unwrap_or(usize::MAX);
    if count >= limit {
        exn::bail!(ErrorKind::TooManyTracks(count));
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        tracing::info!("Ingestion cancelled");
        exn::bail!(ErrorKind::Cancelled);
    }
    Ok(())
}

/// Recognized audio inputs of `source`, in name order.
async fn gather_inputs(source: &Path) -> Result<Vec<(PathBuf, AudioKind)>> {
    let no_audio = || ErrorKind::NoAudioFound(source.to_path_buf());
    let metadata = fs::metadata(source).await.or_raise(no_audio)?;
    let inputs = if metadata.is_dir() {
        audio_inputs(source).await.or_raise(|| ErrorKind::Storage)?
    } else {
        AudioKind::from_path(source).map(|kind| (source.to_path_buf(), kind)).into_iter().collect()
    };
    if inputs.is_empty() {
        exn::bail!(no_audio());
    }
    Ok(inputs)
}

/// Copies one track and flushes it to the device, so the record is never
/// written for data still sitting in a write cache.
async fn copy_track(source: &Path, target: &Path) -> Result<()> {
    let failed = || ErrorKind::Filesystem(target.to_path_buf());
    fs::copy(source, target).await.or_raise(failed)?;
    fs::File::open(target).await.or_raise(failed)?.sync_all().await.or_raise(failed)?;
    Ok(())
}
