//! Store scanning.
//!
//! Enumerates the slot directories directly under a store root and the audio
//! files directly inside a slot. Nothing here recurses: subdirectories of a
//! slot are not tracks, and anything under the root that isn't a two-digit
//! directory (hidden files, the sidecar database, stray folders) is ignored.

use crate::SlotId;
use crate::error::{ErrorKind, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The two kinds of audio input the engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioKind {
    /// Plain encoded audio (`.mp3`), copied as-is.
    Plain,
    /// DRM-wrapped audio (`.aax`), which must go through a converter first.
    Protected,
}
impl AudioKind {
    /// File extension (without dot) of plain track files inside a slot.
    pub const TRACK_EXTENSION: &'static str = "mp3";

    /// Detect the audio kind from a file extension, case-insensitively.
    ///
    /// ```
    /// use slotkeeper_storage::AudioKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(AudioKind::from_path(Path::new("a/001.MP3")), Some(AudioKind::Plain));
    /// assert_eq!(AudioKind::from_path(Path::new("book.aax")), Some(AudioKind::Protected));
    /// assert_eq!(AudioKind::from_path(Path::new("cover.jpg")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(OsStr::to_str)?;
        if ext.eq_ignore_ascii_case(Self::TRACK_EXTENSION) {
            Some(Self::Plain)
        } else if ext.eq_ignore_ascii_case("aax") {
            Some(Self::Protected)
        } else {
            None
        }
    }
}

/// Absolute (or root-relative, depending on `root`) path of a slot directory.
pub fn slot_dir(root: &Path, slot: SlotId) -> PathBuf {
    root.join(slot.to_string())
}

/// Every immediate child directory of `root` named like a slot, ascending.
///
/// A missing root is an empty store, not an error.
#[tracing::instrument(level = "debug", skip_all, fields(root = %root.display()))]
pub async fn list_slots(root: &Path) -> Result<Vec<SlotId>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => exn::bail!(ErrorKind::from_io(err, root)),
    };
    let mut slots = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, root))? {
        let Some(slot) = SlotId::from_dir_name(&entry.file_name()) else {
            continue;
        };
        // Follows symlinks, so a linked slot directory still counts.
        match fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_dir() => slots.push(slot),
            Ok(_) => {},
            // Note: silently drop what is most likely a broken symlink.
            Err(err) => tracing::debug!(path = %entry.path().display(), error = %err, "Skipping unreadable entry"),
        }
    }
    slots.sort();
    Ok(slots)
}

/// All plain audio files directly inside a slot directory, sorted by file name.
///
/// A missing slot directory has no tracks.
pub async fn track_files(slot_dir: &Path) -> Result<Vec<PathBuf>> {
    audio_files(slot_dir, |kind| kind == AudioKind::Plain).await
}

/// Number of [`track_files`] in a slot directory.
pub async fn track_count(slot_dir: &Path) -> Result<usize> {
    Ok(track_files(slot_dir).await?.len())
}

/// All recognized audio inputs (plain or protected) directly inside `dir`,
/// sorted by file name.
pub async fn audio_inputs(dir: &Path) -> Result<Vec<(PathBuf, AudioKind)>> {
    let files = audio_files(dir, |_| true).await?;
    Ok(files
        .into_iter()
        .filter_map(|path| AudioKind::from_path(&path).map(|kind| (path, kind)))
        .collect())
}

async fn audio_files(dir: &Path, accept: impl Fn(AudioKind) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => exn::bail!(ErrorKind::from_io(err, dir)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, dir))? {
        let path = entry.path();
        if !AudioKind::from_path(&path).is_some_and(&accept) {
            continue;
        }
        if fs::metadata(&path).await.is_ok_and(|meta| meta.is_file()) {
            files.push(path);
        }
    }
    // Lexical order of the file name is the track order.
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
