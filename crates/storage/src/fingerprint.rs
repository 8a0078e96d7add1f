//! Content fingerprints.
//!
//! A slot's fingerprint folds, for every track file in name order, the file
//! name followed by the file's own BLAKE3 digest into one running BLAKE3
//! hasher. Renaming or reordering tracks therefore changes the fingerprint
//! even when the bytes are identical.
//!
//! Digests are lowercase hex strings. An unreadable file has an *empty*
//! digest; it is never a valid match for anything.

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Files are streamed through the hasher in chunks of this size rather than
/// read into memory in one go; audiobooks can be hundreds of megabytes.
const CHUNK_SIZE: usize = 64 * 1024;

/// Digest of a single file, or an empty string if it couldn't be read.
pub async fn file_digest(path: &Path) -> String {
    match try_file_digest(path).await {
        Ok(hash) => hash.to_hex().to_string(),
        Err(e) => {
            let reason: &ErrorKind = &e;
            tracing::warn!(path = %path.display(), error = %reason, "Unable to fingerprint file");
            String::new()
        },
    }
}

/// Digest of a single file, propagating read failures.
pub async fn try_file_digest(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; CHUNK_SIZE];
    loop {
        let bytes = file.read(&mut buffer).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if bytes == 0 {
            break;
        }
        hasher.update(&buffer[..bytes]);
    }
    Ok(hasher.finalize())
}

/// Fingerprint of an ordered set of track files.
///
/// The caller supplies the files already sorted by name (as returned by
/// [`track_files`](crate::track_files)). An empty slice yields the digest of
/// empty input, which [`is_empty_slot`] recognizes.
pub async fn slot_digest(files: &[PathBuf]) -> String {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        if let Some(name) = file.file_name() {
            hasher.update(name.as_encoded_bytes());
        }
        hasher.update(file_digest(file).await.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Whether a slot digest is the "no content" sentinel.
pub fn is_empty_slot(digest: &str) -> bool {
    digest == blake3::hash(b"").to_hex().as_str()
}
