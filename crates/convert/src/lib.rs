//! Converting DRM-protected audiobooks into plain audio with external tools.
//!
//! The rest of the workspace only sees the [`Gateway`] trait: hand it a
//! protected source, an activation secret and a scratch directory, get back
//! the produced audio files sorted by name. [`Converter`] is the real
//! implementation, driving whichever configured [`BackendId`] is installed.

mod backend;
pub mod error;
mod process;

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
pub use backend::{Backend, BackendId};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Extension of every file a converter is expected to produce.
pub(crate) const OUTPUT_EXTENSION: &str = "mp3";

/// Process boundary between the ingestion pipeline and the external
/// converter tools. Mocked in tests.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The backend conversions will use, or `None` if nothing usable was
    /// found.
    fn backend(&self) -> Option<BackendId>;

    /// Converts `source` into plain audio files inside `work_dir`.
    ///
    /// Returns the produced files sorted by file name. Cancelling `cancel`
    /// stops the conversion and kills the external process.
    async fn convert(
        &self,
        source: &Path,
        secret: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>>;
}

/// Availability of one configured backend, as reported by [`Converter::probe`].
#[derive(Clone, Debug)]
pub struct Probe {
    pub id: BackendId,
    pub backend: Option<Backend>,
}

pub struct Converter {
    backend: Option<Backend>,
    timeout: Duration,
}
impl Converter {
    pub fn new(backend: Option<Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Picks the first usable backend among `ids`, in order.
    ///
    /// Unknown ids are an error; finding nothing installed is not, since
    /// plain-audio ingestion never needs a converter. Blocking.
    pub fn discover<S: AsRef<str>>(ids: &[S], timeout: Duration) -> Result<Self> {
        let backend = Self::probe(ids)?.into_iter().find_map(|probe| probe.backend);
        match &backend {
            Some(backend) => tracing::debug!(backend = %backend.id(), "Selected converter backend"),
            None => tracing::info!("No converter backend available; protected audio can't be ingested"),
        }
        Ok(Self::new(backend, timeout))
    }

    /// Checks every backend in `ids` without selecting one. Blocking.
    pub fn probe<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Probe>> {
        ids.iter()
            .map(|id| -> Result<Probe> {
                let id: BackendId = id.as_ref().parse()?;
                Ok(Probe { id, backend: Backend::discover(id) })
            })
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Gateway for Converter {
    fn backend(&self) -> Option<BackendId> {
        self.backend.as_ref().map(Backend::id)
    }

    #[instrument(skip_all, fields(source = %source.display(), backend))]
    async fn convert(
        &self,
        source: &Path,
        secret: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let backend = self.backend.as_ref().ok_or_raise(|| ErrorKind::NoBackendAvailable)?;
        tracing::Span::current().record("backend", backend.id().as_str());
        tokio::fs::create_dir_all(work_dir).await.or_raise(|| ErrorKind::Io)?;

        let finished = process::run(backend.command(source, secret, work_dir), self.timeout, cancel).await?;
        tracing::debug!(stderr = %finished.stderr.trim(), stdout_bytes = finished.stdout.len(), "Converter output");

        let outputs = collect_outputs(work_dir).await?;
        if outputs.is_empty() {
            exn::bail!(ErrorKind::NoOutput);
        }
        tracing::info!(
            files = outputs.len(),
            elapsed = finished.elapsed.as_secs(),
            "Conversion finished"
        );
        Ok(outputs)
    }
}

/// Every converted audio file under `dir`, at any depth (AAXtoMP3 nests its
/// output under author and title folders), sorted by file name.
async fn collect_outputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await.or_raise(|| ErrorKind::Io)?;
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Io)? {
            let file_type = entry.file_type().await.or_raise(|| ErrorKind::Io)?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && has_output_extension(&path) {
                found.push(path);
            }
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(found)
}

fn has_output_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::ops::Deref;

    #[test]
    fn test_probe_rejects_unknown_ids() {
        let err = Converter::probe(&["ffmpeg", "handbrake"]).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::UnknownBackend(_)));
    }

    #[tokio::test]
    async fn test_convert_without_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(None, Duration::from_secs(1));
        assert_eq!(converter.backend(), None);
        let err = converter
            .convert(Path::new("book.aax"), "secret", temp_dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NoBackendAvailable));
    }

    #[tokio::test]
    async fn test_collect_outputs_recurses_and_sorts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Author/Title")).unwrap();
        fs::write(root.join("Author/Title/Title-02 Chapter.mp3"), b"2").unwrap();
        fs::write(root.join("Author/Title/Title-01 Intro.MP3"), b"1").unwrap();
        fs::write(root.join("Author/Title/cover.jpg"), b"jpg").unwrap();
        fs::write(root.join("Title-03 Outro.mp3"), b"3").unwrap();

        let outputs = collect_outputs(root).await.unwrap();
        let names: Vec<_> = outputs.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["Title-01 Intro.MP3", "Title-02 Chapter.mp3", "Title-03 Outro.mp3"]);
    }

    #[cfg(unix)]
    mod fake_backend {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes an executable script that stands in for FFmpeg: it creates
        /// the file named by its last argument.
        fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ffmpeg");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_convert_collects_output() {
            let temp_dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(temp_dir.path(), r#"for last; do :; done; echo audio > "$last""#);
            let converter = Converter::new(Some(Backend::new(BackendId::Ffmpeg, program)), Duration::from_secs(10));
            let work_dir = temp_dir.path().join("scratch");

            let outputs = converter
                .convert(Path::new("/in/My Book.aax"), "deadbeef", &work_dir, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(outputs, vec![work_dir.join("My Book.mp3")]);
        }

        #[tokio::test]
        async fn test_convert_success_without_output() {
            let temp_dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(temp_dir.path(), "exit 0");
            let converter = Converter::new(Some(Backend::new(BackendId::Ffmpeg, program)), Duration::from_secs(10));
            let err = converter
                .convert(Path::new("book.aax"), "deadbeef", &temp_dir.path().join("scratch"), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err.deref(), ErrorKind::NoOutput));
        }

        #[tokio::test]
        async fn test_convert_failure_reason() {
            let temp_dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(temp_dir.path(), "echo 'Invalid activation bytes' >&2; exit 1");
            let converter = Converter::new(Some(Backend::new(BackendId::Ffmpeg, program)), Duration::from_secs(10));
            let err = converter
                .convert(Path::new("book.aax"), "bad", &temp_dir.path().join("scratch"), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err.deref(), ErrorKind::Failed { reason, .. } if reason.contains("activation")));
        }
    }
}
