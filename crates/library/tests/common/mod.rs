#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use slotkeeper_config::Config;
use slotkeeper_convert::error::{ErrorKind as ConvertErrorKind, Result as ConvertResult};
use slotkeeper_convert::{BackendId, Gateway};
use slotkeeper_library::error::Result;
use slotkeeper_library::{IngestEvent, IngestRequest, Library};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// How the mock converter behaves when asked to convert.
#[derive(Clone)]
pub enum Behaviour {
    /// Writes these (file name, contents) pairs into the work directory.
    Produce(Vec<(&'static str, &'static [u8])>),
    Fail,
    /// Blocks until cancelled.
    WaitForCancel,
}

pub struct MockGateway {
    backend: Option<BackendId>,
    behaviour: Behaviour,
    /// (source, secret, work_dir) of every call.
    pub calls: Mutex<Vec<(PathBuf, String, PathBuf)>>,
}
impl MockGateway {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            backend: Some(BackendId::Ffmpeg),
            behaviour,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            backend: None,
            behaviour: Behaviour::Fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(PathBuf, String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    fn backend(&self) -> Option<BackendId> {
        self.backend
    }

    async fn convert(
        &self,
        source: &Path,
        secret: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> ConvertResult<Vec<PathBuf>> {
        self.calls.lock().unwrap().push((source.to_path_buf(), secret.to_string(), work_dir.to_path_buf()));
        fs::create_dir_all(work_dir).unwrap();
        match &self.behaviour {
            Behaviour::Produce(files) => {
                // Written in reverse to prove the caller doesn't rely on
                // creation order.
                let mut outputs: Vec<PathBuf> = files
                    .iter()
                    .rev()
                    .map(|(name, contents)| {
                        let path = work_dir.join(name);
                        fs::write(&path, contents).unwrap();
                        path
                    })
                    .collect();
                outputs.sort();
                Ok(outputs)
            },
            Behaviour::Fail => exn::bail!(ConvertErrorKind::Failed {
                code: Some(1),
                reason: "invalid activation bytes".to_string(),
            }),
            Behaviour::WaitForCancel => {
                fs::write(work_dir.join("partial.mp3"), b"partial").unwrap();
                cancel.cancelled().await;
                exn::bail!(ConvertErrorKind::Cancelled)
            },
        }
    }
}

/// A temporary store with a `card` root and a `source` directory beside it.
pub struct Fixture {
    pub temp_dir: TempDir,
    pub config: Config,
}
impl Fixture {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.root = temp_dir.path().join("card");
        fs::create_dir_all(&config.store.root).unwrap();
        fs::create_dir_all(temp_dir.path().join("source")).unwrap();
        Self { temp_dir, config }
    }

    pub fn root(&self) -> &Path {
        &self.config.store.root
    }

    pub fn source(&self) -> PathBuf {
        self.temp_dir.path().join("source")
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.store.database_path()
    }

    /// Writes a file under the source directory, returning its path.
    pub fn add_source(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.source().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn library(&self) -> Library {
        self.library_with(MockGateway::new(Behaviour::Fail))
    }

    pub fn library_with(&self, gateway: Arc<dyn Gateway>) -> Library {
        Library::with_gateway(&self.config, gateway).unwrap()
    }
}

/// Runs an ingestion to completion, answering any replacement prompt with
/// `replace`. Returns every event, or the error that ended the stream.
pub async fn ingest(library: &Library, request: IngestRequest, replace: bool) -> Result<Vec<IngestEvent>> {
    ingest_with(library, request, replace, CancellationToken::new()).await
}

pub async fn ingest_with(
    library: &Library,
    request: IngestRequest,
    replace: bool,
    cancel: CancellationToken,
) -> Result<Vec<IngestEvent>> {
    let stream = library.ingest(request, move |_slot, _record| async move { replace }, cancel);
    let results: Vec<Result<IngestEvent>> = stream.collect().await;
    results.into_iter().collect()
}

/// File names inside a directory, sorted.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
