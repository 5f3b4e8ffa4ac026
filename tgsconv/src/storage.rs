//! Transient storage for rendered artifacts.
//!
//! Every render gets a fresh `<uuid>.png` path under one shared directory, so concurrent requests
//! never collide and no locking is needed. Files are short-lived: the request handler wraps the
//! artifact in an [`ArtifactStream`] whose [`ArtifactGuard`] deletes the file once the response
//! body is dropped. Anything left behind by a crash can be removed between restarts.

use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};
use uuid::Uuid;

/// Extension of every artifact written by the renderer
pub const ARTIFACT_EXTENSION: &str = "png";

/// The directory rendered frames are written to.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Reserve a unique artifact path. Nothing is written.
    pub fn allocate(&self) -> PathBuf {
        self.root.join(format!("{}.{}", Uuid::new_v4(), ARTIFACT_EXTENSION))
    }

    /// Remove an artifact if present. Failures are logged, never returned.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(artifact = %path.display(), "Removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(artifact = %path.display(), error = %e, "Error deleting temporary file"),
        }
    }

    /// Open an artifact for streaming. The file is deleted when the returned stream is dropped,
    /// including when opening fails.
    pub async fn open_stream(&self, path: PathBuf) -> io::Result<ArtifactStream> {
        let guard = ArtifactGuard::new(path);
        let file = File::open(guard.path()).await?;
        let len = file.metadata().await?.len();
        Ok(ArtifactStream {
            inner: ReaderStream::new(file),
            len,
            _guard: guard,
        })
    }
}

/// Deletes the artifact at `path` when dropped.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        // Blocking unlink on the current worker thread; a single file.
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(artifact = %self.path.display(), "Removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(artifact = %self.path.display(), error = %e, "Error deleting temporary file"),
        }
    }
}

/// Byte stream over an artifact that owns the artifact's cleanup.
#[derive(Debug)]
pub struct ArtifactStream {
    inner: ReaderStream<File>,
    len: u64,
    _guard: ArtifactGuard,
}

impl ArtifactStream {
    /// File size at the time it was opened
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
