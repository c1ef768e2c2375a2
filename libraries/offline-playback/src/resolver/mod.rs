//! Source resolution
//!
//! Turns a queue entry into something a backend can open: a stream URL for
//! the direct backend, a local file for the engine. Remote entries bound
//! for the engine are downloaded into the cache directory first, with an
//! in-memory fetch as fallback.

mod catalog;
mod http;

pub use catalog::StreamEndpointCatalog;
pub use http::HttpFetcher;

use crate::error::{PlaybackError, Result};
use crate::types::{BackendKind, PlaybackEntry, SourceRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Remote catalog: resolves a track id to a streamable URL
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn resolve_stream_url(&self, track_id: &str) -> Result<Url>;
}

/// Network fetches used to materialize remote media
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Stream `url` into `dest`, returning the number of bytes written
    async fn download_to_file(&self, url: &Url, dest: &Path) -> Result<u64>;

    /// Fetch the whole body of `url` into memory
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Resolves entries for either backend and remembers materialized files
pub struct SourceResolver {
    catalog: Arc<dyn CatalogClient>,
    fetcher: Arc<dyn MediaFetcher>,
    cache_dir: PathBuf,
    default_extension: String,
    materialized: Mutex<HashMap<String, PathBuf>>,
}

impl SourceResolver {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        fetcher: Arc<dyn MediaFetcher>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            cache_dir: cache_dir.into(),
            default_extension: "mp3".to_string(),
            materialized: Mutex::new(HashMap::new()),
        }
    }

    /// Extension used when the media URL has none
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// URL to open `entry` with on `backend`
    ///
    /// A `file://` URL for the engine, the stream URL for the direct backend.
    pub async fn resolve(
        &self,
        entry: &PlaybackEntry,
        backend: BackendKind,
        cancel: &CancellationToken,
    ) -> Result<Url> {
        match backend {
            BackendKind::DirectStream => self.stream_url(entry, cancel).await,
            BackendKind::Engine => {
                let path = self.local_file(entry, cancel).await?;
                file_url(&entry.id, &path)
            }
        }
    }

    /// Streamable URL for the direct backend
    pub async fn stream_url(&self, entry: &PlaybackEntry, cancel: &CancellationToken) -> Result<Url> {
        match &entry.source {
            SourceRef::LocalFile(path) => file_url(&entry.id, path),
            SourceRef::Remote { track_id } => {
                cancellable(cancel, self.catalog.resolve_stream_url(track_id))
                    .await
                    .map_err(|e| unavailable(&entry.id, e))
            }
        }
    }

    /// Local file for the engine backend, downloading it if needed
    pub async fn local_file(
        &self,
        entry: &PlaybackEntry,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let track_id = match &entry.source {
            SourceRef::LocalFile(path) => {
                return if path.exists() {
                    Ok(path.clone())
                } else {
                    Err(unavailable(
                        &entry.id,
                        format!("{} does not exist", path.display()),
                    ))
                };
            }
            SourceRef::Remote { track_id } => track_id,
        };

        if let Some(path) = self.cached(track_id) {
            debug!(entry_id = %entry.id, path = %path.display(), "Using cached file");
            return Ok(path);
        }

        let url = cancellable(cancel, self.catalog.resolve_stream_url(track_id))
            .await
            .map_err(|e| unavailable(&entry.id, e))?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let dest = self
            .cache_dir
            .join(format!("{}.{}", Uuid::new_v4(), self.extension_for(&url)));

        let path = match cancellable(cancel, self.fetcher.download_to_file(&url, &dest)).await {
            Ok(bytes) => {
                info!(entry_id = %entry.id, dest = %dest.display(), size = bytes, "Track downloaded");
                dest
            }
            Err(PlaybackError::Cancelled) => return Err(PlaybackError::Cancelled),
            Err(download_err) => {
                warn!(
                    entry_id = %entry.id,
                    error = %download_err,
                    "Streamed download failed, falling back to in-memory fetch"
                );
                match self.fetch_and_write(&url, &dest, cancel).await {
                    Ok(()) => dest,
                    Err(PlaybackError::Cancelled) => return Err(PlaybackError::Cancelled),
                    Err(fallback_err) => {
                        return Err(unavailable(
                            &entry.id,
                            format!("download: {}; fallback: {}", download_err, fallback_err),
                        ));
                    }
                }
            }
        };

        self.remember(track_id, &path);
        Ok(path)
    }

    async fn fetch_and_write(&self, url: &Url, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        let bytes = cancellable(cancel, self.fetcher.fetch_bytes(url)).await?;
        let part = PartFile::new(dest);
        tokio::fs::write(part.path(), &bytes).await?;
        part.persist().await?;
        info!(dest = %dest.display(), size = bytes.len(), "Track written from memory");
        Ok(())
    }

    fn cached(&self, track_id: &str) -> Option<PathBuf> {
        let map = self.materialized.lock().ok()?;
        map.get(track_id).filter(|path| path.exists()).cloned()
    }

    fn remember(&self, track_id: &str, path: &Path) {
        if let Ok(mut map) = self.materialized.lock() {
            map.insert(track_id.to_string(), path.to_path_buf());
        }
    }

    fn extension_for(&self, url: &Url) -> String {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map_or_else(|| self.default_extension.clone(), str::to_string)
    }
}

/// `dest` with `.part` appended to its file name
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// A `.part` file beside its destination, removed on drop unless persisted
///
/// Dropping the future that writes it (a cancelled download) removes the
/// partial file with it.
pub(crate) struct PartFile {
    path: PathBuf,
    dest: PathBuf,
    persisted: bool,
}

impl PartFile {
    pub(crate) fn new(dest: &Path) -> Self {
        Self {
            path: part_path(dest),
            dest: dest.to_path_buf(),
            persisted: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Move the finished file to its destination
    pub(crate) async fn persist(mut self) -> Result<()> {
        tokio::fs::rename(&self.path, &self.dest).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial download"),
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = cancel.cancelled() => Err(PlaybackError::Cancelled),
        result = fut => result,
    }
}

fn file_url(entry_id: &str, path: &Path) -> Result<Url> {
    Url::from_file_path(path)
        .map_err(|()| unavailable(entry_id, format!("{} is not an absolute path", path.display())))
}

fn unavailable(entry_id: &str, reason: impl ToString) -> PlaybackError {
    PlaybackError::SourceUnavailable {
        entry_id: entry_id.to_string(),
        reason: reason.to_string(),
    }
}
