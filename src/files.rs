//! Private file cache
//!
//! Mirrors the user's private storage prefix as a cached listing. The
//! backend never pushes file events, so the cache is refreshed by full
//! re-list only: after a successful upload, or on explicit request.
//! Listings replace the cached set wholesale in completion order.

use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::services::{AccessScope, FileEntry, FileService};

struct CacheInner {
    entries: Vec<FileEntry>,
    closed: bool,
}

/// Cached view of one storage prefix.
pub struct FileCache {
    service: Arc<dyn FileService>,
    prefix: String,
    inner: RwLock<CacheInner>,
    entries_tx: watch::Sender<Vec<FileEntry>>,
}

impl FileCache {
    pub fn new(service: Arc<dyn FileService>, prefix: String) -> Arc<Self> {
        let (entries_tx, _) = watch::channel(Vec::new());
        Arc::new(Self {
            service,
            prefix,
            inner: RwLock::new(CacheInner {
                entries: Vec::new(),
                closed: false,
            }),
            entries_tx,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.inner.read().unwrap().entries.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<FileEntry>> {
        self.entries_tx.subscribe()
    }

    /// Re-list the prefix and replace the cached set with the result.
    /// Concurrent refreshes are allowed; whichever listing completes last
    /// is the one that sticks.
    pub async fn refresh(&self) -> Result<(), RemoteError> {
        if self.inner.read().unwrap().closed {
            return Ok(());
        }
        let listed = self.service.list(&self.prefix, AccessScope::Private).await;
        match listed {
            Ok(entries) => {
                let mut inner = self.inner.write().unwrap();
                if inner.closed {
                    return Ok(());
                }
                debug!(count = entries.len(), "file listing refreshed");
                inner.entries = entries;
                self.entries_tx.send_replace(inner.entries.clone());
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "file listing failed, keeping cached entries");
                Err(e)
            }
        }
    }

    /// Upload one file under the cache's prefix, then refresh the listing
    /// once so the new key becomes visible.
    pub async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        if self.inner.read().unwrap().closed {
            return Ok(());
        }
        let full_key = format!("{}{}", self.prefix, key);
        self.service.upload(&full_key, bytes).await?;
        debug!(key = %full_key, "upload succeeded");
        self.on_upload_success().await
    }

    /// An upload (through this cache or elsewhere) landed: re-list exactly
    /// once. The backend pushes no file events, so this is the only signal.
    pub async fn on_upload_success(&self) -> Result<(), RemoteError> {
        self.refresh().await
    }

    /// Tear down: later refreshes and uploads become no-ops and the cached
    /// entries stop changing.
    pub fn close(&self) {
        self.inner.write().unwrap().closed = true;
    }
}
