//! Sandbox file storage
//!
//! Maps storage keys onto a plain directory tree under one root. Keys keep
//! their full form (`private/<user>/<name>`) as relative paths, so a peek
//! at the data directory shows exactly what a real bucket would hold.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::RemoteError;
use crate::services::{AccessScope, FileEntry, FileService};

pub struct SandboxStorage {
    root: PathBuf,
}

impl SandboxStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a key under the root, refusing anything that could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, RemoteError> {
        let path = Path::new(key);
        if path.is_absolute() || path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(RemoteError::Rejected(format!("invalid storage key: {key}")));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileService for SandboxStorage {
    async fn list(
        &self,
        prefix: &str,
        _scope: AccessScope,
    ) -> Result<Vec<FileEntry>, RemoteError> {
        let dir = self.resolve(prefix)?;
        let mut entries = Vec::new();
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            // Nothing uploaded yet: an empty listing, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(RemoteError::Unknown(e.to_string())),
        };
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| RemoteError::Unknown(e.to_string()))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| RemoteError::Unknown(e.to_string()))?;
            if meta.is_file() {
                entries.push(FileEntry {
                    key: format!("{prefix}{}", entry.file_name().to_string_lossy()),
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::Unknown(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| RemoteError::Unknown(e.to_string()))?;
        debug!(%key, "file stored");
        Ok(())
    }
}
