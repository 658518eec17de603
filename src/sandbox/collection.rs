//! Sandbox todo collection
//!
//! Authoritative record set held in memory and mirrored to a JSON file so
//! state survives restarts. Every change rebroadcasts the full state to all
//! live subscribers with a fresh sequence number, the same shape a real
//! push backend would deliver. Mutations made directly on the collection
//! (outside any client) stand in for other devices writing to the same
//! account.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::records::{Snapshot, SnapshotChannel, TodoRecord};
use crate::services::CollectionService;

const FEED_BUFFER: usize = 16;

pub struct SandboxCollection {
    records: RwLock<Vec<TodoRecord>>,
    subscribers: Mutex<Vec<mpsc::Sender<Snapshot>>>,
    seq: AtomicU64,
    next_id: AtomicU64,
    persist_path: Option<PathBuf>,
    /// Scripted failure for the next mutation, for exercising rollback.
    fail_next: Mutex<Option<RemoteError>>,
}

impl SandboxCollection {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            persist_path: None,
            fail_next: Mutex::new(None),
        }
    }

    /// Load records from `path` (if present) and mirror every change back
    /// to it. A missing or unreadable file starts the collection empty.
    pub fn load(path: &Path) -> Self {
        let records: Vec<TodoRecord> = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring malformed todo file");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        // Resume id assignment past anything already persisted.
        let max_id = records
            .iter()
            .filter_map(|r| r.id.strip_prefix("todo-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Self {
            records: RwLock::new(records),
            subscribers: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
            next_id: AtomicU64::new(max_id + 1),
            persist_path: Some(path.to_path_buf()),
            fail_next: Mutex::new(None),
        }
    }

    /// Make the next create or delete fail with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    fn take_failure(&self) -> Option<RemoteError> {
        self.fail_next.lock().unwrap().take()
    }

    fn snapshot(&self) -> Snapshot {
        // The seq must be taken while the records lock is held: a writer
        // cannot slip between the clone and the fetch_add, so a snapshot
        // with a higher seq always carries state at least as new.
        let records = self.records.read().unwrap();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Snapshot::new(seq, records.clone())
    }

    fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let records = self.records.read().unwrap().clone();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&records) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!(path = %path.display(), error = %e, "failed to persist todos");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize todos"),
        }
    }

    /// Push the current full state to every live subscriber. Senders whose
    /// channel is gone are dropped from the list.
    async fn broadcast(&self) {
        let snapshot = self.snapshot();
        let feeds: Vec<mpsc::Sender<Snapshot>> = {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.retain(|tx| !tx.is_closed());
            subscribers.clone()
        };
        debug!(seq = snapshot.seq(), feeds = feeds.len(), "broadcasting snapshot");
        for feed in feeds {
            let _ = feed.send(snapshot.clone()).await;
        }
    }
}

impl Default for SandboxCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionService for SandboxCollection {
    async fn subscribe(&self) -> Result<SnapshotChannel, RemoteError> {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        // The initial full-state snapshot is buffered before the sender is
        // registered, so the subscriber always sees current state first.
        let _ = tx.try_send(self.snapshot());
        self.subscribers.lock().unwrap().push(tx);
        Ok(SnapshotChannel::new(rx))
    }

    async fn create(&self, content: &str, is_done: bool) -> Result<TodoRecord, RemoteError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let record = TodoRecord {
            id: format!("todo-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            content: content.to_string(),
            is_done,
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        self.records.write().unwrap().push(record.clone());
        self.persist();
        self.broadcast().await;
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        {
            let mut records = self.records.write().unwrap();
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(RemoteError::Rejected("record not found".into()));
            }
        }
        self.persist();
        self.broadcast().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_subscribe_delivers_current_state_first() {
        let collection = SandboxCollection::new();
        collection.create("existing", false).await.unwrap();

        let mut channel = collection.subscribe().await.unwrap();
        let snapshot = channel.next_snapshot().await.unwrap();
        assert_eq!(snapshot.records().len(), 1);
        assert_eq!(snapshot.records()[0].content, "existing");
    }

    #[tokio::test]
    async fn test_mutations_broadcast_with_increasing_seq() {
        let collection = SandboxCollection::new();
        let mut channel = collection.subscribe().await.unwrap();
        let initial = channel.next_snapshot().await.unwrap();

        collection.create("one", false).await.unwrap();
        let after_create = channel.next_snapshot().await.unwrap();
        assert!(after_create.seq() > initial.seq());
        assert_eq!(after_create.records().len(), 1);

        let id = after_create.records()[0].id.clone();
        collection.delete(&id).await.unwrap();
        let after_delete = channel.next_snapshot().await.unwrap();
        assert!(after_delete.seq() > after_create.seq());
        assert!(after_delete.records().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_unknown_id_is_rejected() {
        let collection = SandboxCollection::new();
        let err = collection.delete("todo-999").await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_scripted_failure_applies_once() {
        let collection = SandboxCollection::new();
        collection.fail_next(RemoteError::Transient);

        let err = collection.create("doomed", false).await.unwrap_err();
        assert!(err.is_transient());
        // The failure is consumed; the next call succeeds.
        collection.create("fine", false).await.unwrap();
        assert_eq!(collection.records.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_subscriber_is_pruned() {
        let collection = SandboxCollection::new();
        let mut channel = collection.subscribe().await.unwrap();
        channel.cancel();

        collection.create("one", false).await.unwrap();
        assert!(collection.subscribers.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_highest_seq_snapshot_carries_newest_state() {
        let collection = Arc::new(SandboxCollection::new());
        let mut channel = collection.subscribe().await.unwrap();

        const WRITERS: usize = 32;
        let mut writers = Vec::new();
        for i in 0..WRITERS {
            let collection = collection.clone();
            writers.push(tokio::spawn(async move {
                collection.create(&format!("todo {i}"), false).await.unwrap();
            }));
        }

        // Drain every broadcast (1 initial + one per create) while the
        // writers run, keeping the one with the highest seq.
        let mut newest: Option<Snapshot> = None;
        for _ in 0..=WRITERS {
            let snapshot = channel.next_snapshot().await.unwrap();
            if newest.as_ref().map_or(true, |n| snapshot.seq() > n.seq()) {
                newest = Some(snapshot);
            }
        }
        for writer in writers {
            writer.await.unwrap();
        }

        // Seq order must agree with state order: the highest-seq snapshot
        // is the complete one, so a store keyed on seq never hides a
        // freshly created record.
        assert_eq!(newest.unwrap().records().len(), WRITERS);
    }

    #[tokio::test]
    async fn test_records_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("todos.json");

        let first = SandboxCollection::load(&path);
        let kept = first.create("persist me", false).await.unwrap();
        first.create("and me", true).await.unwrap();

        let second = SandboxCollection::load(&path);
        let records = second.records.read().unwrap().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, kept.id);

        // Id assignment continues past the persisted ids.
        drop(records);
        let next = second.create("new", false).await.unwrap();
        assert_ne!(next.id, kept.id);
    }
}
