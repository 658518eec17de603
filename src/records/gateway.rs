//! Mutation gateway
//!
//! Issues create/delete against the remote collection, optimistic-first:
//! the overlay is applied before the network call resolves, then confirmed
//! or rolled back by the outcome. Errors are surfaced to the caller; the
//! gateway never retries on its own.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::services::CollectionService;

use super::store::RecordStore;
use super::types::TodoRecord;

/// Content applied when a create arrives empty, matching the collection
/// schema's server-side default.
pub const DEFAULT_CONTENT: &str = "My new Todo";

pub struct MutationGateway {
    collection: Arc<dyn CollectionService>,
    store: Arc<RecordStore>,
}

impl MutationGateway {
    pub fn new(collection: Arc<dyn CollectionService>, store: Arc<RecordStore>) -> Self {
        Self { collection, store }
    }

    /// Create a record. The optimistic entry (under a temporary local id)
    /// is visible immediately; on success it is swapped for the persisted
    /// record, on failure it disappears without residue.
    pub async fn create(&self, content: &str) -> Result<TodoRecord, RemoteError> {
        let content = content.trim();
        let content = if content.is_empty() {
            DEFAULT_CONTENT
        } else {
            content
        };

        let op = Uuid::new_v4();
        let local = TodoRecord {
            id: format!("local-{op}"),
            content: content.to_string(),
            is_done: false,
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        self.store.begin_create(op, local);

        match self.collection.create(content, false).await {
            Ok(record) => {
                debug!(id = %record.id, "create confirmed");
                self.store.confirm_create(op, record.clone());
                Ok(record)
            }
            Err(e) => {
                warn!(error = %e, "create failed, rolling back overlay");
                self.store.roll_back(op);
                Err(e)
            }
        }
    }

    /// Delete a record. The entry is hidden immediately; a confirmed delete
    /// stays hidden through stale snapshots, a failed one reappears.
    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let op = Uuid::new_v4();
        self.store.begin_delete(op, id);

        match self.collection.delete(id).await {
            Ok(()) => {
                debug!(%id, "delete confirmed");
                self.store.confirm_delete(op);
                Ok(())
            }
            Err(e) => {
                warn!(%id, error = %e, "delete failed, rolling back overlay");
                self.store.roll_back(op);
                Err(e)
            }
        }
    }
}
