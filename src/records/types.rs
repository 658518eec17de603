//! Record and snapshot types

use serde::{Deserialize, Serialize};

/// One todo record as the server knows it.
///
/// Identity is the `id`; `updated_at` (millisecond timestamp) only resolves
/// ordering between an optimistic local write and a later push echo of the
/// same logical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoRecord {
    pub id: String,
    pub content: String,
    pub is_done: bool,
    pub updated_at: i64,
}

/// Full state of the collection at one point in time.
///
/// Each snapshot is the whole collection, not a delta. `seq` is assigned
/// monotonically by the producer so a reordered older snapshot can be
/// detected and dropped by the store.
#[derive(Debug, Clone)]
pub struct Snapshot {
    seq: u64,
    records: Vec<TodoRecord>,
}

impl Snapshot {
    /// Build a snapshot, keeping arrival order but deduplicating by id.
    /// A later duplicate replaces the earlier occurrence in place.
    pub fn new(seq: u64, records: Vec<TodoRecord>) -> Self {
        let mut deduped: Vec<TodoRecord> = Vec::with_capacity(records.len());
        for record in records {
            if let Some(existing) = deduped.iter_mut().find(|r| r.id == record.id) {
                *existing = record;
            } else {
                deduped.push(record);
            }
        }
        Self {
            seq,
            records: deduped,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn records(&self) -> &[TodoRecord] {
        &self.records
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }
}
