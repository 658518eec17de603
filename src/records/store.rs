//! Local record store
//!
//! In-memory mirror of the remote collection. The externally visible set is
//! always `snapshot + pending overlays`, recomputed under one write lock so
//! observers never see a partially-applied snapshot. Overlay clearance is
//! keyed to the gateway's explicit "my write landed" signal (the echoed
//! server id), never to "any newer snapshot arrived".

use std::collections::HashSet;
use std::sync::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{Snapshot, TodoRecord};

/// A locally pending mutation, shown optimistically until reconciled.
#[derive(Debug, Clone)]
enum Overlay {
    /// Pending create. `record` carries a temporary local id until the
    /// gateway confirms the persisted record; `confirmed` then holds the
    /// server id the overlay waits to see echoed in a snapshot.
    ///
    /// If the snapshot echo lands before the confirm, the visible set
    /// briefly holds both the echoed record and the local-id overlay:
    /// nothing ties the two together until the gateway reports the server
    /// id. The confirm resolves the duplicate.
    Create {
        record: TodoRecord,
        confirmed: Option<String>,
    },
    /// Pending or confirmed delete. While `confirmed` is false the call is
    /// still in flight; once true this is a tombstone that keeps the id
    /// hidden through transiently stale snapshots until one arrives
    /// without it.
    Delete { id: String, confirmed: bool },
}

struct PendingOp {
    op: Uuid,
    overlay: Overlay,
    started_at: i64,
}

struct StoreInner {
    snapshot: Vec<TodoRecord>,
    last_seq: Option<u64>,
    overlays: Vec<PendingOp>,
    closed: bool,
}

/// Reconciled local view of the collection.
pub struct RecordStore {
    inner: RwLock<StoreInner>,
    visible_tx: watch::Sender<Vec<TodoRecord>>,
}

impl RecordStore {
    pub fn new() -> Self {
        let (visible_tx, _) = watch::channel(Vec::new());
        Self {
            inner: RwLock::new(StoreInner {
                snapshot: Vec::new(),
                last_seq: None,
                overlays: Vec::new(),
                closed: false,
            }),
            visible_tx,
        }
    }

    /// Current visible record set.
    pub fn visible(&self) -> Vec<TodoRecord> {
        self.visible_tx.borrow().clone()
    }

    /// Observe the visible set as it changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TodoRecord>> {
        self.visible_tx.subscribe()
    }

    /// Replace the authoritative view with a pushed snapshot.
    ///
    /// Stale snapshots (seq at or below the last applied one) are dropped,
    /// so a reordered older snapshot can never overwrite a newer view.
    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        if let Some(last) = inner.last_seq {
            if snapshot.seq() <= last {
                debug!(
                    seq = snapshot.seq(),
                    last, "dropping stale snapshot (reordered delivery)"
                );
                return;
            }
        }
        inner.last_seq = Some(snapshot.seq());

        // Clear overlays whose outcome this snapshot now reflects.
        inner.overlays.retain(|pending| match &pending.overlay {
            Overlay::Create {
                confirmed: Some(id),
                ..
            } => {
                let echoed = snapshot.contains(id);
                if echoed {
                    debug!(%id, "create overlay cleared by snapshot echo");
                }
                !echoed
            }
            Overlay::Delete {
                id,
                confirmed: true,
            } => {
                let gone = !snapshot.contains(id);
                if gone {
                    debug!(%id, "delete tombstone cleared by snapshot");
                }
                !gone
            }
            // Unconfirmed overlays wait for the gateway's signal.
            _ => true,
        });

        inner.snapshot = snapshot.records().to_vec();
        self.publish(&inner);
    }

    /// Overlay an optimistic create before its network call resolves.
    pub fn begin_create(&self, op: Uuid, record: TodoRecord) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        inner.overlays.push(PendingOp {
            op,
            overlay: Overlay::Create {
                record,
                confirmed: None,
            },
            started_at: chrono::Utc::now().timestamp_millis(),
        });
        self.publish(&inner);
    }

    /// The create call resolved: swap the temporary record for the
    /// persisted one and wait for the snapshot echo before clearing.
    pub fn confirm_create(&self, op: Uuid, persisted: TodoRecord) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        let already_echoed = inner.snapshot.iter().any(|r| r.id == persisted.id);
        if let Some(pending) = inner.overlays.iter_mut().find(|p| p.op == op) {
            pending.overlay = Overlay::Create {
                confirmed: Some(persisted.id.clone()),
                record: persisted,
            };
        }
        if already_echoed {
            inner.overlays.retain(|p| p.op != op);
        }
        self.publish(&inner);
    }

    /// Overlay an optimistic delete before its network call resolves.
    pub fn begin_delete(&self, op: Uuid, id: &str) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        inner.overlays.push(PendingOp {
            op,
            overlay: Overlay::Delete {
                id: id.to_string(),
                confirmed: false,
            },
            started_at: chrono::Utc::now().timestamp_millis(),
        });
        self.publish(&inner);
    }

    /// The delete call resolved: promote the overlay to a tombstone that
    /// outlives transiently stale snapshots still carrying the id.
    pub fn confirm_delete(&self, op: Uuid) {
        let mut guard = self.inner.write().unwrap();
        if guard.closed {
            return;
        }
        let inner = &mut *guard;
        let mut cleared = false;
        if let Some(pending) = inner.overlays.iter_mut().find(|p| p.op == op) {
            if let Overlay::Delete { id, confirmed } = &mut pending.overlay {
                *confirmed = true;
                cleared = !inner.snapshot.iter().any(|r| r.id == *id);
            }
        }
        if cleared {
            inner.overlays.retain(|p| p.op != op);
        }
        self.publish(inner);
    }

    /// The mutation failed: remove the overlay so the view returns to
    /// exactly what the last snapshot reported.
    pub fn roll_back(&self, op: Uuid) {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return;
        }
        let before = inner.overlays.len();
        inner.overlays.retain(|p| p.op != op);
        if inner.overlays.len() != before {
            debug!(%op, "rolled back optimistic overlay");
        }
        self.publish(&inner);
    }

    /// Drop unconfirmed overlays older than `max_age_ms`.
    ///
    /// A gateway call that never resolves would otherwise pin its overlay
    /// forever. Confirmed tombstones are exempt: the write landed, only the
    /// snapshot echo is outstanding.
    pub fn expire_overlays(&self, max_age_ms: i64) -> usize {
        let mut inner = self.inner.write().unwrap();
        if inner.closed {
            return 0;
        }
        let cutoff = chrono::Utc::now().timestamp_millis() - max_age_ms;
        let before = inner.overlays.len();
        inner.overlays.retain(|p| {
            let pending_kind = matches!(
                p.overlay,
                Overlay::Create {
                    confirmed: None,
                    ..
                } | Overlay::Delete {
                    confirmed: false,
                    ..
                }
            );
            let expired = pending_kind && p.started_at < cutoff;
            if expired {
                warn!(op = %p.op, "optimistic overlay expired without resolution");
            }
            !expired
        });
        let expired = before - inner.overlays.len();
        if expired > 0 {
            self.publish(&inner);
        }
        expired
    }

    /// Tear down: every later apply/confirm becomes a no-op, so in-flight
    /// completions cannot mutate state the owner has abandoned.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.closed = true;
    }

    fn publish(&self, inner: &StoreInner) {
        let suppressed: HashSet<&str> = inner
            .overlays
            .iter()
            .filter_map(|p| match &p.overlay {
                Overlay::Delete { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();

        let mut visible: Vec<TodoRecord> = inner
            .snapshot
            .iter()
            .filter(|r| !suppressed.contains(r.id.as_str()))
            .cloned()
            .collect();

        for pending in &inner.overlays {
            if let Overlay::Create { record, .. } = &pending.overlay {
                if !visible.iter().any(|r| r.id == record.id) {
                    visible.push(record.clone());
                }
            }
        }

        self.visible_tx.send_replace(visible);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
