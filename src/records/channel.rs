//! Live subscription handle
//!
//! Wraps the push side of a collection subscription in an explicit,
//! cancellable handle: `next_snapshot` awaits the next full-state snapshot
//! (or `None` when the stream closes), `cancel` synchronously stops
//! delivery. A closed stream means silence, never "the collection is
//! empty" - resuming requires an explicit resubscribe by the owner.

use tokio::sync::mpsc;

use super::types::Snapshot;

/// Receiving end of one collection subscription.
pub struct SnapshotChannel {
    rx: mpsc::Receiver<Snapshot>,
    cancelled: bool,
}

impl SnapshotChannel {
    pub fn new(rx: mpsc::Receiver<Snapshot>) -> Self {
        Self {
            rx,
            cancelled: false,
        }
    }

    /// Await the next snapshot. Returns `None` once the producer is gone or
    /// after `cancel`; buffered snapshots are never delivered past a cancel.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Stop delivery immediately. Synchronous, idempotent, and releases the
    /// producer-side registration (senders observe the closed channel and
    /// drop this subscriber).
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.rx.close();
        // Drain anything already buffered so the producer sees the channel
        // fully released.
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
