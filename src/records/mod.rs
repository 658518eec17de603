//! Record synchronization
//!
//! Keeps a local mirror of the server-held todo collection consistent with
//! two concurrent inputs: full-state snapshots pushed by the subscription
//! channel, and optimistic overlays applied by the mutation gateway before
//! the network confirms. The merge rule is always `snapshot + overlays`,
//! recomputed atomically on every change.

mod channel;
mod gateway;
mod store;
mod types;

pub use channel::SnapshotChannel;
pub use gateway::MutationGateway;
pub use store::RecordStore;
pub use types::{Snapshot, TodoRecord};
