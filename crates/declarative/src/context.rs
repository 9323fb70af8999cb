//! Listener traits and planning context
//!
//! These let the store publish snapshots without knowing who consumes
//! them, and let the planner synthesize scripts without reading the
//! environment itself.

use crate::store::StateSnapshot;

/// Receives every snapshot published by the state store.
///
/// Calls are serialized and arrive in publication order. The snapshot
/// lock is already released, so implementations may read the store
/// again; mutating it from inside the callback deadlocks.
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, snapshot: &StateSnapshot);
}

/// Values the planner splices into scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    /// Account whose groups and login shell are managed
    pub user: String,
}

impl PlanContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}
