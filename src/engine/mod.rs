//! Execution engine for rani
//!
//! The engine turns queued tasks into changes on the live system:
//! 1. Staging - write each script to disk and record its digest
//! 2. Dispatch - hand it to the session of the right privilege level,
//!    which verifies the digest before running anything
//! 3. Refresh - rescan the system once the pass is over

pub mod coordinator;
pub mod differ;
pub mod error;
pub mod integrity;
pub mod observer;

pub use coordinator::{
    CoordinatorConfig, CoordinatorStatus, ExecutionCoordinator, PassReport, RefreshFuture,
    StateRefresher, TaskOutcome,
};
pub use observer::ExecutionObserver;
