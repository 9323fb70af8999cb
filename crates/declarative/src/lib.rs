//! # Declarative
//!
//! Wanted/current state tracking and reconciliation into shell tasks.
//!
//! ## Core Concepts
//!
//! - **StateSnapshot**: observed ("current") and user-intended ("wanted")
//!   state for every resource kind and singleton setting, immutable once
//!   published
//! - **ResourceStateStore**: applies mutations, prunes overrides that match
//!   what is observed, and publishes a new snapshot per mutation
//! - **ReconciliationEngine**: subscribes to the store and keeps one task
//!   per resource kind in a [`TaskQueue`]
//! - **TaskQueue**: deduplicated by id, drained in stable priority order
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     PlanContext, ReconciliationEngine, ResourceKind, ResourceStateStore, queue,
//! };
//! use std::sync::Arc;
//!
//! let tasks = queue::shared();
//! let store = ResourceStateStore::new();
//! store.subscribe(Arc::new(ReconciliationEngine::new(
//!     tasks.clone(),
//!     PlanContext::new("alice"),
//! )));
//!
//! store.toggle(ResourceKind::Package, "htop")?;
//! assert!(queue::lock(&tasks).contains("reconcile:package"));
//!
//! store.toggle(ResourceKind::Package, "htop")?;
//! assert!(queue::lock(&tasks).is_empty());
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! Nothing in this crate touches the live system; scanning and execution
//! live with the caller.

pub mod context;
pub mod diff;
pub mod error;
pub mod planner;
pub mod queue;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use context::{PlanContext, SnapshotListener};
pub use diff::{DiffSummary, KindDiff, StateMap, diff};
pub use error::{Error, Result};
pub use planner::{ReconciliationEngine, ensure_package_task, plan};
pub use queue::{QueuePosition, SharedQueue, TaskQueue};
pub use store::{ObservedState, ResourceStateStore, StateSnapshot, WantedState};
pub use types::{DnsProvider, LoginShell, ResourceKind, Setting, Singleton, Task, validate_name};
