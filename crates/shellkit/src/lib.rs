//! # Shellkit
//!
//! Persistent interpreter sessions for running generated scripts.
//!
//! - [`CommandSession`]: one long-lived interpreter process, normal or
//!   wrapped by a [`PrivilegeElevator`], fed line by line
//! - [`SessionPool`]: the sessions one execution pass needs, started
//!   together and stopped escalated-first
//! - [`OutputBus`]: broadcast of raw stdout/stderr chunks to any number of
//!   subscribers
//!
//! Sessions need a tokio runtime; output pumping and process supervision
//! run as spawned tasks.

pub mod bus;
pub mod elevator;
pub mod error;
pub mod pool;
pub mod session;

pub use bus::{OutputBus, OutputCapture, OutputChunk, OutputSubscription};
pub use elevator::{CommandSpec, ElevatorKind, Passthrough, Pkexec, PrivilegeElevator, Sudo};
pub use error::{Result, SessionError};
pub use pool::{PoolRequest, SessionPool};
pub use session::{CommandSession, SessionKind, SessionSettings};
