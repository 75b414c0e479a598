//! Troupe Runtime
//!
//! Scheduling, lifecycle, and registry for Troupe actors.
//!
//! # Overview
//!
//! The runtime provides:
//! - A fixed pool of single-threaded dispatch loops with least-loaded
//!   placement
//! - Per-actor lifecycle management (running/paused/stopped) with
//!   in-order, no-loss mailbox semantics
//! - A buffering attach/detach messenger for producers that outrun their
//!   consumer's execution context
//! - A system registry cascading pause/resume/stop to every actor
//!
//! # TigerStyle
//! - One message in flight per actor, ever
//! - Explicit lifecycle states, idempotent terminal transitions
//! - Self-sends re-enter through the scheduler queue, never the call stack

pub mod actor;
pub mod dispatcher;
pub mod executor;
pub mod messenger;
pub mod reference;
pub mod system;

pub use actor::Actor;
pub use dispatcher::{DispatchLoop, Dispatcher, DispatcherConfig, InlineLoop, Job};
pub use executor::{Executor, FixedPoolExecutor, InlineExecutor, Submission, Task};
pub use messenger::BufferedMessenger;
pub use reference::Reference;
pub use system::System;
