//! Troupe Core
//!
//! Core types, errors, and delivery primitives for the Troupe actor
//! runtime.
//!
//! # Overview
//!
//! Troupe is an embeddable actor runtime: isolated units of state reachable
//! only through asynchronous messages, scheduled over a bounded pool of
//! single-threaded dispatch loops. This crate holds the pieces with no
//! scheduling dependency: the tri-state delivery contract, the bounded
//! retry engine, the reliable-send composition of the two, and the shared
//! configuration and error types.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `DELIVERY_TRIES_COUNT_MAX`)
//! - No recursion (bounded iteration only)

pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod retry;
pub mod send;

pub use channel::{Channel, Delivery};
pub use config::TroupeConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use retry::{run, Attempt, RetryAction};
pub use send::{send_with_retries, send_with_tries, SendAction};
