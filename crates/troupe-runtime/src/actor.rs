//! The actor behavior trait
//!
//! An actor is a unit of state that only ever runs on its assigned
//! dispatch loop, one message at a time, so implementations need no
//! internal locking.

use crate::reference::Reference;
use crate::system::System;

/// User-supplied actor behavior.
///
/// Lifecycle: `post_start` fires exactly once, before the first
/// `on_message`; `pre_stop` fires exactly once, after the last delivered
/// message and before the actor is discarded.
pub trait Actor: Send + 'static {
    /// The message type this actor consumes.
    type Message: Send + 'static;

    /// Called once when the actor starts, with its own reference in hand.
    fn post_start(&mut self, system: &System, self_ref: &Reference<Self::Message>) {
        let _ = (system, self_ref);
    }

    /// Called once per delivered message.
    fn on_message(&mut self, system: &System, message: Self::Message);

    /// Called once, right before the actor stops.
    fn pre_stop(&mut self, system: &System) {
        let _ = system;
    }
}

/// Internal actor lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    New,
    Started,
    Stopped,
}

impl Lifecycle {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}
