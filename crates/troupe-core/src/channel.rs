//! Transport abstraction and the tri-state delivery result
//!
//! A [`Channel`] is anything that can accept a message and either take it,
//! hand it back for a later retry, or reject it for good. The retry engine
//! and the actor mailbox are both written against this one contract.

/// Outcome of a single transport send attempt.
///
/// `Failure` is transient: the transport could not take the message right
/// now and hands it back so the caller can try again. `Error` is permanent
/// for that message; it is lost and retrying is pointless.
#[derive(Debug)]
pub enum Delivery<M> {
    /// The transport accepted the message
    Success,
    /// Transient failure; the message is returned for retry
    Failure(M),
    /// Permanent failure; the message is lost
    Error,
}

impl<M> Delivery<M> {
    /// Whether the message was accepted
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A message transport.
pub trait Channel<M>: Send + Sync {
    /// Attempt to deliver one message.
    fn send(&self, message: M) -> Delivery<M>;

    /// Shut the transport down. `immediately` skips any pending work;
    /// otherwise the transport may drain first. Returns whether the
    /// transport reached a stopped state cleanly.
    fn stop(&self, immediately: bool) -> bool;
}
