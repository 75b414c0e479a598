//! Reliable send: Channel + Retry composition
//!
//! Adapts one message's journey through a [`Channel`] to the retry
//! contract: a transient `Failure` keeps the message and asks for another
//! try, a permanent `Error` aborts. The message travels by value and is
//! handed back on every transient failure, so no clone is ever taken.
//!
//! Giving up is an expected outcome reported through the returned bool,
//! never an `Err`; the hooks log it.

use crate::channel::{Channel, Delivery};
use crate::config;
use crate::retry::{run, Attempt, RetryAction};
use tracing::{error, warn};

/// One message being pushed through a channel under the retry contract.
pub struct SendAction<'a, M> {
    channel: &'a dyn Channel<M>,
    message: Option<M>,
}

impl<'a, M> SendAction<'a, M> {
    pub fn new(channel: &'a dyn Channel<M>, message: M) -> Self {
        Self {
            channel,
            message: Some(message),
        }
    }
}

impl<M> RetryAction for SendAction<'_, M> {
    fn execute(&mut self) -> Attempt {
        // The message is absent only after Success/Error, and run() stops
        // on both, so a second execute() always finds it present.
        let message = match self.message.take() {
            Some(message) => message,
            None => {
                debug_assert!(false, "send action executed after a terminal outcome");
                return Attempt::Failure;
            }
        };
        match self.channel.send(message) {
            Delivery::Success => Attempt::Success,
            Delivery::Failure(message) => {
                self.message = Some(message);
                Attempt::Again
            }
            Delivery::Error => {
                error!("message delivery failed permanently, cannot retry");
                Attempt::Failure
            }
        }
    }

    fn on_retry(&mut self, tries_left: usize) {
        warn!(tries_left, "message delivery failed, retrying");
    }

    fn on_no_more_retries(&mut self) {
        error!("message delivery failed, no more retries");
    }
}

/// Push `message` through `channel` with at most `tries_count` attempts.
/// Returns whether the message was delivered.
pub fn send_with_tries<M>(channel: &dyn Channel<M>, message: M, tries_count: usize) -> bool {
    let mut action = SendAction::new(channel, message);
    run(&mut action, tries_count) == Attempt::Success
}

/// Push `message` through `channel` using the process-wide default retry
/// budget.
pub fn send_with_retries<M>(channel: &dyn Channel<M>, message: M) -> bool {
    send_with_tries(channel, message, config::default_tries_count())
}
