//! Buffering attach/detach adapter in front of a channel
//!
//! A [`BufferedMessenger`] lets a producer send before the consumer's
//! transport exists. While detached it queues messages in order; on attach
//! it flushes the queue oldest-first through the channel, then passes new
//! sends straight through. Detaching reverts to buffering without losing
//! anything already queued.
//!
//! One reentrant lock serializes attach, detach, and send across threads,
//! so no caller ever observes a half-flushed buffer. The lock is reentrant
//! because a channel may invoke work inline (see `InlineExecutor`) and that
//! work may send again from the same thread.

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use troupe_core::channel::{Channel, Delivery};
use troupe_core::send::send_with_retries;

/// Ordered buffer in front of an optional channel.
pub struct BufferedMessenger<M> {
    inner: ReentrantMutex<RefCell<Inner<M>>>,
}

struct Inner<M> {
    channel: Option<Arc<dyn Channel<M>>>,
    buffer: VecDeque<M>,
}

impl<M: Send + 'static> BufferedMessenger<M> {
    /// Create a detached messenger with an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner {
                channel: None,
                buffer: VecDeque::new(),
            })),
        }
    }

    /// Attach a channel and flush the buffer through it, oldest first.
    ///
    /// Returns whether every buffered message was delivered. Subsequent
    /// sends pass straight through to the channel.
    pub fn attach(&self, channel: Arc<dyn Channel<M>>) -> bool {
        let guard = self.inner.lock();
        guard.borrow_mut().channel = Some(channel.clone());

        let mut all_delivered = true;
        loop {
            // A callback run inline by the channel may detach again
            // mid-flush; the remaining messages then stay buffered.
            if guard.borrow().channel.is_none() {
                break;
            }
            let message = match guard.borrow_mut().buffer.pop_front() {
                Some(message) => message,
                None => break,
            };
            all_delivered &= send_with_retries(channel.as_ref(), message);
        }
        all_delivered
    }

    /// Detach the channel; future sends buffer instead.
    ///
    /// Buffered-but-undelivered messages survive attach/detach cycles.
    pub fn detach(&self) -> bool {
        let guard = self.inner.lock();
        let had_channel = guard.borrow_mut().channel.take().is_some();
        had_channel
    }

    /// Whether a channel is currently attached.
    pub fn is_attached(&self) -> bool {
        self.inner.lock().borrow().channel.is_some()
    }

    /// Number of messages waiting in the buffer.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().borrow().buffer.len()
    }
}

impl<M: Send + 'static> Default for BufferedMessenger<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + 'static> Channel<M> for BufferedMessenger<M> {
    fn send(&self, message: M) -> Delivery<M> {
        let guard = self.inner.lock();
        // The borrow is released before delegating; the channel may run
        // work inline that sends again on this thread.
        let channel = guard.borrow().channel.clone();
        match channel {
            Some(channel) => channel.send(message),
            None => {
                guard.borrow_mut().buffer.push_back(message);
                Delivery::Success
            }
        }
    }

    fn stop(&self, immediately: bool) -> bool {
        let guard = self.inner.lock();
        let channel = guard.borrow_mut().channel.take();
        let mut all_delivered = true;
        match (&channel, immediately) {
            (Some(channel), false) => loop {
                let message = match guard.borrow_mut().buffer.pop_front() {
                    Some(message) => message,
                    None => break,
                };
                all_delivered &= send_with_retries(channel.as_ref(), message);
            },
            _ => {
                let dropped_count = guard.borrow().buffer.len();
                if dropped_count > 0 {
                    debug!(dropped_count, "messenger stopped with pending messages");
                    all_delivered = false;
                }
            }
        }
        guard.borrow_mut().buffer.clear();
        match channel {
            Some(channel) => channel.stop(immediately) && all_delivered,
            None => all_delivered,
        }
    }
}
