//! The system registry
//!
//! A [`System`] owns one executor and every live reference registered
//! through it. Pause and resume flip the cascade flag under the registry
//! lock, then fan out to a snapshot of the references after releasing it,
//! so a lifecycle callback running inline can call back into the system
//! without deadlocking. A reference registered mid-cascade adopts the
//! flag's value at registration time. Stopping tears down every
//! reference, then the executor; a stopped system is not reusable.

use crate::actor::Actor;
use crate::executor::{Executor, FixedPoolExecutor};
use crate::reference::Reference;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use troupe_core::constants::ACTOR_NAME_LENGTH_BYTES_MAX;
use troupe_core::error::{Error, Result};

/// Cascade view of a registered reference, with the message type erased.
pub(crate) trait Managed: Send + Sync {
    fn pause_managed(&self) -> bool;
    fn resume_managed(&self) -> bool;
    fn stop_managed(&self) -> bool;
}

impl<M: Send + 'static> Managed for Reference<M> {
    fn pause_managed(&self) -> bool {
        if self.is_stopped() {
            return true;
        }
        self.pause().is_ok()
    }

    fn resume_managed(&self) -> bool {
        if self.is_stopped() {
            return true;
        }
        self.resume().is_ok()
    }

    fn stop_managed(&self) -> bool {
        self.stop()
    }
}

struct SystemInner {
    references: Vec<Arc<dyn Managed>>,
    paused: bool,
    stopped: bool,
}

pub(crate) struct SystemState {
    executor: Box<dyn Executor>,
    inner: Mutex<SystemInner>,
}

/// Process-wide actor registry. Cheap to clone; all clones address the
/// same registry.
pub struct System {
    state: Arc<SystemState>,
}

impl Clone for System {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl System {
    /// Create a system over the given executor.
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            state: Arc::new(SystemState {
                executor: Box::new(executor),
                inner: Mutex::new(SystemInner {
                    references: Vec::new(),
                    paused: false,
                    stopped: false,
                }),
            }),
        }
    }

    /// Create a system over a fixed pool of `pool_size` dispatch loops.
    pub fn fixed_pool(pool_size: usize) -> Result<Self> {
        Ok(Self::new(FixedPoolExecutor::new(pool_size)?))
    }

    pub(crate) fn from_state(state: Arc<SystemState>) -> Self {
        Self { state }
    }

    /// Register and start a new actor under `name`. The actor's dispatch
    /// task goes to the least-loaded loop and `post_start` fires exactly
    /// once before any message. A reference created while the system is
    /// paused starts paused.
    pub fn with<A: Actor>(
        &self,
        name: impl Into<String>,
        actor: A,
    ) -> Result<Reference<A::Message>> {
        let name = name.into();
        if name.len() > ACTOR_NAME_LENGTH_BYTES_MAX {
            return Err(Error::ActorNameTooLong {
                length: name.len(),
                limit: ACTOR_NAME_LENGTH_BYTES_MAX,
            });
        }

        if self.state.inner.lock().stopped {
            return Err(Error::SystemStopped);
        }

        // Submission runs `post_start` inline under an inline executor, so
        // it must happen outside the registry lock.
        let reference = Reference::new(name, Arc::downgrade(&self.state), actor);
        let submission = self.state.executor.submit(reference.task())?;
        reference.bind_submission(submission);

        let mut inner = self.state.inner.lock();
        if inner.stopped {
            // lost the race against a concurrent stop
            drop(inner);
            reference.stop();
            return Err(Error::SystemStopped);
        }
        if inner.paused {
            // cannot fail: the reference is not stopped yet
            let _ = reference.pause();
        }
        inner.references.push(Arc::new(reference.clone()));
        debug!(name = reference.name(), "reference registered");
        Ok(reference)
    }

    /// Pause every registered reference. Returns whether all complied.
    ///
    /// The cascade runs on a snapshot taken after the flag flips, so
    /// callbacks it triggers may call back into the system.
    pub fn pause(&self) -> bool {
        let references = {
            let mut inner = self.state.inner.lock();
            if inner.stopped {
                return false;
            }
            inner.paused = true;
            inner.references.clone()
        };
        let mut all_paused = true;
        for reference in &references {
            all_paused &= reference.pause_managed();
        }
        all_paused
    }

    /// Resume every registered reference, flushing what they buffered.
    ///
    /// Snapshot-then-act like [`System::pause`].
    pub fn start(&self) -> bool {
        let references = {
            let mut inner = self.state.inner.lock();
            if inner.stopped {
                return false;
            }
            inner.paused = false;
            inner.references.clone()
        };
        let mut all_resumed = true;
        for reference in &references {
            all_resumed &= reference.resume_managed();
        }
        all_resumed
    }

    /// Stop every reference, then the executor. With `await_termination`
    /// the call blocks until queued dispatch work has drained. Idempotent.
    pub fn stop(&self, await_termination: bool) -> bool {
        let references = {
            let mut inner = self.state.inner.lock();
            if inner.stopped {
                return true;
            }
            inner.stopped = true;
            inner.paused = false;
            std::mem::take(&mut inner.references)
        };
        debug!(
            references_count = references.len(),
            await_termination, "stopping system"
        );
        let mut all_stopped = true;
        for reference in references {
            all_stopped &= reference.stop_managed();
        }
        all_stopped & self.state.executor.stop(await_termination)
    }

    /// Whether the system has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.inner.lock().stopped
    }
}
