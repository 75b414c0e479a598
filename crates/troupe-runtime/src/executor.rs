//! Fixed-size executor pool
//!
//! An [`Executor`] places submitted [`Task`]s onto dispatch loops. The
//! production implementation is [`FixedPoolExecutor`]: one [`Manager`] per
//! loop, greedy least-loaded placement, exclusive locking around the load
//! bookkeeping. [`InlineExecutor`] runs everything on the calling thread
//! and exists for hosts and tests that want deterministic execution.
//!
//! Teardown asymmetry, on purpose: releasing a [`Submission`] detaches the
//! task without terminating it, while stopping the executor terminates
//! every still-attached task without detaching it.

use crate::dispatcher::{DispatchLoop, Dispatcher, DispatcherConfig, InlineLoop};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use troupe_core::constants::{DISPATCHER_POOL_SIZE_MAX, DISPATCHER_POOL_SIZE_MIN};
use troupe_core::error::{Error, Result};

/// A schedulable unit tied to one dispatch loop for its attached lifetime.
pub trait Task: Send + Sync {
    /// Bind the task to a loop. Returns whether the task accepted it.
    fn attach(&self, handle: Arc<dyn DispatchLoop>) -> bool;

    /// Unbind the task from its loop without terminating it.
    fn detach(&self) -> bool;

    /// Terminate the task.
    fn stop(&self) -> bool;
}

/// Accepts tasks and distributes them across dispatch loops.
pub trait Executor: Send + Sync {
    /// Place a task on a loop. Fails once the executor is stopped or when
    /// the task refuses to attach.
    fn submit(&self, task: Arc<dyn Task>) -> Result<Submission>;

    /// Stop every manager and loop. Each still-attached task receives
    /// `stop`, never `detach`. Idempotent.
    fn stop(&self, await_termination: bool) -> bool;
}

type Release = Box<dyn FnOnce() -> bool + Send>;

/// Handle for one accepted submission. Releasing it detaches the task from
/// its manager; it never invokes the task's terminal `stop`.
pub struct Submission {
    release: Mutex<Option<Release>>,
}

impl Submission {
    fn new(release: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Detach the task. A second call is a no-op reporting success.
    pub fn stop(&self) -> bool {
        match self.release.lock().take() {
            Some(release) => release(),
            None => true,
        }
    }
}

// =============================================================================
// Fixed pool
// =============================================================================

struct Manager {
    dispatcher: Arc<Dispatcher>,
    tasks: Mutex<Vec<Arc<dyn Task>>>,
}

impl Manager {
    fn new(index: usize) -> Result<Self> {
        let dispatcher = Dispatcher::new(DispatcherConfig::named(format!(
            "troupe-dispatch-{index}"
        )))?;
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn size(&self) -> usize {
        self.tasks.lock().len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    fn attach(&self, task: Arc<dyn Task>) -> bool {
        if !task.attach(self.dispatcher.clone()) {
            return false;
        }
        self.tasks.lock().push(task);
        true
    }

    fn detach(&self, task: &Arc<dyn Task>) -> bool {
        self.tasks
            .lock()
            .retain(|attached| !Arc::ptr_eq(attached, task));
        task.detach()
    }

    fn stop(&self, await_termination: bool) -> bool {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let mut all_stopped = true;
        for task in tasks {
            all_stopped &= task.stop();
        }
        all_stopped & self.dispatcher.stop(await_termination)
    }
}

struct PoolInner {
    managers: Vec<Arc<Manager>>,
    stopped: bool,
}

/// Executor over a fixed pool of single-threaded dispatch loops.
///
/// Placement is greedy bin-packing: scan managers tracking the minimum
/// attached-task count, stopping early at the first empty manager since an
/// empty manager is always a minimum. Ties go to the first encountered.
pub struct FixedPoolExecutor {
    inner: Mutex<PoolInner>,
}

impl FixedPoolExecutor {
    /// Create the pool, spawning `pool_size` dispatcher threads eagerly.
    pub fn new(pool_size: usize) -> Result<Self> {
        if !(DISPATCHER_POOL_SIZE_MIN..=DISPATCHER_POOL_SIZE_MAX).contains(&pool_size) {
            return Err(Error::InvalidConfiguration {
                field: "pool_size".into(),
                reason: format!(
                    "{pool_size} outside [{DISPATCHER_POOL_SIZE_MIN}, {DISPATCHER_POOL_SIZE_MAX}]"
                ),
            });
        }
        let mut managers = Vec::with_capacity(pool_size);
        for index in 0..pool_size {
            managers.push(Arc::new(Manager::new(index)?));
        }
        debug!(pool_size, "fixed executor pool started");
        Ok(Self {
            inner: Mutex::new(PoolInner {
                managers,
                stopped: false,
            }),
        })
    }
}

impl Executor for FixedPoolExecutor {
    fn submit(&self, task: Arc<dyn Task>) -> Result<Submission> {
        let inner = self.inner.lock();
        if inner.stopped {
            return Err(Error::ExecutorStopped);
        }

        let mut best = inner.managers[0].clone();
        for manager in inner.managers.iter().skip(1) {
            if best.is_empty() {
                break;
            }
            if manager.size() < best.size() {
                best = manager.clone();
            }
        }

        if !best.attach(task.clone()) {
            return Err(Error::task_rejected("task refused to attach"));
        }
        drop(inner);

        Ok(Submission::new(move || best.detach(&task)))
    }

    fn stop(&self, await_termination: bool) -> bool {
        let managers = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return true;
            }
            inner.stopped = true;
            std::mem::take(&mut inner.managers)
        };
        let mut all_stopped = true;
        for manager in managers {
            all_stopped &= manager.stop(await_termination);
        }
        all_stopped
    }
}

// =============================================================================
// Inline executor
// =============================================================================

struct InlineInner {
    tasks: Vec<Arc<dyn Task>>,
    stopped: bool,
}

/// Executor that runs every task on the calling thread through one
/// [`InlineLoop`]. Deterministic and single-threaded; the tool of choice
/// for lifecycle tests and hosts that already own a loop.
pub struct InlineExecutor {
    dispatch: Arc<InlineLoop>,
    inner: Arc<Mutex<InlineInner>>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self {
            dispatch: Arc::new(InlineLoop::new()),
            inner: Arc::new(Mutex::new(InlineInner {
                tasks: Vec::new(),
                stopped: false,
            })),
        }
    }
}

impl Default for InlineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for InlineExecutor {
    fn submit(&self, task: Arc<dyn Task>) -> Result<Submission> {
        if self.inner.lock().stopped {
            return Err(Error::ExecutorStopped);
        }
        // Attach outside the lock: the task may run work inline right away,
        // and that work may submit again.
        if !task.attach(self.dispatch.clone()) {
            return Err(Error::task_rejected("task refused to attach"));
        }
        self.inner.lock().tasks.push(task.clone());

        let inner = self.inner.clone();
        Ok(Submission::new(move || {
            let mut guard = inner.lock();
            guard.tasks.retain(|attached| !Arc::ptr_eq(attached, &task));
            drop(guard);
            task.detach()
        }))
    }

    fn stop(&self, _await_termination: bool) -> bool {
        let tasks = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return true;
            }
            inner.stopped = true;
            std::mem::take(&mut inner.tasks)
        };
        let mut all_stopped = true;
        for task in tasks {
            all_stopped &= task.stop();
        }
        all_stopped
    }
}
