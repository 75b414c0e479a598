//! Single-threaded dispatch loops
//!
//! A [`DispatchLoop`] is the one capability the runtime needs from its
//! execution context: accept closures and invoke them strictly serially.
//! Anything that honors that contract can host actors; the two
//! implementations here are a dedicated OS thread ([`Dispatcher`]) and a
//! calling-thread trampoline ([`InlineLoop`]).

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error};
use troupe_core::error::{Error, Result};

/// A unit of work scheduled onto a dispatch loop.
pub type Job = Box<dyn FnOnce() + Send>;

/// An execution context that invokes scheduled jobs one at a time, in
/// scheduling order. Implementations must never run two jobs concurrently.
pub trait DispatchLoop: Send + Sync {
    /// Queue a job. Returns `false` once the loop no longer accepts work.
    fn schedule(&self, job: Job) -> bool;
}

/// Configuration for a [`Dispatcher`] worker thread.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Name given to the worker thread
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "troupe-dispatch".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn named(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
        }
    }
}

enum Command {
    Run(Job),
    Shutdown,
}

/// A dispatch loop backed by one named OS thread draining a queue.
pub struct Dispatcher {
    sender: Sender<Command>,
    accepting: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the worker thread.
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let thread_name = config.thread_name.clone();
        let worker = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || run_loop(receiver))
            .map_err(|spawn_error| {
                Error::internal(format!(
                    "failed to spawn dispatcher thread {thread_name}: {spawn_error}"
                ))
            })?;
        Ok(Self {
            sender,
            accepting: AtomicBool::new(true),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop accepting work and queue the shutdown marker behind everything
    /// already scheduled. With `await_termination` the calling thread
    /// blocks until the queue has drained and the worker has exited.
    /// Idempotent; a later call may still request the join.
    pub fn stop(&self, await_termination: bool) -> bool {
        if self.accepting.swap(false, Ordering::SeqCst) {
            let _ = self.sender.send(Command::Shutdown);
        }
        if await_termination {
            if let Some(worker) = self.worker.lock().take() {
                return worker.join().is_ok();
            }
        }
        true
    }
}

impl DispatchLoop for Dispatcher {
    fn schedule(&self, job: Job) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.send(Command::Run(job)).is_ok()
    }
}

fn run_loop(receiver: Receiver<Command>) {
    for command in receiver.iter() {
        match command {
            Command::Run(job) => {
                // A panicking job must not take the whole loop down with it.
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("dispatched job panicked");
                }
            }
            Command::Shutdown => break,
        }
    }
    debug!("dispatcher loop exited");
}

/// A dispatch loop that runs jobs on the scheduling thread.
///
/// Jobs go through a trampoline queue: the outermost `schedule` call
/// drains it iteratively, and any job scheduled from within a running job
/// is queued behind it instead of invoked recursively. Serial invocation
/// holds and the call stack stays flat, which is exactly what the
/// runtime's no-direct-call-cycles guarantee requires.
pub struct InlineLoop {
    queue: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
}

impl InlineLoop {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }
}

impl Default for InlineLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchLoop for InlineLoop {
    fn schedule(&self, job: Job) -> bool {
        self.queue.lock().push_back(job);
        if self.draining.swap(true, Ordering::AcqRel) {
            // A drain higher up the stack (or on another thread) will run
            // this job in order.
            return true;
        }
        loop {
            loop {
                let next = self.queue.lock().pop_front();
                match next {
                    Some(job) => job(),
                    None => break,
                }
            }
            self.draining.store(false, Ordering::Release);
            // A job accepted on another thread while the drain wound down
            // must not be stranded: re-arm and keep draining unless some
            // other caller already took over.
            if self.queue.lock().is_empty() || self.draining.swap(true, Ordering::AcqRel) {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_dispatcher_runs_scheduled_jobs() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            assert!(dispatcher.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        }
        assert!(dispatcher.stop(true));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_dispatcher_preserves_scheduling_order() {
        let dispatcher = Dispatcher::new(DispatcherConfig::named("order-test")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for value in 0..100 {
            let seen = seen.clone();
            assert!(dispatcher.schedule(Box::new(move || {
                seen.lock().push(value);
            })));
        }
        assert!(dispatcher.stop(true));
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_dispatcher_rejects_after_stop() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default()).unwrap();
        assert!(dispatcher.stop(true));
        assert!(!dispatcher.schedule(Box::new(|| {})));
        // stop stays idempotent
        assert!(dispatcher.stop(true));
        assert!(dispatcher.stop(false));
    }

    #[test]
    fn test_dispatcher_survives_panicking_job() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(dispatcher.schedule(Box::new(|| panic!("boom"))));
        let after = counter.clone();
        assert!(dispatcher.schedule(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        })));
        assert!(dispatcher.stop(true));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inline_loop_runs_immediately() {
        let inline = InlineLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = counter.clone();
        assert!(inline.schedule(Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inline_loop_defers_nested_schedules() {
        let inline = Arc::new(InlineLoop::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inline_inner = inline.clone();
        let seen_outer = seen.clone();
        let seen_inner = seen.clone();
        assert!(inline.schedule(Box::new(move || {
            seen_outer.lock().push("outer:begin");
            let seen_nested = seen_inner.clone();
            assert!(inline_inner.schedule(Box::new(move || {
                seen_nested.lock().push("nested");
            })));
            // the nested job must not have run yet
            seen_inner.lock().push("outer:end");
        })));

        assert_eq!(*seen.lock(), vec!["outer:begin", "outer:end", "nested"]);
    }

    #[test]
    fn test_inline_loop_runs_every_job_under_thread_contention() {
        let inline = Arc::new(InlineLoop::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs_per_thread = 1_000;

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let inline = inline.clone();
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..jobs_per_thread {
                        let counter = counter.clone();
                        assert!(inline.schedule(Box::new(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        // A job accepted while another thread's drain winds down must still
        // run before that drain returns.
        assert_eq!(counter.load(Ordering::SeqCst), 2 * jobs_per_thread);
    }
}
