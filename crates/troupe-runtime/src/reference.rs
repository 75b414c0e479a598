//! Actor references
//!
//! A [`Reference`] is the only externally visible handle to an actor. It
//! owns the actor, its mailbox, and its lifecycle state machine:
//! `Running ⇄ Paused`, both terminating in `Stopped`. Every message
//! travels as an envelope through a [`BufferedMessenger`] whose transport
//! schedules processing jobs on the reference's assigned dispatch loop,
//! so the actor only ever runs there, one envelope at a time. Self-sends
//! take the same path and re-enter through the scheduler queue, never the
//! call stack.

use crate::actor::{Actor, Lifecycle};
use crate::dispatcher::DispatchLoop;
use crate::executor::{Submission, Task};
use crate::messenger::BufferedMessenger;
use crate::system::{System, SystemState};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, error};
use troupe_core::channel::{Channel, Delivery};
use troupe_core::error::{Error, Result};
use troupe_core::send::send_with_retries;

/// Everything a reference ever puts on the wire to its own actor.
pub(crate) enum Envelope<M> {
    /// Fires `post_start`; queued ahead of any buffered user message.
    Start,
    /// One user message for `on_message`.
    User(M),
    /// Fires `pre_stop`; queued behind every message sent before the stop.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefState {
    Running,
    Paused,
    Stopped,
}

struct Control<M: Send + 'static> {
    state: RefState,
    channel: Option<Arc<dyn Channel<Envelope<M>>>>,
    submission: Option<Submission>,
}

/// Object-safe view of an [`Actor`], so the reference can erase the
/// concrete actor type and carry only the message type.
trait ActorObject<M: Send + 'static>: Send {
    fn post_start(&mut self, system: &System, self_ref: &Reference<M>);
    fn on_message(&mut self, system: &System, message: M);
    fn pre_stop(&mut self, system: &System);
}

impl<A: Actor> ActorObject<A::Message> for A {
    fn post_start(&mut self, system: &System, self_ref: &Reference<A::Message>) {
        Actor::post_start(self, system, self_ref);
    }

    fn on_message(&mut self, system: &System, message: A::Message) {
        Actor::on_message(self, system, message);
    }

    fn pre_stop(&mut self, system: &System) {
        Actor::pre_stop(self, system);
    }
}

struct Cell<M: Send + 'static> {
    actor: Box<dyn ActorObject<M>>,
    lifecycle: Lifecycle,
}

pub(crate) struct ReferenceState<M: Send + 'static> {
    name: String,
    system: Weak<SystemState>,
    mailbox: BufferedMessenger<Envelope<M>>,
    // Locked only while an envelope is being processed; the dispatch loop
    // serializes processing, so this lock is never contended reentrantly.
    cell: Mutex<Cell<M>>,
    control: Mutex<Control<M>>,
}

/// Transport behind the mailbox while attached: every envelope becomes a
/// processing job on the assigned dispatch loop.
struct LoopChannel<M: Send + 'static> {
    state: Weak<ReferenceState<M>>,
    handle: Arc<dyn DispatchLoop>,
}

impl<M: Send + 'static> Channel<Envelope<M>> for LoopChannel<M> {
    fn send(&self, envelope: Envelope<M>) -> Delivery<Envelope<M>> {
        let state = match self.state.upgrade() {
            Some(state) => state,
            None => return Delivery::Error,
        };
        let job = Box::new(move || state.process(envelope));
        if self.handle.schedule(job) {
            Delivery::Success
        } else {
            // the loop is gone; this envelope cannot be delivered, ever
            Delivery::Error
        }
    }

    fn stop(&self, _immediately: bool) -> bool {
        true
    }
}

/// The schedulable face of a reference, handed to the executor.
pub(crate) struct DispatchTask<M: Send + 'static>(Arc<ReferenceState<M>>);

impl<M: Send + 'static> Task for DispatchTask<M> {
    fn attach(&self, handle: Arc<dyn DispatchLoop>) -> bool {
        self.0.attach(handle)
    }

    fn detach(&self) -> bool {
        self.0.detach()
    }

    fn stop(&self) -> bool {
        self.0.stop()
    }
}

/// External handle to one actor. Cheap to clone; all clones address the
/// same actor.
pub struct Reference<M: Send + 'static> {
    state: Arc<ReferenceState<M>>,
}

impl<M: Send + 'static> Clone for Reference<M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<M: Send + 'static> Reference<M> {
    pub(crate) fn new<A: Actor<Message = M>>(
        name: String,
        system: Weak<SystemState>,
        actor: A,
    ) -> Self {
        Self {
            state: Arc::new(ReferenceState {
                name,
                system,
                mailbox: BufferedMessenger::new(),
                cell: Mutex::new(Cell {
                    actor: Box::new(actor),
                    lifecycle: Lifecycle::New,
                }),
                control: Mutex::new(Control {
                    state: RefState::Running,
                    channel: None,
                    submission: None,
                }),
            }),
        }
    }

    pub(crate) fn task(&self) -> Arc<dyn Task> {
        Arc::new(DispatchTask(self.state.clone()))
    }

    pub(crate) fn bind_submission(&self, submission: Submission) {
        self.state.control.lock().submission = Some(submission);
    }

    pub(crate) fn resume(&self) -> Result<()> {
        self.state.resume()
    }

    /// The name this reference was registered under.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Queue one message for the actor. While paused the message buffers;
    /// while running it is handed to the dispatch loop. Never invokes the
    /// actor on the calling thread.
    pub fn tell(&self, message: M) -> Result<()> {
        self.state.check_not_stopped()?;
        match self.state.mailbox.send(Envelope::User(message)) {
            Delivery::Success => Ok(()),
            Delivery::Failure(_) | Delivery::Error => {
                Err(Error::task_rejected("dispatch loop rejected the message"))
            }
        }
    }

    /// Like [`tell`](Self::tell), but pushes the message through the
    /// reliable-delivery layer with the process-wide retry budget.
    /// `Ok(false)` reports a message given up on after exhausting retries.
    pub fn send(&self, message: M) -> Result<bool> {
        self.state.check_not_stopped()?;
        Ok(send_with_retries(
            &self.state.mailbox,
            Envelope::User(message),
        ))
    }

    /// Detach the mailbox so new messages buffer instead of reaching the
    /// actor. Idempotent while not stopped. No callback fires.
    pub fn pause(&self) -> Result<()> {
        self.state.pause()
    }

    /// Stop the actor: deliver everything buffered before this call, then
    /// fire `pre_stop` exactly once, then release the executor submission.
    /// Idempotent; stopping an already stopped reference reports success
    /// and does nothing.
    pub fn stop(&self) -> bool {
        self.state.stop()
    }

    /// Whether the reference has entered its terminal state.
    pub fn is_stopped(&self) -> bool {
        self.state.control.lock().state == RefState::Stopped
    }
}

impl<M: Send + 'static> ReferenceState<M> {
    fn check_not_stopped(&self) -> Result<()> {
        if self.control.lock().state == RefState::Stopped {
            return Err(Error::reference_stopped(self.name.as_str()));
        }
        Ok(())
    }

    fn attach(self: &Arc<Self>, handle: Arc<dyn DispatchLoop>) -> bool {
        let channel: Arc<dyn Channel<Envelope<M>>> = Arc::new(LoopChannel {
            state: Arc::downgrade(self),
            handle,
        });
        let paused = {
            let mut control = self.control.lock();
            if control.state == RefState::Stopped {
                return false;
            }
            control.channel = Some(channel.clone());
            control.state == RefState::Paused
        };
        // The start marker goes straight to the loop, ahead of the mailbox
        // flush, so post_start precedes every buffered message.
        if !channel.send(Envelope::Start).is_success() {
            return false;
        }
        if !paused {
            self.mailbox.attach(channel);
        }
        true
    }

    fn detach(&self) -> bool {
        self.mailbox.detach();
        self.control.lock().channel.take().is_some()
    }

    fn pause(&self) -> Result<()> {
        {
            let mut control = self.control.lock();
            match control.state {
                RefState::Stopped => return Err(Error::reference_stopped(self.name.as_str())),
                RefState::Paused => return Ok(()),
                RefState::Running => control.state = RefState::Paused,
            }
        }
        self.mailbox.detach();
        debug!(name = %self.name, "reference paused");
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        let channel = {
            let mut control = self.control.lock();
            match control.state {
                RefState::Stopped => return Err(Error::reference_stopped(self.name.as_str())),
                RefState::Running => return Ok(()),
                RefState::Paused => {
                    control.state = RefState::Running;
                    control.channel.clone()
                }
            }
        };
        // Flushing may run work inline, so the control lock is released
        // before the mailbox re-attaches.
        if let Some(channel) = channel {
            self.mailbox.attach(channel);
        }
        debug!(name = %self.name, "reference resumed");
        Ok(())
    }

    fn stop(self: &Arc<Self>) -> bool {
        let (channel, submission, was_paused) = {
            let mut control = self.control.lock();
            if control.state == RefState::Stopped {
                return true;
            }
            let was_paused = control.state == RefState::Paused;
            control.state = RefState::Stopped;
            (control.channel.clone(), control.submission.take(), was_paused)
        };
        debug!(name = %self.name, "stopping reference");

        match channel {
            Some(channel) => {
                if was_paused {
                    // deliver everything buffered before the stop, in order
                    self.mailbox.attach(channel.clone());
                }
                if !send_with_retries(channel.as_ref(), Envelope::Stop) {
                    error!(name = %self.name, "stop marker undeliverable, stopping in place");
                    self.process(Envelope::Stop);
                }
                self.mailbox.detach();
            }
            // never attached to a loop; stop in place
            None => self.process(Envelope::Stop),
        }

        match submission {
            Some(submission) => submission.stop(),
            None => true,
        }
    }

    /// Deliver one envelope to the actor. Runs only on the assigned
    /// dispatch loop.
    fn process(self: &Arc<Self>, envelope: Envelope<M>) {
        let system_state = match self.system.upgrade() {
            Some(system_state) => system_state,
            None => {
                error!(name = %self.name, "envelope dropped, system is gone");
                return;
            }
        };
        let system = System::from_state(system_state);
        let mut cell = self.cell.lock();
        match envelope {
            Envelope::Start => {
                if cell.lifecycle != Lifecycle::New {
                    debug_assert!(false, "start marker reached a started actor");
                    error!(
                        name = %self.name,
                        lifecycle = cell.lifecycle.as_str(),
                        "start marker reached a started actor"
                    );
                    return;
                }
                cell.lifecycle = Lifecycle::Started;
                let self_ref = Reference {
                    state: self.clone(),
                };
                debug!(name = %self.name, "actor started");
                cell.actor.post_start(&system, &self_ref);
            }
            Envelope::User(message) => {
                if cell.lifecycle != Lifecycle::Started {
                    debug_assert!(false, "message reached a non-started actor");
                    error!(
                        name = %self.name,
                        lifecycle = cell.lifecycle.as_str(),
                        "message reached a non-started actor"
                    );
                    return;
                }
                cell.actor.on_message(&system, message);
            }
            Envelope::Stop => {
                if cell.lifecycle == Lifecycle::Started {
                    cell.actor.pre_stop(&system);
                }
                cell.lifecycle = Lifecycle::Stopped;
                debug!(name = %self.name, "actor stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use crate::system::System;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Log {
        post_start_count: usize,
        messages: Vec<u32>,
        pre_stop_count: usize,
    }

    struct RecordingActor {
        log: Arc<StdMutex<Log>>,
    }

    impl RecordingActor {
        fn new() -> (Self, Arc<StdMutex<Log>>) {
            let log = Arc::new(StdMutex::new(Log::default()));
            (Self { log: log.clone() }, log)
        }
    }

    impl Actor for RecordingActor {
        type Message = u32;

        fn post_start(&mut self, _system: &System, _self_ref: &Reference<u32>) {
            self.log.lock().unwrap().post_start_count += 1;
        }

        fn on_message(&mut self, _system: &System, message: u32) {
            self.log.lock().unwrap().messages.push(message);
        }

        fn pre_stop(&mut self, _system: &System) {
            self.log.lock().unwrap().pre_stop_count += 1;
        }
    }

    fn inline_system() -> System {
        System::new(InlineExecutor::new())
    }

    #[test]
    fn test_post_start_fires_once_on_registration() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let _reference = system.with("recorder", actor).unwrap();
        assert_eq!(log.lock().unwrap().post_start_count, 1);
        assert!(log.lock().unwrap().messages.is_empty());
    }

    #[test]
    fn test_tell_delivers_message() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        let expected: u32 = rand::random();
        reference.tell(expected).unwrap();
        assert_eq!(log.lock().unwrap().messages, vec![expected]);
    }

    #[test]
    fn test_send_reports_delivery() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        assert!(reference.send(42).unwrap());
        assert_eq!(log.lock().unwrap().messages, vec![42]);
    }

    #[test]
    fn test_pause_fires_no_callback() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        reference.pause().unwrap();
        assert!(!reference.is_stopped());
        assert_eq!(log.lock().unwrap().post_start_count, 1);
        assert_eq!(log.lock().unwrap().pre_stop_count, 0);
    }

    #[test]
    fn test_tell_while_paused_buffers() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        reference.pause().unwrap();
        reference.tell(7).unwrap();
        assert!(log.lock().unwrap().messages.is_empty());
    }

    #[test]
    fn test_pause_is_idempotent() {
        let system = inline_system();
        let (actor, _log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        reference.pause().unwrap();
        reference.pause().unwrap();
    }

    #[test]
    fn test_stop_fires_pre_stop_once() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        assert!(reference.stop());
        assert!(reference.is_stopped());
        let log = log.lock().unwrap();
        assert_eq!(log.post_start_count, 1);
        assert_eq!(log.pre_stop_count, 1);
    }

    #[test]
    fn test_double_stop_is_idempotent() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        assert!(reference.stop());
        assert!(reference.stop());
        assert!(reference.is_stopped());
        assert_eq!(log.lock().unwrap().pre_stop_count, 1);
    }

    #[test]
    fn test_pause_after_stop_fails() {
        let system = inline_system();
        let (actor, _log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        assert!(reference.stop());
        let denied = reference.pause().unwrap_err();
        assert!(denied.is_invalid_state());
    }

    #[test]
    fn test_stop_after_pause_succeeds() {
        let system = inline_system();
        let (actor, _log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        reference.pause().unwrap();
        assert!(reference.stop());
        assert!(reference.is_stopped());
    }

    #[test]
    fn test_message_buffered_before_stop_is_delivered() {
        let system = inline_system();
        let (actor, log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        reference.pause().unwrap();
        reference.tell(7).unwrap();
        assert!(reference.stop());
        let log = log.lock().unwrap();
        assert_eq!(log.messages, vec![7]);
        assert_eq!(log.pre_stop_count, 1);
    }

    #[test]
    fn test_tell_after_stop_fails() {
        let system = inline_system();
        let (actor, _log) = RecordingActor::new();
        let reference = system.with("recorder", actor).unwrap();
        assert!(reference.stop());
        assert!(reference.tell(1).unwrap_err().is_invalid_state());
        assert!(reference.send(1).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_self_send_goes_through_the_queue() {
        struct Countdown {
            self_ref: Option<Reference<u32>>,
            seen: Arc<StdMutex<Vec<u32>>>,
        }

        impl Actor for Countdown {
            type Message = u32;

            fn post_start(&mut self, _system: &System, self_ref: &Reference<u32>) {
                self.self_ref = Some(self_ref.clone());
            }

            fn on_message(&mut self, _system: &System, value: u32) {
                self.seen.lock().unwrap().push(value);
                if value > 0 {
                    self.self_ref
                        .as_ref()
                        .expect("post_start ran first")
                        .tell(value - 1)
                        .unwrap();
                }
            }
        }

        let system = inline_system();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let reference = system
            .with(
                "countdown",
                Countdown {
                    self_ref: None,
                    seen: seen.clone(),
                },
            )
            .unwrap();

        // A direct-call cycle would deliver 0 before this tell returns by
        // recursing; the queue delivers 1 first, then 0.
        reference.tell(1).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }
}
