//! Process runtime: a long-lived entity with a private mailbox, identified
//! by path.
//!
//! Two coroutine-shaped suspension primitives are common in this domain,
//! `receive` and `hold`. Rather than implement processes as true coroutines,
//! every process in this crate is an explicit state variable plus a
//! message-handler function: [`Process::handle`] is invoked once per
//! dispatch, and `hold(duration)` is expressed as `ctx.hold(duration)`, a
//! self-addressed `Message::Wake` scheduled via the kernel. This keeps
//! dispatch single-threaded and exact without needing a second,
//! process-local executor alongside the kernel's.

use crate::error::SimError;
use crate::kernel::event::Message;
use crate::time::Tick;
use std::fmt;
use std::sync::Arc;

/// A process's address. Processes are identified by path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(Arc<str>);

impl ProcessId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(Arc::from(path.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessId({})", self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The view a process gets of the kernel while handling one message. Scoped
/// to a single dispatch; a process must not retain it past `handle`.
pub struct Context<'a> {
    self_id: &'a ProcessId,
    now: Tick,
    pending: &'a mut Vec<(ProcessId, Option<ProcessId>, Tick, Message)>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        self_id: &'a ProcessId,
        now: Tick,
        pending: &'a mut Vec<(ProcessId, Option<ProcessId>, Tick, Message)>,
    ) -> Self {
        Self { self_id, now, pending }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn self_id(&self) -> &ProcessId {
        self.self_id
    }

    /// `self.send(msg, destination, delay)`: shorthand for `kernel.schedule`,
    /// queued for delivery after this dispatch returns so that within-tick
    /// ordering is governed entirely by the kernel's tiebreaker.
    pub fn send(&mut self, destination: &ProcessId, payload: Message, delay: i64) -> Result<(), SimError> {
        if delay < 0 {
            return Err(SimError::InvalidDelay { destination: destination.clone(), delay });
        }
        self.pending.push((
            destination.clone(),
            Some(self.self_id.clone()),
            self.now + delay as u64,
            payload,
        ));
        Ok(())
    }

    /// `hold(duration)`: suspend for exactly `duration` ticks, implemented
    /// as a self-directed wake-up.
    pub fn hold(&mut self, duration: u64) {
        let dest = self.self_id.clone();
        self.pending.push((dest.clone(), Some(dest), self.now + duration, Message::Wake));
    }
}

/// A process body: reacts to one message per dispatch. `PreStart` is
/// delivered before any other message, per `Kernel::spawn`.
pub trait Process {
    fn handle(&mut self, ctx: &mut Context<'_>, from: Option<ProcessId>, msg: Message) -> anyhow::Result<()>;
}
