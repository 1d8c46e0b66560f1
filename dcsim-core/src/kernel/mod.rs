//! The kernel: owns virtual time, the event queue, and the process
//! registry; dispatches deliveries to processes.

pub mod bus;
pub mod event;
pub mod process;
pub mod queue;

use crate::error::SimError;
use crate::time::Tick;
use event::{Event, Message};
use process::{Context, Process, ProcessId};
use queue::EventQueue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Kernel {
    now: Tick,
    queue: EventQueue,
    processes: HashMap<ProcessId, Box<dyn Process>>,
    interrupt: Arc<AtomicBool>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            now: 0,
            queue: EventQueue::new(),
            processes: HashMap::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// A handle an external (host-thread) caller can use to interrupt a
    /// running `run(until)`.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Registers a process and enqueues its `PreStart` signal at `now`, so
    /// its startup code runs before any other message reaches it.
    pub fn spawn(&mut self, id: ProcessId, process: Box<dyn Process>) {
        self.processes.insert(id.clone(), process);
        self.push_event(id, None, self.now, Message::PreStart);
    }

    /// Deregisters a process; subsequent messages to it are silently
    /// dropped.
    pub fn stop(&mut self, id: &ProcessId) -> Result<(), SimError> {
        if self.processes.remove(id).is_none() {
            return Err(SimError::IllegalProcessState {
                process: id.clone(),
                reason: "stop on an unregistered or already-terminated process".to_string(),
            });
        }
        Ok(())
    }

    /// `schedule(destination, payload, delay)`, for purely external
    /// scheduling (no sender process of record).
    pub fn schedule(&mut self, destination: &ProcessId, payload: Message, delay: i64) -> Result<(), SimError> {
        self.schedule_from(None, destination, payload, delay)
    }

    /// Same as [`Kernel::schedule`] but records `sender` as the delivering
    /// process, for callers (tests, experiment setup) that need the
    /// recipient to see a specific sender without going through a live
    /// process's [`Context::send`].
    pub fn schedule_from(
        &mut self,
        sender: Option<ProcessId>,
        destination: &ProcessId,
        payload: Message,
        delay: i64,
    ) -> Result<(), SimError> {
        if delay < 0 {
            return Err(SimError::InvalidDelay { destination: destination.clone(), delay });
        }
        self.push_event(destination.clone(), sender, self.now + delay as u64, payload);
        Ok(())
    }

    fn push_event(&mut self, destination: ProcessId, sender: Option<ProcessId>, delivery_time: Tick, payload: Message) {
        let tiebreaker = self.queue.next_tiebreaker();
        self.queue.push(Event { destination, sender, delivery_time, payload, tiebreaker });
    }

    /// Pops the earliest event, advances `now` (never backwards), dispatches
    /// it, and returns whether the queue was non-empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(event) = self.queue.pop() else {
            return Ok(false);
        };
        debug_assert!(event.delivery_time >= self.now, "time moved backwards");
        self.now = event.delivery_time;
        self.dispatch(event)?;
        Ok(true)
    }

    fn dispatch(&mut self, event: Event) -> Result<(), SimError> {
        let Event { destination, sender, payload, .. } = event;
        let Some(mut process) = self.processes.remove(&destination) else {
            tracing::debug!(process = %destination, "dropping message to unknown destination");
            return Ok(());
        };

        let mut pending = Vec::new();
        let now = self.now;
        let outcome = {
            let mut ctx = Context::new(&destination, now, &mut pending);
            process.handle(&mut ctx, sender, payload)
        };

        match outcome {
            Ok(()) => {
                self.processes.insert(destination, process);
            }
            Err(source) => {
                // An uncaught exception terminates only this process; the
                // kernel continues.
                tracing::error!(process = %destination, error = %source, "process crashed, terminating it");
            }
        }

        for (dest, snd, time, payload) in pending {
            self.push_event(dest, snd, time, payload);
        }
        Ok(())
    }

    /// Repeatedly steps while the next event's `deliveryTime <= until` and
    /// no external interrupt is set; then sets `now = max(now, until)`.
    /// Never rewinds time.
    pub fn run(&mut self, until: Tick) -> Result<(), SimError> {
        loop {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                return Err(SimError::Interrupted { now: self.now });
            }
            match self.queue.peek() {
                Some(event) if event.delivery_time <= until => {
                    self.step()?;
                }
                _ => break,
            }
        }
        self.now = self.now.max(until);
        Ok(())
    }

    /// Whether the queue still holds pending deliveries, used by the
    /// experiment runner to detect `ExperimentAborted`.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event::Message;

    struct Echo;
    impl Process for Echo {
        fn handle(&mut self, _ctx: &mut Context<'_>, _from: Option<ProcessId>, _msg: Message) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn time_never_decreases() {
        let mut k = Kernel::new();
        let id = ProcessId::new("p");
        k.spawn(id.clone(), Box::new(Echo));
        k.schedule(&id, Message::Wake, 10).unwrap();
        k.schedule(&id, Message::Wake, 3).unwrap();
        let mut last = 0;
        while k.step().unwrap() {
            assert!(k.now() >= last);
            last = k.now();
        }
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut k = Kernel::new();
        let id = ProcessId::new("p");
        k.spawn(id.clone(), Box::new(Echo));
        assert!(matches!(k.schedule(&id, Message::Wake, -1), Err(SimError::InvalidDelay { .. })));
    }

    #[test]
    fn unknown_destination_is_silently_dropped() {
        let mut k = Kernel::new();
        let ghost = ProcessId::new("ghost");
        k.schedule(&ghost, Message::Wake, 0).unwrap();
        assert!(k.step().unwrap());
        assert!(!k.step().unwrap());
    }

    #[test]
    fn stop_on_unregistered_process_is_illegal_state() {
        let mut k = Kernel::new();
        let id = ProcessId::new("p");
        assert!(matches!(k.stop(&id), Err(SimError::IllegalProcessState { .. })));
    }

    struct Crasher;
    impl Process for Crasher {
        fn handle(&mut self, _ctx: &mut Context<'_>, _from: Option<ProcessId>, _msg: Message) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    #[test]
    fn process_crash_does_not_stop_the_kernel() {
        let mut k = Kernel::new();
        let crasher = ProcessId::new("crasher");
        let survivor = ProcessId::new("survivor");
        k.spawn(crasher.clone(), Box::new(Crasher));
        k.spawn(survivor.clone(), Box::new(Echo));
        k.schedule(&survivor, Message::Wake, 5).unwrap();
        // PreStart to crasher will fail; kernel must keep running.
        k.run(10).unwrap();
        assert_eq!(k.now(), 10);
    }
}
