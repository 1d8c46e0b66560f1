//! Events: `(destination, deliveryTime, payload, tiebreaker)`.

use crate::kernel::process::ProcessId;
use crate::metrics::BusEvent;
use crate::model::machine::{MachineDescriptor, MachineId};
use crate::model::task::{TaskHandle, TaskId};
use crate::time::Tick;
use std::cmp::Ordering;

/// Opaque message payloads. This crate's three process kinds (machine,
/// scheduler, bus) share one payload type so the kernel can treat delivery
/// uniformly without dynamic typing.
#[derive(Debug, Clone)]
pub enum Message {
    /// Delivered before any other message to a newly spawned process.
    PreStart,
    /// Self-directed wake-up, the `hold(duration)` primitive.
    Wake,

    /// Scheduler -> machine: offer a task.
    Task(TaskHandle),
    /// Machine -> scheduler: task accepted.
    Accept(TaskId),
    /// Machine -> scheduler: task declined (insufficient cores).
    Decline(TaskId),
    /// Machine -> self: task finished executing.
    Done(TaskId),

    /// External -> scheduler: a scheduling tick.
    Schedule(Vec<TaskHandle>),
    /// External -> scheduler: fleet update.
    Resources { registered: Vec<MachineDescriptor>, unregistered: Vec<MachineId> },

    /// Process -> bus: register/deregister as a subscriber.
    Subscribe,
    Unsubscribe,
    /// Process -> bus: fan out `event` to every current subscriber.
    Publish(BusEvent),
}

/// A pending delivery. `tiebreaker` is a monotonically increasing insertion
/// sequence guaranteeing FIFO-within-tick delivery order.
#[derive(Debug, Clone)]
pub struct Event {
    pub destination: ProcessId,
    pub sender: Option<ProcessId>,
    pub delivery_time: Tick,
    pub payload: Message,
    pub tiebreaker: u64,
}

impl Event {
    fn key(&self) -> (Tick, u64) {
        (self.delivery_time, self.tiebreaker)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    /// Reversed so a `BinaryHeap<Event>` (a max-heap) pops the
    /// earliest-keyed event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}
