//! Task entity: immutable identity + mutable lifecycle.
//!
//! The scheduler and the machine a task is dispatched to both need to
//! observe and drive the same lifecycle state (the scheduler lazily
//! discovers completions by scanning for `finished` at the next tick's
//! cache-release stage, rather than through an explicit completion message)
//! — so a [`Task`] travels as a shared [`TaskHandle`], not by value, once it
//! enters the simulation proper. This mirrors "single-threaded kernel -> no
//! races": one heap object, mutated in place, never across threads.

use crate::time::Tick;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// The lifecycle phase of a [`Task`]. Transitions form the chain
/// `Underway -> Queued -> Running -> Finished`; no skips, no reversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPhase {
    Underway,
    Queued,
    Running,
    Finished,
}

/// Timestamps collected as a task moves through its lifecycle. Each field is
/// populated exactly once, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTimes {
    pub queued_at: Option<Tick>,
    pub started_at: Option<Tick>,
    pub finished_at: Option<Tick>,
}

/// A unit of work within a [`crate::model::job::Job`].
///
/// Identity fields (`id`, `owner_id`, `priority`, `flops`, `cores`,
/// `input_size`, `output_size`, `submit_time`, `dependencies`) never change
/// after construction. `remaining` and `phase`/`times` are the mutable
/// lifecycle state, touched only by [`Task::consume`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub priority: i64,
    pub flops: u64,
    pub cores: u32,
    pub input_size: u64,
    pub output_size: u64,
    pub submit_time: Tick,
    pub dependencies: Vec<TaskId>,

    remaining: u64,
    phase: TaskPhase,
    times: TaskTimes,
}

impl Task {
    pub fn new(
        id: TaskId,
        job_id: JobId,
        owner_id: OwnerId,
        priority: i64,
        flops: u64,
        cores: u32,
        input_size: u64,
        output_size: u64,
        submit_time: Tick,
        dependencies: Vec<TaskId>,
    ) -> Self {
        Self {
            id,
            job_id,
            owner_id,
            priority,
            flops,
            cores,
            input_size,
            output_size,
            submit_time,
            dependencies,
            remaining: flops,
            phase: TaskPhase::Underway,
            times: TaskTimes::default(),
        }
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn times(&self) -> TaskTimes {
        self.times
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn finished(&self) -> bool {
        self.phase == TaskPhase::Finished
    }

    /// `Underway -> Queued`.
    pub fn mark_queued(&mut self, now: Tick) {
        debug_assert_eq!(self.phase, TaskPhase::Underway, "double-queue of {}", self.id);
        self.phase = TaskPhase::Queued;
        self.times.queued_at = Some(now);
    }

    /// Called by the owning machine process: `t.consume(now, 0)` on
    /// acceptance (`Queued -> Running`), `t.consume(now, t.remaining)` on
    /// completion (`Running -> Finished`).
    pub fn consume(&mut self, now: Tick, amount: u64) {
        if amount == 0 {
            debug_assert_eq!(self.phase, TaskPhase::Queued, "{} not queued", self.id);
            self.phase = TaskPhase::Running;
            self.times.started_at = Some(now);
        } else {
            debug_assert_eq!(self.phase, TaskPhase::Running, "{} not running", self.id);
            self.remaining = self.remaining.saturating_sub(amount);
            self.phase = TaskPhase::Finished;
            self.times.finished_at = Some(now);
        }
    }

    /// `ready ⇔ ∀ d ∈ dependencies : d.finished`.
    pub fn ready(&self, is_finished: impl Fn(TaskId) -> bool) -> bool {
        self.dependencies.iter().all(|d| is_finished(*d))
    }

    pub fn into_handle(self) -> TaskHandle {
        Rc::new(RefCell::new(self))
    }
}

/// A shared, interior-mutable handle to a [`Task`]. See the module docs for
/// why this is shared rather than copied across the scheduler/machine
/// boundary.
pub type TaskHandle = Rc<RefCell<Task>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId(1), JobId(1), OwnerId(1), 0, 4000, 1, 0, 0, 0, vec![])
    }

    #[test]
    fn lifecycle_chain_has_no_skips() {
        let mut t = task();
        assert_eq!(t.phase(), TaskPhase::Underway);
        t.mark_queued(0);
        assert_eq!(t.phase(), TaskPhase::Queued);
        t.consume(1, 0);
        assert_eq!(t.phase(), TaskPhase::Running);
        t.consume(5, t.remaining());
        assert_eq!(t.phase(), TaskPhase::Finished);
        assert!(t.finished());
        assert_eq!(t.remaining(), 0);
    }

    #[test]
    fn ready_iff_dependencies_finished() {
        let mut a = task();
        let mut b = Task::new(TaskId(2), JobId(1), OwnerId(1), 0, 10, 1, 0, 0, 0, vec![TaskId(1)]);
        assert!(!b.ready(|id| id == TaskId(1) && a.finished()));
        a.mark_queued(0);
        a.consume(0, 0);
        a.consume(1, a.remaining());
        assert!(b.ready(|id| id == TaskId(1) && a.finished()));
        b.mark_queued(1);
    }
}
