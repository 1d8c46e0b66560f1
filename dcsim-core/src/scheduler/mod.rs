//! The scheduler process: staged pipeline over queued tasks, bookkeeping of
//! which machine each pending task was sent to.

pub mod policy;
pub mod stage;

use crate::error::SimError;
use crate::kernel::event::Message;
use crate::kernel::process::{Context, Process, ProcessId};
use crate::metrics::{policy_failure_event, BusEvent};
use crate::model::dag::DependencyDag;
use crate::model::machine::{MachineDescriptor, MachineId};
use crate::model::task::{OwnerId, TaskHandle, TaskId};
use policy::PolicySet;
use stage::StageAccumulator;
use std::collections::{HashMap, HashSet};

/// The address a [`crate::machine::MachineProcess`] for `id` is spawned
/// under. Not part of the wire protocol: both the scheduler and whatever
/// spawns machine processes (`crate::experiment`) must agree on it.
pub fn machine_process_id(id: MachineId) -> ProcessId {
    ProcessId::new(format!("machine/{}", id.0))
}

pub struct SchedulerState {
    pub machines: HashMap<MachineId, MachineDescriptor>,
    pub machine_order: Vec<MachineId>,
    pub tasks: HashMap<TaskId, TaskHandle>,
    pub queued: Vec<TaskId>,
    pub pending: HashSet<TaskId>,
    pub machine_cores: HashMap<MachineId, u32>,
    pub task_machines: HashMap<TaskId, MachineId>,
    pub running_tasks_by_owner: HashMap<OwnerId, u64>,
    pub dag: DependencyDag,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            machines: HashMap::new(),
            machine_order: Vec::new(),
            tasks: HashMap::new(),
            queued: Vec::new(),
            pending: HashSet::new(),
            machine_cores: HashMap::new(),
            task_machines: HashMap::new(),
            running_tasks_by_owner: HashMap::new(),
            dag: DependencyDag::build(&[]).expect("empty task list is always acyclic"),
        }
    }

    /// Rebuilds the dependency DAG over every task the scheduler has ever
    /// seen. The DAG is shared read-only elsewhere and is rebuilt from
    /// scratch here rather than incrementally extended, since the
    /// `Schedule` message may introduce tasks whose dependencies were
    /// already present.
    fn rebuild_dag(&mut self) -> Result<(), SimError> {
        let snapshot: Vec<_> = self.tasks.values().map(|h| h.borrow().clone()).collect();
        self.dag = DependencyDag::build(&snapshot)?;
        Ok(())
    }
}

pub struct SchedulerProcess {
    state: SchedulerState,
    policies: PolicySet,
    bus: ProcessId,
    experiment: String,
    trace_name: String,
    next_stage_id: u64,
}

impl SchedulerProcess {
    pub fn new(policies: PolicySet, bus: ProcessId, experiment: impl Into<String>, trace_name: impl Into<String>) -> Self {
        Self {
            state: SchedulerState::new(),
            policies,
            bus,
            experiment: experiment.into(),
            trace_name: trace_name.into(),
            next_stage_id: 0,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    fn handle_resources(&mut self, registered: Vec<MachineDescriptor>, unregistered: Vec<MachineId>) {
        for m in registered {
            let id = m.id;
            if !self.state.machine_order.contains(&id) {
                self.state.machine_order.push(id);
            }
            self.state.machine_cores.insert(id, m.cores());
            self.state.machines.insert(id, m);
        }
        for id in unregistered {
            self.state.machines.remove(&id);
            self.state.machine_cores.remove(&id);
            self.state.machine_order.retain(|m| *m != id);
        }
    }

    fn handle_accept(&mut self, task_id: TaskId) {
        self.state.pending.remove(&task_id);
    }

    fn handle_decline(&mut self, task_id: TaskId) {
        self.state.pending.remove(&task_id);
        if let Some(machine_id) = self.state.task_machines.remove(&task_id) {
            if let Some(task) = self.state.tasks.get(&task_id) {
                let cores = task.borrow().cores;
                if let Some(available) = self.state.machine_cores.get_mut(&machine_id) {
                    *available += cores;
                }
                let owner = task.borrow().owner_id;
                if let Some(count) = self.state.running_tasks_by_owner.get_mut(&owner) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        self.state.queued.push(task_id);
    }

    fn run_tick(&mut self, ctx: &mut Context<'_>, new_tasks: Vec<TaskHandle>) -> Result<(), SimError> {
        let mut acc = StageAccumulator::start(&self.experiment, &self.trace_name, &self.policies.name, ctx.now(), self.next_stage_id);

        let outcome = self.try_run_tick(ctx, new_tasks, &mut acc);

        let (measurements, next_stage_id) = acc.end();
        self.next_stage_id = next_stage_id;
        for measurement in measurements {
            ctx.send(&self.bus, Message::Publish(BusEvent::StageMeasurement(measurement)), 0)?;
        }

        if let Err(err) = outcome {
            let event = policy_failure_event(ctx.self_id(), "scheduler-tick", err.to_string());
            ctx.send(&self.bus, Message::Publish(event), 0)?;
            tracing::warn!(process = %ctx.self_id(), error = %err, "scheduler tick aborted by a policy failure");
        }

        // A capacity-gated or declined task only gets another chance at
        // dispatch on a later `Schedule` tick (§4.F: C1 releases capacity
        // from tasks that finished since the last tick; R4/R5 re-run over
        // whatever remains in `queued`). Nothing else in this simulation
        // drives a steady stream of `Schedule` ticks once the initial batch
        // of arrivals has been delivered, so the scheduler keeps polling
        // itself once per tick for as long as there is outstanding work.
        if !self.state.queued.is_empty() || !self.state.pending.is_empty() {
            let self_id = ctx.self_id().clone();
            ctx.send(&self_id, Message::Schedule(Vec::new()), 1)?;
        }
        Ok(())
    }

    /// The staged pipeline proper: C1, T1, T2, then a per-task R4/R5 loop.
    /// A policy failure here aborts only this tick; bookkeeping already
    /// mutated (cache release, dispatches already sent) stands.
    fn try_run_tick(&mut self, ctx: &mut Context<'_>, new_tasks: Vec<TaskHandle>, acc: &mut StageAccumulator) -> anyhow::Result<()> {
        let new_count = new_tasks.len();
        let now = ctx.now();
        acc.run_stage("C1", new_count, || self.release_finished(new_tasks, now));
        self.state.rebuild_dag()?;

        if self.state.queued.is_empty() {
            return Ok(());
        }

        let queued_handles: Vec<TaskHandle> = self
            .state
            .queued
            .iter()
            .filter_map(|id| self.state.tasks.get(id).cloned())
            .collect();
        let eligible = acc.run_stage("T1", queued_handles.len(), || self.policies.eligibility.filter(&queued_handles, &self.state));

        let eligible_len = eligible.len();
        let sorted = acc.run_stage("T2", eligible_len, || self.policies.sort.sort(eligible, &self.state))?;

        for task in sorted {
            let candidates = acc.run_stage("R4", 1, || self.policies.machine_filter.filter(&task, &self.state));
            let candidate_len = candidates.len();
            let selection = acc.run_stage("R5", candidate_len, || self.policies.select.select(&task, &candidates, &self.state))?;

            if let Some(machine_id) = selection {
                self.dispatch(ctx, task, machine_id)?;
            }
        }
        Ok(())
    }

    fn release_finished(&mut self, new_tasks: Vec<TaskHandle>, now: crate::time::Tick) {
        for t in new_tasks {
            let id = t.borrow().id;
            t.borrow_mut().mark_queued(now);
            self.state.tasks.insert(id, t);
            self.state.queued.push(id);
        }

        let finished_ids: Vec<TaskId> = self
            .state
            .task_machines
            .keys()
            .copied()
            .filter(|id| self.state.tasks.get(id).map(|h| h.borrow().finished()).unwrap_or(false))
            .collect();

        for id in finished_ids {
            if let Some(machine_id) = self.state.task_machines.remove(&id) {
                if let Some(task) = self.state.tasks.get(&id) {
                    let cores = task.borrow().cores;
                    if let Some(available) = self.state.machine_cores.get_mut(&machine_id) {
                        *available += cores;
                    }
                    let owner = task.borrow().owner_id;
                    if let Some(count) = self.state.running_tasks_by_owner.get_mut(&owner) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, ctx: &mut Context<'_>, task: TaskHandle, machine_id: MachineId) -> anyhow::Result<()> {
        let task_id = task.borrow().id;
        let cores = task.borrow().cores;
        let owner = task.borrow().owner_id;

        let machine_pid = machine_process_id(machine_id);
        ctx.send(&machine_pid, Message::Task(task), 0)?;

        self.state.queued.retain(|id| *id != task_id);
        self.state.pending.insert(task_id);
        self.state.task_machines.insert(task_id, machine_id);
        if let Some(available) = self.state.machine_cores.get_mut(&machine_id) {
            *available = available.saturating_sub(cores);
        }
        *self.state.running_tasks_by_owner.entry(owner).or_insert(0) += 1;
        Ok(())
    }
}

impl Process for SchedulerProcess {
    fn handle(&mut self, ctx: &mut Context<'_>, _from: Option<ProcessId>, msg: Message) -> anyhow::Result<()> {
        match msg {
            Message::PreStart => {}
            Message::Schedule(new_tasks) => self.run_tick(ctx, new_tasks)?,
            Message::Resources { registered, unregistered } => self.handle_resources(registered, unregistered),
            Message::Accept(task_id) => self.handle_accept(task_id),
            Message::Decline(task_id) => self.handle_decline(task_id),
            other => {
                tracing::warn!(process = %ctx.self_id(), ?other, "scheduler ignoring unexpected message");
            }
        }
        Ok(())
    }
}
