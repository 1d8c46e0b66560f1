//! Experiment orchestration: wires a [`crate::model::trace::Trace`] and a
//! [`crate::model::topology::Topology`] into a [`Kernel`] with one
//! scheduler, one bus, and one machine process per machine, runs it to
//! completion, and collects the three metric streams.

use crate::error::SimError;
use crate::kernel::bus::EventBus;
use crate::kernel::event::Message;
use crate::kernel::process::ProcessId;
use crate::kernel::Kernel;
use crate::machine::MachineProcess;
use crate::metrics::{JobMetric, MetricsSink, TaskMetric};
use crate::model::job::Job;
use crate::model::task::{Task, TaskId};
use crate::model::topology::Topology;
use crate::model::trace::Trace;
use crate::scheduler::policy::PolicySet;
use crate::scheduler::{machine_process_id, SchedulerProcess};
use crate::time::Tick;

pub const BUS_ID: &str = "bus";
pub const SCHEDULER_ID: &str = "scheduler";

pub struct ExperimentConfig {
    pub name: String,
    pub scheduler_name: String,
    pub seed: u64,
    /// The tick budget handed to `Kernel::run`; exceeding it with work still
    /// pending is an `ExperimentAborted` outcome, not a crash.
    pub deadline: Tick,
}

/// Builds the kernel and every process, runs the whole trace to completion
/// (or until `deadline`), and reports metrics into `sink`.
pub fn run_experiment(trace: &Trace, trace_name: &str, topology: &Topology, config: &ExperimentConfig, sink: &mut dyn MetricsSink) -> Result<(), SimError> {
    let (jobs, tasks, _dag) = trace.build()?;

    let mut kernel = Kernel::new();
    let bus_id = ProcessId::new(BUS_ID);
    let scheduler_id = ProcessId::new(SCHEDULER_ID);

    kernel.spawn(bus_id.clone(), Box::new(EventBus::new()));

    let policies = PolicySet::from_name(&config.scheduler_name, config.seed)
        .map_err(|source| SimError::PolicyFailure { process: scheduler_id.clone(), policy: "from_name", source })?;
    kernel.spawn(
        scheduler_id.clone(),
        Box::new(SchedulerProcess::new(policies, bus_id.clone(), config.name.clone(), trace_name.to_string())),
    );

    let machines = topology.machines();
    for m in &machines {
        let pid = machine_process_id(m.id);
        kernel.spawn(pid, Box::new(MachineProcess::new(m.clone())));
    }

    kernel.schedule(&scheduler_id, Message::Resources { registered: machines, unregistered: vec![] }, 0)?;

    let handles: Vec<_> = tasks.into_iter().map(Task::into_handle).collect();
    kernel.schedule(&scheduler_id, Message::Schedule(handles.clone()), 0)?;

    match kernel.run(config.deadline) {
        Ok(()) => {}
        Err(SimError::Interrupted { .. }) => return Err(SimError::ExperimentAborted { until: config.deadline }),
        Err(other) => return Err(other),
    }

    if kernel.has_pending_work() {
        return Err(SimError::ExperimentAborted { until: config.deadline });
    }

    collect_metrics(&config.name, &config.scheduler_name, &jobs, &handles, sink);
    Ok(())
}

fn collect_metrics(experiment: &str, scheduler: &str, jobs: &[Job], tasks: &[crate::model::task::TaskHandle], sink: &mut dyn MetricsSink) {
    use std::collections::HashMap;

    let by_id: HashMap<TaskId, &crate::model::task::TaskHandle> = tasks.iter().map(|t| (t.borrow().id, t)).collect();

    let mut id_counter = 0u64;
    for task in tasks {
        let t = task.borrow();
        let times = t.times();
        let started = times.started_at.unwrap_or(t.submit_time);
        let finished = times.finished_at.unwrap_or(started);
        sink.record_task(TaskMetric {
            id: id_counter,
            experiment: experiment.to_string(),
            scheduler: scheduler.to_string(),
            waiting: started as i64 - t.submit_time as i64,
            execution: finished as i64 - started as i64,
            turnaround: finished as i64 - t.submit_time as i64,
            job_id: t.job_id,
            task_id: t.id,
        });
        id_counter += 1;
    }

    let mut job_id_counter = 0u64;
    for job in jobs {
        let job_tasks: Vec<_> = job.tasks.iter().filter_map(|id| by_id.get(id).copied()).collect();
        if job_tasks.is_empty() {
            continue;
        }
        let min_submit = job_tasks.iter().map(|t| t.borrow().submit_time).min().unwrap_or(0);
        let min_start = job_tasks
            .iter()
            .filter_map(|t| t.borrow().times().started_at)
            .min()
            .unwrap_or(min_submit);
        let max_finish = job_tasks
            .iter()
            .filter_map(|t| t.borrow().times().finished_at)
            .max()
            .unwrap_or(min_start);

        let (critical_path, critical_path_length) = longest_finish_chain(&job_tasks);
        let critical_path = critical_path.max(1);
        let makespan = max_finish as i64 - min_submit as i64;

        sink.record_job(JobMetric {
            id: job_id_counter,
            experiment: experiment.to_string(),
            scheduler: scheduler.to_string(),
            job_id: job.id,
            critical_path,
            critical_path_length,
            waiting_time: min_start as i64 - min_submit as i64,
            makespan,
            nsl: makespan / critical_path,
        });
        job_id_counter += 1;
    }
}

/// The longest finish-time chain through a job's tasks, by virtual-time
/// length and node count (`critical_path`/`critical_path_length`).
fn longest_finish_chain(tasks: &[&crate::model::task::TaskHandle]) -> (i64, u64) {
    let mut best: std::collections::HashMap<TaskId, (i64, u64)> = std::collections::HashMap::new();
    let mut order: Vec<_> = tasks.to_vec();
    order.sort_by_key(|t| t.borrow().times().finished_at.unwrap_or(0));

    for t in &order {
        let tb = t.borrow();
        let finish = tb.times().finished_at.unwrap_or(0) as i64;
        let best_pred = tb
            .dependencies
            .iter()
            .filter_map(|d| best.get(d))
            .max_by_key(|(len, _)| *len)
            .copied();
        let (len, count) = match best_pred {
            Some((pred_len, pred_count)) => (pred_len.max(0) + (finish - tb.times().started_at.unwrap_or(0) as i64).max(0), pred_count + 1),
            None => (finish - tb.submit_time as i64, 1),
        };
        best.insert(tb.id, (len, count));
    }

    best.values().copied().max_by_key(|(len, _)| *len).unwrap_or((0, 0))
}
