//! Output record types. The core only defines these shapes and a
//! [`MetricsSink`] seam; writing them to CSV files is an external concern
//! left to the enclosing program.

use crate::kernel::process::ProcessId;
use crate::model::task::{JobId, TaskId};
use crate::time::Tick;
use serde::{Deserialize, Serialize};

/// `(stage_id, time, cpu_ns, wall_ns, input_size, iterations)`.
///
/// `stage` is `String`, not `&'static str`: the derived `Deserialize` impl
/// has no bound tying its lifetime parameter to `'static`, so a borrowed
/// field can't round-trip through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMeasurement {
    pub id: u64,
    pub experiment: String,
    pub trace: String,
    pub scheduler: String,
    pub stage: String,
    pub tick: Tick,
    pub cpu_ns: u128,
    pub wall_ns: u128,
    pub size: usize,
    pub iterations: u64,
}

/// `waiting = startTime - submitTime`, `execution = finishTime - startTime`,
/// `turnaround = finishTime - submitTime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetric {
    pub id: u64,
    pub experiment: String,
    pub scheduler: String,
    pub waiting: i64,
    pub execution: i64,
    pub turnaround: i64,
    pub job_id: JobId,
    pub task_id: TaskId,
}

/// Per-job aggregate metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetric {
    pub id: u64,
    pub experiment: String,
    pub scheduler: String,
    pub job_id: JobId,
    pub critical_path: i64,
    pub critical_path_length: u64,
    pub waiting_time: i64,
    pub makespan: i64,
    pub nsl: i64,
}

/// Events published on the scheduler's bus. The bus itself is
/// payload-agnostic; this is simply the set of events this crate's
/// processes actually publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusEvent {
    StageMeasurement(StageMeasurement),
    PolicyFailure { process: String, policy: String, message: String },
}

/// Where produced metrics go. A demo/test sink can just collect them; a real
/// deployment would adapt this to its CSV/metrics exporter.
pub trait MetricsSink {
    fn record_stage(&mut self, measurement: StageMeasurement);
    fn record_task(&mut self, metric: TaskMetric);
    fn record_job(&mut self, metric: JobMetric);
}

/// An in-memory [`MetricsSink`], used by tests and by the CLI before it
/// prints/serializes results.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pub stages: Vec<StageMeasurement>,
    pub tasks: Vec<TaskMetric>,
    pub jobs: Vec<JobMetric>,
}

impl MetricsSink for InMemorySink {
    fn record_stage(&mut self, measurement: StageMeasurement) {
        self.stages.push(measurement);
    }
    fn record_task(&mut self, metric: TaskMetric) {
        self.tasks.push(metric);
    }
    fn record_job(&mut self, metric: JobMetric) {
        self.jobs.push(metric);
    }
}

pub(crate) fn policy_failure_event(process: &ProcessId, policy: &'static str, message: String) -> BusEvent {
    BusEvent::PolicyFailure { process: process.to_string(), policy: policy.to_string(), message }
}
