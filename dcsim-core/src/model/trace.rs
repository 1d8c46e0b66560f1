//! Workload input: a `Trace` is a list of jobs, each a list of tasks with an
//! explicit dependency-id list. The core only consumes this structure —
//! producing it from a CSV/binary workload archive is an external parser's
//! job; this module still performs the validation a parser boundary needs,
//! since `Trace` is the only boundary the core actually exposes.

use super::dag::DependencyDag;
use super::job::Job;
use super::task::{JobId, OwnerId, Task, TaskId};
use crate::error::SimError;
use crate::time::Tick;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Wire-shaped task record, as an external parser would build it. Numeric
/// fields are signed so malformed input (negative flops/cores) is
/// representable and rejected by [`Trace::build`] rather than silently
/// wrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    pub owner_id: u64,
    pub priority: i64,
    pub flops: i64,
    pub cores: i32,
    pub input_size: i64,
    pub output_size: i64,
    pub submit_time: Tick,
    pub dependencies: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Trace {
    pub jobs: Vec<JobRecord>,
}

impl Trace {
    /// Validates the trace and lowers it into runtime [`Job`]/[`Task`]
    /// values plus the dependency DAG across the whole trace. Raises
    /// [`SimError::MalformedTrace`] for duplicate ids, missing dependencies,
    /// or negative flops/cores.
    pub fn build(&self) -> Result<(Vec<Job>, Vec<Task>, DependencyDag), SimError> {
        let mut seen_ids = HashSet::new();
        let mut tasks = Vec::new();
        let mut jobs = Vec::new();

        for job_record in &self.jobs {
            let job_id = JobId(job_record.id);
            let mut task_ids = Vec::with_capacity(job_record.tasks.len());

            for rec in &job_record.tasks {
                if !seen_ids.insert(rec.id) {
                    return Err(SimError::MalformedTrace(format!(
                        "duplicate task id {}",
                        rec.id
                    )));
                }
                if rec.flops < 0 {
                    return Err(SimError::MalformedTrace(format!(
                        "task {} has negative flops {}",
                        rec.id, rec.flops
                    )));
                }
                if rec.cores < 0 {
                    return Err(SimError::MalformedTrace(format!(
                        "task {} has negative cores {}",
                        rec.id, rec.cores
                    )));
                }
                if rec.input_size < 0 || rec.output_size < 0 {
                    return Err(SimError::MalformedTrace(format!(
                        "task {} has a negative size field",
                        rec.id
                    )));
                }

                let task_id = TaskId(rec.id);
                task_ids.push(task_id);
                tasks.push(Task::new(
                    task_id,
                    job_id,
                    OwnerId(rec.owner_id),
                    rec.priority,
                    rec.flops as u64,
                    rec.cores as u32,
                    rec.input_size as u64,
                    rec.output_size as u64,
                    rec.submit_time,
                    rec.dependencies.iter().map(|id| TaskId(*id)).collect(),
                ));
            }

            jobs.push(Job::new(job_id, task_ids));
        }

        // Missing-dependency and cross-job-dependency and cycle checks all
        // happen in one place inside DependencyDag::build.
        let dag = DependencyDag::build(&tasks)?;

        Ok((jobs, tasks, dag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u64, deps: Vec<u64>) -> TaskRecord {
        TaskRecord {
            id,
            owner_id: 1,
            priority: 0,
            flops: 1000,
            cores: 1,
            input_size: 0,
            output_size: 0,
            submit_time: 0,
            dependencies: deps,
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let trace = Trace {
            jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, vec![]), rec(1, vec![])] }],
        };
        assert!(matches!(trace.build(), Err(SimError::MalformedTrace(_))));
    }

    #[test]
    fn rejects_negative_flops() {
        let mut bad = rec(1, vec![]);
        bad.flops = -1;
        let trace = Trace { jobs: vec![JobRecord { id: 1, tasks: vec![bad] }] };
        assert!(matches!(trace.build(), Err(SimError::MalformedTrace(_))));
    }

    #[test]
    fn rejects_missing_dependency() {
        let trace = Trace { jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, vec![99])] }] };
        assert!(matches!(trace.build(), Err(SimError::MalformedTrace(_))));
    }

    #[test]
    fn builds_valid_trace() {
        let trace = Trace {
            jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, vec![]), rec(2, vec![1])] }],
        };
        let (jobs, tasks, dag) = trace.build().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(tasks.len(), 2);
        assert_eq!(dag.dependencies(TaskId(2)), vec![TaskId(1)]);
    }
}
