//! Job entity: a set of tasks, finished iff every task is finished.

use super::task::{JobId, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tasks: Vec<TaskId>,
}

impl Job {
    pub fn new(id: JobId, tasks: Vec<TaskId>) -> Self {
        Self { id, tasks }
    }

    pub fn finished(&self, is_finished: impl Fn(TaskId) -> bool) -> bool {
        self.tasks.iter().all(|t| is_finished(*t))
    }
}
