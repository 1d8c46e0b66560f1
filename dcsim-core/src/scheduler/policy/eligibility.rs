use super::TaskEligibilityPolicy;
use crate::model::task::TaskHandle;
use crate::scheduler::SchedulerState;

/// Keeps `t.ready` tasks only: every dependency is `Finished`.
pub struct DefaultEligibility;

impl TaskEligibilityPolicy for DefaultEligibility {
    fn filter(&self, queued: &[TaskHandle], state: &SchedulerState) -> Vec<TaskHandle> {
        queued
            .iter()
            .filter(|t| {
                t.borrow().ready(|dep| {
                    state.tasks.get(&dep).map(|h| h.borrow().finished()).unwrap_or(false)
                })
            })
            .cloned()
            .collect()
    }
}
