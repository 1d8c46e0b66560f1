//! Task sort policies.

use super::rank::{downward_ranks, upward_ranks};
use super::TaskSortPolicy;
use crate::model::task::{OwnerId, TaskHandle, TaskId};
use crate::scheduler::SchedulerState;
use anyhow::Result;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};

/// Identity order.
pub struct FifoSort;
impl TaskSortPolicy for FifoSort {
    fn sort(&mut self, eligible: Vec<TaskHandle>, _state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        Ok(eligible)
    }
}

/// `remaining` ascending, stable.
pub struct SrtfSort;
impl TaskSortPolicy for SrtfSort {
    fn sort(&mut self, mut eligible: Vec<TaskHandle>, _state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        eligible.sort_by_key(|t| t.borrow().remaining());
        Ok(eligible)
    }
}

/// Seeded Fisher-Yates shuffle.
pub struct RandomSort {
    rng: ChaCha8Rng,
}
impl RandomSort {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}
impl TaskSortPolicy for RandomSort {
    fn sort(&mut self, mut eligible: Vec<TaskHandle>, _state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        eligible.shuffle(&mut self.rng);
        Ok(eligible)
    }
}

/// Upward rank descending (HEFT).
pub struct HeftSort;
impl TaskSortPolicy for HeftSort {
    fn sort(&mut self, eligible: Vec<TaskHandle>, state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        let machines: Vec<_> = state.machines.values().cloned().collect();
        let ranks = upward_ranks(&state.tasks, &state.dag, &machines);
        Ok(sort_desc_by_rank(eligible, &ranks))
    }
}

/// `upwardRank + downwardRank` descending (CPOP).
pub struct CpopSort;
impl TaskSortPolicy for CpopSort {
    fn sort(&mut self, eligible: Vec<TaskHandle>, state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        let machines: Vec<_> = state.machines.values().cloned().collect();
        let up = upward_ranks(&state.tasks, &state.dag, &machines);
        let down = downward_ranks(&state.tasks, &state.dag, &machines);
        let combined: HashMap<TaskId, i64> = up
            .into_iter()
            .map(|(id, u)| (id, u + down.get(&id).copied().unwrap_or(0)))
            .collect();
        Ok(sort_desc_by_rank(eligible, &combined))
    }
}

fn sort_desc_by_rank(eligible: Vec<TaskHandle>, ranks: &HashMap<TaskId, i64>) -> Vec<TaskHandle> {
    let mut keyed: Vec<(i64, usize, TaskHandle)> = eligible
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            let id = t.borrow().id;
            (ranks.get(&id).copied().unwrap_or(0), i, t)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, t)| t).collect()
}

/// Priority descending, with a wait-count anti-starvation bump: a task
/// skipped (present at sort time) `max_wait` ticks in a row is moved to the
/// front and its counter reset.
pub struct PisaSort {
    wait_counts: HashMap<TaskId, u32>,
    max_wait: u32,
}
impl Default for PisaSort {
    fn default() -> Self {
        Self { wait_counts: HashMap::new(), max_wait: 100 }
    }
}
impl TaskSortPolicy for PisaSort {
    fn sort(&mut self, eligible: Vec<TaskHandle>, _state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        let present: HashSet<TaskId> = eligible.iter().map(|t| t.borrow().id).collect();
        self.wait_counts.retain(|id, _| present.contains(id));

        let mut keyed: Vec<(bool, i64, usize, TaskHandle)> = eligible
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let id = t.borrow().id;
                let priority = t.borrow().priority;
                let count = self.wait_counts.entry(id).or_insert(0);
                *count += 1;
                let boosted = *count >= self.max_wait;
                if boosted {
                    *count = 0;
                }
                (boosted, priority, i, t)
            })
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        Ok(keyed.into_iter().map(|(_, _, _, t)| t).collect())
    }
}

/// Priority ascending over the first up-to-500 entries; the remainder is
/// left untouched. A well-known reference implementation of this policy
/// sorts a sublist copy and discards it, making the sort a no-op in
/// practice; this policy performs the sort that was evidently intended.
pub struct FcpSort;
impl TaskSortPolicy for FcpSort {
    fn sort(&mut self, mut eligible: Vec<TaskHandle>, _state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        let split = eligible.len().min(500);
        eligible[..split].sort_by_key(|t| t.borrow().priority);
        Ok(eligible)
    }
}

/// Delay Scheduling: sort ascending by `runningTasksByOwner[owner]`; after
/// 10 consecutive sorts without the owner's task being dispatched, boost its
/// next task far to the front and reset the streak. Implemented as a clean
/// stable sort over a snapshot rather than mutating the list while iterating
/// it, which a well-known reference implementation of this policy does.
#[derive(Default)]
pub struct DsSort {
    skip_counts: HashMap<OwnerId, u32>,
}
impl TaskSortPolicy for DsSort {
    fn sort(&mut self, eligible: Vec<TaskHandle>, state: &SchedulerState) -> Result<Vec<TaskHandle>> {
        let owners_present: HashSet<OwnerId> = eligible.iter().map(|t| t.borrow().owner_id).collect();
        self.skip_counts.retain(|owner, _| owners_present.contains(owner));

        let mut keyed: Vec<(i64, usize, TaskHandle)> = eligible
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let owner = t.borrow().owner_id;
                let running = state.running_tasks_by_owner.get(&owner).copied().unwrap_or(0) as i64;
                let count = self.skip_counts.entry(owner).or_insert(0);
                *count += 1;
                let key = if *count > 10 {
                    *count = 0;
                    running - 1000
                } else {
                    running
                };
                (key, i, t)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(keyed.into_iter().map(|(_, _, t)| t).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{JobId, Task};

    fn task(id: u64, priority: i64, flops: u64) -> TaskHandle {
        Task::new(TaskId(id), JobId(1), OwnerId(1), priority, flops, 1, 0, 0, 0, vec![]).into_handle()
    }

    fn empty_state() -> SchedulerState {
        SchedulerState::new()
    }

    #[test]
    fn srtf_sorts_by_remaining_ascending() {
        let mut sort = SrtfSort;
        let tasks = vec![task(1, 0, 5000), task(2, 0, 1000)];
        let sorted = sort.sort(tasks, &empty_state()).unwrap();
        assert_eq!(sorted[0].borrow().id, TaskId(2));
    }

    #[test]
    fn fcp_only_sorts_first_500() {
        let mut sort = FcpSort;
        let tasks = vec![task(1, 5, 1000), task(2, 1, 1000)];
        let sorted = sort.sort(tasks, &empty_state()).unwrap();
        assert_eq!(sorted[0].borrow().id, TaskId(2));
    }

    #[test]
    fn pisa_boosts_after_max_wait() {
        let mut sort = PisaSort { wait_counts: HashMap::new(), max_wait: 2 };
        let low = task(1, 0, 1000);
        let high = task(2, 10, 1000);
        let state = empty_state();
        sort.sort(vec![low.clone(), high.clone()], &state).unwrap();
        let sorted = sort.sort(vec![low.clone(), high.clone()], &state).unwrap();
        assert_eq!(sorted[0].borrow().id, TaskId(1));
    }
}
