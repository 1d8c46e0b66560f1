//! Machine selection policies.

use super::MachineSelectionPolicy;
use crate::model::machine::MachineId;
use crate::model::task::TaskHandle;
use crate::scheduler::SchedulerState;
use anyhow::Result;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

fn available_cores(state: &SchedulerState, m: MachineId) -> u32 {
    state.machine_cores.get(&m).copied().unwrap_or(0)
}

/// First candidate in registration order.
pub struct FirstFitSelect;
impl MachineSelectionPolicy for FirstFitSelect {
    fn select(&mut self, _task: &TaskHandle, candidates: &[MachineId], _state: &SchedulerState) -> Result<Option<MachineId>> {
        Ok(candidates.first().copied())
    }
}

/// Minimizes `|availableCores - t.cores|`.
pub struct BestFitSelect;
impl MachineSelectionPolicy for BestFitSelect {
    fn select(&mut self, task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        let cores = task.borrow().cores as i64;
        Ok(candidates
            .iter()
            .min_by_key(|m| (available_cores(state, **m) as i64 - cores).abs())
            .copied())
    }
}

/// Maximizes `|availableCores - t.cores|`.
pub struct WorstFitSelect;
impl MachineSelectionPolicy for WorstFitSelect {
    fn select(&mut self, task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        let cores = task.borrow().cores as i64;
        Ok(candidates
            .iter()
            .max_by_key(|m| (available_cores(state, **m) as i64 - cores).abs())
            .copied())
    }
}

pub struct RandomSelect {
    rng: ChaCha8Rng,
}
impl RandomSelect {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}
impl MachineSelectionPolicy for RandomSelect {
    fn select(&mut self, _task: &TaskHandle, candidates: &[MachineId], _state: &SchedulerState) -> Result<Option<MachineId>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let idx = self.rng.gen_range(0..candidates.len());
        Ok(Some(candidates[idx]))
    }
}

/// Advances a cursor over the full registered machine order, wrapping, and
/// picks the first candidate reached.
#[derive(Default)]
pub struct RoundRobinSelect {
    cursor: usize,
}
impl MachineSelectionPolicy for RoundRobinSelect {
    fn select(&mut self, _task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        let order = &state.machine_order;
        if order.is_empty() || candidates.is_empty() {
            return Ok(None);
        }
        let n = order.len();
        for step in 0..n {
            let idx = (self.cursor + step) % n;
            let candidate = order[idx];
            if candidates.contains(&candidate) {
                self.cursor = (idx + 1) % n;
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Maximizes `ethernetSpeed/inputSize + (1-load)*speedPerCore`.
fn heft_score(task: &TaskHandle, machine_id: MachineId, state: &SchedulerState) -> Option<f64> {
    let descriptor = state.machines.get(&machine_id)?;
    let cores = descriptor.cores().max(1) as f64;
    let load = 1.0 - (available_cores(state, machine_id) as f64 / cores);
    let input = task.borrow().input_size.max(1) as f64;
    Some(descriptor.ethernet_speed as f64 / input + (1.0 - load) * descriptor.speed_per_core() as f64)
}

fn select_by_score(task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Option<MachineId> {
    candidates
        .iter()
        .filter_map(|m| heft_score(task, *m, state).map(|score| (score, *m)))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, m)| m)
}

pub struct HeftSelect;
impl MachineSelectionPolicy for HeftSelect {
    fn select(&mut self, task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        Ok(select_by_score(task, candidates, state))
    }
}

pub struct CpopSelect;
impl MachineSelectionPolicy for CpopSelect {
    fn select(&mut self, task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        // CPOP's machine scoring mirrors HEFT's; upward/downward ranks only
        // affect sort order, not selection.
        Ok(select_by_score(task, candidates, state))
    }
}

/// Weighted ticket draw; default 100 tickets per newly-seen machine, retried
/// until a ticket belongs to an eligible candidate.
pub struct LotterySelect {
    rng: ChaCha8Rng,
    tickets: HashMap<MachineId, u32>,
    default_tickets: u32,
}
impl LotterySelect {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed), tickets: HashMap::new(), default_tickets: 100 }
    }
}
impl MachineSelectionPolicy for LotterySelect {
    fn select(&mut self, _task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        for m in &state.machine_order {
            self.tickets.entry(*m).or_insert(self.default_tickets);
        }
        let total: u32 = state.machine_order.iter().map(|m| self.tickets.get(m).copied().unwrap_or(0)).sum();
        if total == 0 {
            return Ok(candidates.first().copied());
        }

        const MAX_ATTEMPTS: u32 = 10_000;
        for _ in 0..MAX_ATTEMPTS {
            let draw = self.rng.gen_range(0..total);
            let mut acc = 0u32;
            for m in &state.machine_order {
                acc += self.tickets.get(m).copied().unwrap_or(0);
                if draw < acc {
                    if candidates.contains(m) {
                        return Ok(Some(*m));
                    }
                    break;
                }
            }
        }
        Ok(candidates.first().copied())
    }
}
