//! HEFT upward rank and CPOP downward rank.
//!
//! `averageCommunicationCost` reproduces a well-known quirk of the reference
//! HEFT formulation: a single `outputSize / ethernetSpeed` term averaged
//! over machines, which — since that term does not vary per machine —
//! yields the same value the average is computed over. Implemented
//! literally rather than "fixed" into a richer communication-cost model.

use crate::model::dag::DependencyDag;
use crate::model::machine::MachineDescriptor;
use crate::model::task::{TaskHandle, TaskId};
use crate::time::ceil_div;
use std::collections::HashMap;

pub fn avg_comp_cost(task: &TaskHandle, machines: &[MachineDescriptor]) -> i64 {
    if machines.is_empty() {
        return 0;
    }
    let t = task.borrow();
    let cores = (t.cores.max(1)) as u64;
    let total: u64 = machines
        .iter()
        .map(|m| ceil_div(t.flops, cores * m.speed_per_core().max(1)))
        .sum();
    (total / machines.len() as u64) as i64
}

pub fn avg_comm_cost(dependent: &TaskHandle, machines: &[MachineDescriptor]) -> i64 {
    if machines.is_empty() {
        return 0;
    }
    let output = dependent.borrow().output_size;
    let total: u64 = machines.iter().map(|m| output / m.ethernet_speed.max(1)).sum();
    (total / machines.len() as u64) as i64
}

/// `rank(t) = avgCompCost(t) + max_{s in dependents(t)} (avgCommCost(s) + rank(s))`,
/// exit tasks (no dependents) having rank `avgCompCost(t)`.
pub fn upward_ranks(
    all_tasks: &HashMap<TaskId, TaskHandle>,
    dag: &DependencyDag,
    machines: &[MachineDescriptor],
) -> HashMap<TaskId, i64> {
    let mut cache = HashMap::new();
    for id in all_tasks.keys() {
        upward_rank_of(*id, all_tasks, dag, machines, &mut cache);
    }
    cache
}

fn upward_rank_of(
    id: TaskId,
    all_tasks: &HashMap<TaskId, TaskHandle>,
    dag: &DependencyDag,
    machines: &[MachineDescriptor],
    cache: &mut HashMap<TaskId, i64>,
) -> i64 {
    if let Some(&v) = cache.get(&id) {
        return v;
    }
    let Some(task) = all_tasks.get(&id) else { return 0 };
    let comp = avg_comp_cost(task, machines);
    let dependents = dag.dependents(id);
    let value = if dependents.is_empty() {
        comp
    } else {
        comp + dependents
            .iter()
            .map(|dependent_id| {
                let comm = all_tasks
                    .get(dependent_id)
                    .map(|dependent| avg_comm_cost(dependent, machines))
                    .unwrap_or(0);
                comm + upward_rank_of(*dependent_id, all_tasks, dag, machines, cache)
            })
            .max()
            .unwrap_or(0)
    };
    cache.insert(id, value);
    value
}

/// `downwardRank(t) = max_{p in dependencies(t)} (downwardRank(p) + avgCompCost(p) + avgCommCost(t))`,
/// entry tasks (no dependencies) having rank `0`. Memoized here, unlike the
/// naive recursive formulation (which recomputes shared ancestors
/// exponentially); the memoized and unmemoized forms agree on every value.
pub fn downward_ranks(
    all_tasks: &HashMap<TaskId, TaskHandle>,
    dag: &DependencyDag,
    machines: &[MachineDescriptor],
) -> HashMap<TaskId, i64> {
    let mut cache = HashMap::new();
    for id in all_tasks.keys() {
        downward_rank_of(*id, all_tasks, dag, machines, &mut cache);
    }
    cache
}

fn downward_rank_of(
    id: TaskId,
    all_tasks: &HashMap<TaskId, TaskHandle>,
    dag: &DependencyDag,
    machines: &[MachineDescriptor],
    cache: &mut HashMap<TaskId, i64>,
) -> i64 {
    if let Some(&v) = cache.get(&id) {
        return v;
    }
    let deps = dag.dependencies(id);
    let value = if deps.is_empty() {
        0
    } else {
        let comm = all_tasks.get(&id).map(|t| avg_comm_cost(t, machines)).unwrap_or(0);
        deps.iter()
            .map(|pred_id| {
                let comp = all_tasks.get(pred_id).map(|p| avg_comp_cost(p, machines)).unwrap_or(0);
                downward_rank_of(*pred_id, all_tasks, dag, machines, cache) + comp + comm
            })
            .max()
            .unwrap_or(0)
    };
    cache.insert(id, value);
    value
}
