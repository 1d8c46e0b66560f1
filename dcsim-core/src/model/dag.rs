//! Dependency DAG: directed acyclic graph over tasks. `dependencies`/
//! `dependents` are inverses; dependencies of a task may only belong to the
//! same job.

use super::task::{JobId, Task, TaskId};
use crate::error::SimError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// Arena-allocated dependency graph, built in a single pass once all task ids
/// are known.
pub struct DependencyDag {
    graph: DiGraph<TaskId, ()>,
    index_of: HashMap<TaskId, NodeIndex>,
}

impl DependencyDag {
    pub fn build(tasks: &[Task]) -> Result<Self, SimError> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::with_capacity(tasks.len());
        let mut job_of: HashMap<TaskId, JobId> = HashMap::with_capacity(tasks.len());

        for t in tasks {
            let idx = graph.add_node(t.id);
            index_of.insert(t.id, idx);
            job_of.insert(t.id, t.job_id);
        }

        for t in tasks {
            for dep in &t.dependencies {
                let dep_job = job_of.get(dep).ok_or_else(|| {
                    SimError::MalformedTrace(format!(
                        "task {} depends on unknown task {}",
                        t.id, dep
                    ))
                })?;
                if *dep_job != t.job_id {
                    return Err(SimError::MalformedTrace(format!(
                        "task {} depends on {} from a different job",
                        t.id, dep
                    )));
                }
                let from = index_of[dep];
                let to = index_of[&t.id];
                graph.add_edge(from, to, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(SimError::MalformedTrace(
                "dependency graph contains a cycle".to_string(),
            ));
        }

        Ok(Self { graph, index_of })
    }

    pub fn dependencies(&self, id: TaskId) -> Vec<TaskId> {
        let Some(&idx) = self.index_of.get(&id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| self.graph[e.source()])
            .collect()
    }

    pub fn dependents(&self, id: TaskId) -> Vec<TaskId> {
        let Some(&idx) = self.index_of.get(&id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::OwnerId;

    fn t(id: u64, job: u64, deps: Vec<u64>) -> Task {
        Task::new(
            TaskId(id),
            JobId(job),
            OwnerId(1),
            0,
            1000,
            1,
            0,
            0,
            0,
            deps.into_iter().map(TaskId).collect(),
        )
    }

    #[test]
    fn rejects_cycles() {
        let tasks = vec![t(1, 1, vec![2]), t(2, 1, vec![1])];
        assert!(DependencyDag::build(&tasks).is_err());
    }

    #[test]
    fn rejects_cross_job_dependency() {
        let tasks = vec![t(1, 1, vec![]), t(2, 2, vec![1])];
        assert!(DependencyDag::build(&tasks).is_err());
    }

    #[test]
    fn dependents_is_inverse_of_dependencies() {
        let tasks = vec![t(1, 1, vec![]), t(2, 1, vec![1]), t(3, 1, vec![1])];
        let dag = DependencyDag::build(&tasks).unwrap();
        assert_eq!(dag.dependencies(TaskId(2)), vec![TaskId(1)]);
        let mut dependents = dag.dependents(TaskId(1));
        dependents.sort();
        assert_eq!(dependents, vec![TaskId(2), TaskId(3)]);
    }
}
