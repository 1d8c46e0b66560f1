//! The data model: tasks, jobs, the dependency DAG, machine descriptors,
//! topology, and the trace input format.

pub mod dag;
pub mod job;
pub mod machine;
pub mod task;
pub mod topology;
pub mod trace;
