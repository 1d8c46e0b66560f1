//! Thin JSON loaders for the core's own `Trace`/`Topology` types.
//!
//! This is deliberately not a trace-format parser: the workload/topology
//! file formats named in spec.md §6 (CSV-style and binary columnar workload
//! archives, topology setup files) are external collaborators, out of
//! scope for this crate. What's loaded here is `serde_json`'s own
//! reflection of `dcsim_core::model::{trace::Trace, topology::Topology}` —
//! a convenient on-disk shape for driving the core from the command line,
//! not the external format.

use anyhow::{Context, Result};
use dcsim_core::model::topology::Topology;
use dcsim_core::model::trace::Trace;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn load_topology(path: &Path) -> Result<Topology> {
    let file = File::open(path).with_context(|| format!("opening topology file {}", path.display()))?;
    let topology: Topology = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing topology file {}", path.display()))?;
    Ok(topology)
}

pub fn load_trace(path: &Path) -> Result<Trace> {
    let file = File::open(path).with_context(|| format!("opening trace file {}", path.display()))?;
    let trace: Trace = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing trace file {}", path.display()))?;
    Ok(trace)
}
