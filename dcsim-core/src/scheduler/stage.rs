//! Per-tick stage measurement accumulator.
//!
//! Wall-clock time is the only host clock `std` exposes without pulling in a
//! platform-specific CPU-time crate this dependency stack never reaches for;
//! `cpu_ns` is reported equal to `wall_ns` here; both remain observational
//! and never influence virtual-time ordering.

use crate::metrics::StageMeasurement;
use crate::time::Tick;
use std::collections::HashMap;
use std::time::Instant;

pub struct StageAccumulator {
    experiment: String,
    trace: String,
    scheduler: String,
    tick: Tick,
    next_id: u64,
    entries: HashMap<&'static str, StageMeasurement>,
    order: Vec<&'static str>,
    tick_start: Instant,
}

impl StageAccumulator {
    pub fn start(experiment: &str, trace: &str, scheduler: &str, tick: Tick, next_id: u64) -> Self {
        Self {
            experiment: experiment.to_string(),
            trace: trace.to_string(),
            scheduler: scheduler.to_string(),
            tick,
            next_id,
            entries: HashMap::new(),
            order: Vec::new(),
            tick_start: Instant::now(),
        }
    }

    /// Measures `f`'s wall time, accumulating into the running record for
    /// `stage` across every call with the same id within this tick.
    pub fn run_stage<T>(&mut self, stage: &'static str, input_size: usize, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed().as_nanos();

        if !self.entries.contains_key(stage) {
            let id = self.next_id;
            self.next_id += 1;
            self.order.push(stage);
            self.entries.insert(
                stage,
                StageMeasurement {
                    id,
                    experiment: self.experiment.clone(),
                    trace: self.trace.clone(),
                    scheduler: self.scheduler.clone(),
                    stage: stage.to_string(),
                    tick: self.tick,
                    cpu_ns: 0,
                    wall_ns: 0,
                    size: 0,
                    iterations: 0,
                },
            );
        }
        let entry = self.entries.get_mut(stage).expect("just inserted above");
        entry.cpu_ns += elapsed;
        entry.wall_ns += elapsed;
        entry.size += input_size;
        entry.iterations += 1;
        result
    }

    /// Closes the tick, attributing any unmeasured time to an `overhead`
    /// stage, and returns every stage's record in first-seen order alongside
    /// the next unused row id. The overhead row's id is assigned here, inside
    /// `end`, so the returned counter — not anything read before this call —
    /// is the one callers must carry into the next tick's `start`.
    pub fn end(mut self) -> (Vec<StageMeasurement>, u64) {
        let total = self.tick_start.elapsed().as_nanos();
        let attributed: u128 = self.entries.values().map(|e| e.wall_ns).sum();
        let overhead = total.saturating_sub(attributed);

        if !self.entries.contains_key("overhead") {
            let id = self.next_id;
            self.next_id += 1;
            self.order.push("overhead");
            self.entries.insert(
                "overhead",
                StageMeasurement {
                    id,
                    experiment: self.experiment.clone(),
                    trace: self.trace.clone(),
                    scheduler: self.scheduler.clone(),
                    stage: "overhead".to_string(),
                    tick: self.tick,
                    cpu_ns: 0,
                    wall_ns: 0,
                    size: 0,
                    iterations: 0,
                },
            );
        }
        let entry = self.entries.get_mut("overhead").expect("just inserted above");
        entry.cpu_ns += overhead;
        entry.wall_ns += overhead;

        let Self { mut entries, order, next_id, .. } = self;
        let records = order.into_iter().filter_map(|stage| entries.remove(stage)).collect();
        (records, next_id)
    }
}
