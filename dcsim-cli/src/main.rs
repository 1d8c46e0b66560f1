//! `dcsim`: a reference enclosing program for the simulation core.
//!
//! Implements the CLI surface of spec.md §6 around `dcsim_core`'s
//! `run_experiment`, minus the collaborators the core spec explicitly
//! excludes: trace/topology *parsers* (this binary loads the core's own
//! `Trace`/`Topology` types as JSON, see `loader.rs`) and a CSV/metrics file
//! exporter (rows are printed as newline-delimited JSON, one caller's
//! problem away from a real CSV sink).

mod loader;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dcsim_core::error::SimError;
use dcsim_core::experiment::{run_experiment, ExperimentConfig};
use dcsim_core::metrics::InMemorySink;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Datacenter scheduling simulator.
#[derive(Parser)]
#[command(name = "dcsim", version, about = "Discrete-event datacenter scheduling simulator")]
struct Cli {
    /// Topology (setup) file, as JSON reflecting `dcsim_core::model::topology::Topology`.
    #[arg(long, value_name = "PATH")]
    setup: PathBuf,

    /// Scheduler policy name(s), `SORT-SELECT` (e.g. `SRTF-BESTFIT`) or a
    /// single-word alias (`HEFT`, `CPOP`, `FCP`, `DS`). Repeatable.
    #[arg(long = "schedulers", value_name = "NAME", num_args = 1, action = clap::ArgAction::Append)]
    schedulers: Vec<String>,

    /// Number of non-warmup repeats per scheduler.
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Number of warmup repeats per scheduler, run but not reported.
    #[arg(long, default_value_t = 0)]
    warmup: u32,

    /// Number of experiments to run concurrently, each on its own kernel
    /// instance and its own host thread (kernel instances are never
    /// shared). Defaults to the host's core count.
    #[arg(long)]
    parallelism: Option<usize>,

    /// Base RNG seed; each (scheduler, repeat) pair gets a distinct
    /// derived seed so repeats are reproducible but not identical.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Tick budget handed to the kernel per experiment; exceeding it with
    /// work still pending is reported as an aborted experiment, not a crash.
    #[arg(long, default_value_t = 10_000_000)]
    deadline: u64,

    /// Workload trace file, as JSON reflecting `dcsim_core::model::trace::Trace`.
    trace: PathBuf,
}

/// One (scheduler, repeat) unit of work.
struct Job {
    scheduler: String,
    repeat_index: u32,
    is_warmup: bool,
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    if let Err(err) = run(Cli::parse()) {
        tracing::error!(error = %err, "dcsim exiting with an error");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.schedulers.is_empty() {
        bail!("at least one --schedulers NAME is required");
    }

    let topology = loader::load_topology(&cli.setup).context("loading topology")?;
    let trace = loader::load_trace(&cli.trace).context("loading trace")?;
    let trace_name = cli
        .trace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.trace.display().to_string());

    let parallelism = cli.parallelism.unwrap_or_else(num_cpus::get).max(1);

    let jobs: Vec<Job> = cli
        .schedulers
        .iter()
        .flat_map(|scheduler| {
            let scheduler = scheduler.clone();
            (0..cli.warmup + cli.repeat).map(move |i| Job {
                scheduler: scheduler.clone(),
                repeat_index: i,
                is_warmup: i < cli.warmup,
                seed: derive_seed(cli.seed, &scheduler, i),
            })
        })
        .collect();

    let results = run_jobs(&jobs, parallelism, &trace, &trace_name, &topology, cli.deadline)?;

    let mut combined = InMemorySink::default();
    let mut aborted = 0usize;
    for (job, outcome) in jobs.iter().zip(results) {
        match outcome {
            Ok(per_experiment_sink) => {
                if !job.is_warmup {
                    combined.stages.extend(per_experiment_sink.stages);
                    combined.tasks.extend(per_experiment_sink.tasks);
                    combined.jobs.extend(per_experiment_sink.jobs);
                }
            }
            Err(SimError::ExperimentAborted { until }) => {
                aborted += 1;
                tracing::warn!(scheduler = %job.scheduler, repeat = job.repeat_index, until, "experiment aborted: deadline reached with work pending");
            }
            Err(other) => return Err(other.into()),
        }
    }

    print_ndjson("stage_measurements", &combined.stages)?;
    print_ndjson("task_metrics", &combined.tasks)?;
    print_ndjson("job_metrics", &combined.jobs)?;

    if aborted > 0 {
        bail!("{aborted} of {} experiments were aborted (deadline reached with work pending)", jobs.len());
    }
    Ok(())
}

fn derive_seed(base: u64, scheduler: &str, repeat_index: u32) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    base.hash(&mut hasher);
    scheduler.hash(&mut hasher);
    repeat_index.hash(&mut hasher);
    hasher.finish()
}

/// Runs every job, at most `parallelism` concurrently, each on its own
/// kernel instance and its own thread — separate kernel instances may run
/// in parallel, but one kernel instance is never shared (spec.md §5).
fn run_jobs(
    jobs: &[Job],
    parallelism: usize,
    trace: &dcsim_core::model::trace::Trace,
    trace_name: &str,
    topology: &dcsim_core::model::topology::Topology,
    deadline: u64,
) -> Result<Vec<Result<InMemorySink, SimError>>> {
    let (result_tx, result_rx) = mpsc::channel();

    std::thread::scope(|scope| -> Result<()> {
        let (work_tx, work_rx) = mpsc::channel::<(usize, &Job)>();
        for (idx, job) in jobs.iter().enumerate() {
            work_tx.send((idx, job)).expect("receiver outlives every send");
        }
        drop(work_tx);
        let work_rx = std::sync::Mutex::new(work_rx);

        for _ in 0..parallelism.min(jobs.len().max(1)) {
            let work_rx = &work_rx;
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                loop {
                    let next = { work_rx.lock().expect("worker mutex poisoned").recv() };
                    let Ok((idx, job)) = next else { break };
                    let config = ExperimentConfig {
                        name: format!("{}@{}", job.scheduler, job.repeat_index),
                        scheduler_name: job.scheduler.clone(),
                        seed: job.seed,
                        deadline,
                    };
                    let mut sink = InMemorySink::default();
                    let outcome = run_experiment(trace, trace_name, topology, &config, &mut sink).map(|()| sink);
                    result_tx.send((idx, outcome)).expect("receiver outlives every send");
                }
            });
        }
        drop(result_tx);
        Ok(())
    })?;

    let mut out: Vec<Option<Result<InMemorySink, SimError>>> = (0..jobs.len()).map(|_| None).collect();
    for (idx, outcome) in result_rx {
        out[idx] = Some(outcome);
    }
    Ok(out.into_iter().map(|o| o.expect("every job index receives exactly one result")).collect())
}

fn print_ndjson<T: serde::Serialize>(label: &str, rows: &[T]) -> Result<()> {
    for row in rows {
        println!("{}", serde_json::to_string(row).with_context(|| format!("serializing a {label} row"))?);
    }
    Ok(())
}
