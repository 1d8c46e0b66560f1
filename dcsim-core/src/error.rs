//! Error taxonomy. Kernel/process crashes never bubble past their
//! owning component — this enum exists for the handful of call sites that
//! legitimately need to report failure to a caller.

use crate::kernel::process::ProcessId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid delay {delay} scheduled for {destination}: delay must be >= 0")]
    InvalidDelay { destination: ProcessId, delay: i64 },

    #[error("illegal operation on process {process}: {reason}")]
    IllegalProcessState { process: ProcessId, reason: String },

    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    #[error("malformed topology: {0}")]
    MalformedTopology(String),

    #[error("experiment aborted: virtual time reached {until} with work still pending")]
    ExperimentAborted { until: crate::time::Tick },

    #[error("policy {policy} failed on process {process}: {source}")]
    PolicyFailure {
        process: ProcessId,
        policy: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("process {process} crashed: {source}")]
    ProcessCrash {
        process: ProcessId,
        #[source]
        source: anyhow::Error,
    },

    /// An external interrupt aborted `Kernel::run`. The kernel is left in a
    /// consistent, paused state; re-entering `run` with a larger `until`
    /// resumes.
    #[error("kernel run interrupted at tick {now}")]
    Interrupted { now: crate::time::Tick },
}
