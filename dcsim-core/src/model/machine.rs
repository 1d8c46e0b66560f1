//! Machine descriptor: immutable topology-provided facts about a machine.
//! Mutable runtime state lives in [`crate::machine::MachineProcess`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(pub u64);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine-{}", self.0)
    }
}

/// One CPU socket on a machine: `(clockRate_MHz, cores)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CpuSpec {
    pub clock_rate_mhz: u64,
    pub cores: u32,
}

/// Machine identity fields, derived from the CPU list at construction time:
/// `cores` is the sum of per-CPU cores, `speed_per_core` is the
/// core-weighted average clock rate in flops/tick/core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDescriptor {
    pub id: MachineId,
    pub cpus: Vec<CpuSpec>,
    pub ethernet_speed: u64,
}

impl MachineDescriptor {
    pub fn cores(&self) -> u32 {
        self.cpus.iter().map(|c| c.cores).sum()
    }

    /// Core-weighted average clock rate. Zero cores (an empty CPU list, or a
    /// machine with every CPU at zero cores) yields a halted machine and a
    /// speed of 0 — callers must check `cores() == 0` first.
    pub fn speed_per_core(&self) -> u64 {
        let total_cores = self.cores();
        if total_cores == 0 {
            return 0;
        }
        let weighted: u64 = self
            .cpus
            .iter()
            .map(|c| c.clock_rate_mhz * c.cores as u64)
            .sum();
        weighted / total_cores as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_core_weighted_average() {
        let m = MachineDescriptor {
            id: MachineId(1),
            cpus: vec![
                CpuSpec { clock_rate_mhz: 1000, cores: 2 },
                CpuSpec { clock_rate_mhz: 4000, cores: 2 },
            ],
            ethernet_speed: 1,
        };
        assert_eq!(m.cores(), 4);
        assert_eq!(m.speed_per_core(), 2500);
    }

    #[test]
    fn zero_cores_is_zero_speed() {
        let m = MachineDescriptor { id: MachineId(1), cpus: vec![], ethernet_speed: 1 };
        assert_eq!(m.cores(), 0);
        assert_eq!(m.speed_per_core(), 0);
    }
}
