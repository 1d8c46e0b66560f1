//! Topology input: a tree of Datacenter -> Room -> Rack -> Machine -> CPU.
//! External setup parsers are responsible for producing this structure; the
//! core only consumes it.

use super::machine::{CpuSpec, MachineDescriptor, MachineId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub clock_rate_mhz: u64,
    pub cores: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    pub id: MachineId,
    pub ethernet_speed: u64,
    pub cpus: Vec<Cpu>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rack {
    pub name: String,
    pub machines: Vec<MachineSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub racks: Vec<Rack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datacenter {
    pub name: String,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Topology {
    pub datacenters: Vec<Datacenter>,
}

impl Topology {
    /// Flattens the tree into the machine descriptors the scheduler and
    /// kernel actually operate on; everything above `Machine` is bookkeeping
    /// for external setup parsers and carries no simulation semantics of
    /// its own.
    pub fn machines(&self) -> Vec<MachineDescriptor> {
        self.datacenters
            .iter()
            .flat_map(|dc| &dc.rooms)
            .flat_map(|room| &room.racks)
            .flat_map(|rack| &rack.machines)
            .map(|m| MachineDescriptor {
                id: m.id,
                ethernet_speed: m.ethernet_speed,
                cpus: m
                    .cpus
                    .iter()
                    .map(|c| CpuSpec { clock_rate_mhz: c.clock_rate_mhz, cores: c.cores })
                    .collect(),
            })
            .collect()
    }
}
