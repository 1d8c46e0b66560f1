//! Machine process: accepts/declines tasks, runs them to completion at a
//! machine-dependent rate, and releases capacity on `Done`.

use crate::kernel::event::Message;
use crate::kernel::process::{Context, Process, ProcessId};
use crate::model::machine::MachineDescriptor;
use crate::model::task::{TaskHandle, TaskId};
use crate::time::ceil_div;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    Halt,
    Idle,
    Running,
}

/// Cosmetic bookkeeping for observers: "+50 MB, +5 C per running task", no
/// effect on scheduling.
const MEMORY_PER_TASK_MB: u64 = 50;
const TEMPERATURE_PER_TASK_C: i64 = 5;

pub struct MachineProcess {
    descriptor: MachineDescriptor,
    status: MachineStatus,
    running: HashMap<TaskId, TaskHandle>,
    available_cores: u32,
    memory_mb: u64,
    temperature_c: i64,
}

impl MachineProcess {
    pub fn new(descriptor: MachineDescriptor) -> Self {
        let cores = descriptor.cores();
        Self {
            descriptor,
            status: MachineStatus::Idle,
            running: HashMap::new(),
            available_cores: cores,
            memory_mb: 0,
            temperature_c: 0,
        }
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn available_cores(&self) -> u32 {
        self.available_cores
    }

    /// `load ∈ [0,1]`, derived from occupied/total cores.
    pub fn load(&self) -> f64 {
        let cores = self.descriptor.cores();
        if cores == 0 {
            return 0.0;
        }
        (cores - self.available_cores) as f64 / cores as f64
    }

    fn refresh_idle(&mut self) {
        if self.status != MachineStatus::Halt && self.running.is_empty() {
            self.status = MachineStatus::Idle;
        }
    }
}

impl Process for MachineProcess {
    fn handle(&mut self, ctx: &mut Context<'_>, from: Option<ProcessId>, msg: Message) -> anyhow::Result<()> {
        if self.status == MachineStatus::Halt {
            return Ok(());
        }

        match msg {
            Message::PreStart => {
                if self.descriptor.cores() == 0 {
                    self.status = MachineStatus::Halt;
                }
            }

            Message::Task(handle) => {
                let self_id = ctx.self_id().clone();
                let (task_id, cores) = {
                    let t = handle.borrow();
                    (t.id, t.cores)
                };
                if self.available_cores >= cores {
                    self.available_cores -= cores;
                    self.status = MachineStatus::Running;
                    self.memory_mb += MEMORY_PER_TASK_MB;
                    self.temperature_c += TEMPERATURE_PER_TASK_C;

                    let ticks = {
                        let mut t = handle.borrow_mut();
                        t.consume(ctx.now(), 0); // Queued -> Running
                        let speed = self.descriptor.speed_per_core();
                        ceil_div(t.flops, cores as u64 * speed)
                    };
                    self.running.insert(task_id, handle);

                    if let Some(sender) = &from {
                        ctx.send(sender, Message::Accept(task_id), 0)?;
                    }
                    ctx.send(&self_id, Message::Done(task_id), ticks as i64)?;
                } else if let Some(sender) = &from {
                    ctx.send(sender, Message::Decline(task_id), 0)?;
                }
            }

            Message::Done(task_id) => {
                if let Some(handle) = self.running.remove(&task_id) {
                    let remaining = {
                        let t = handle.borrow();
                        t.remaining()
                    };
                    handle.borrow_mut().consume(ctx.now(), remaining); // Running -> Finished
                    self.available_cores += handle.borrow().cores;
                    self.memory_mb = self.memory_mb.saturating_sub(MEMORY_PER_TASK_MB);
                    self.temperature_c -= TEMPERATURE_PER_TASK_C;
                }
            }

            other => {
                tracing::warn!(process = %ctx.self_id(), ?other, "machine ignoring unexpected message");
            }
        }

        self.refresh_idle();
        Ok(())
    }
}
