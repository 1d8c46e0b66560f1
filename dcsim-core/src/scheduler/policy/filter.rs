use super::MachineDynamicFilterPolicy;
use crate::model::machine::MachineId;
use crate::model::task::TaskHandle;
use crate::scheduler::SchedulerState;

/// Keeps machines with `machineCores[m] >= t.cores`, in registration order.
pub struct DefaultMachineFilter;

impl MachineDynamicFilterPolicy for DefaultMachineFilter {
    fn filter(&self, task: &TaskHandle, state: &SchedulerState) -> Vec<MachineId> {
        let cores = task.borrow().cores;
        state
            .machine_order
            .iter()
            .copied()
            .filter(|m| state.machine_cores.get(m).copied().unwrap_or(0) >= cores)
            .collect()
    }
}
