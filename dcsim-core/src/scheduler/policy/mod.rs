//! Pluggable filter/sort/select policies. Each policy is constructed by
//! name and composed into a [`PolicySet`] the scheduler drives one stage at
//! a time.

pub mod eligibility;
pub mod filter;
mod rank;
pub mod select;
pub mod sort;

use crate::model::machine::MachineId;
use crate::model::task::TaskHandle;
use crate::scheduler::SchedulerState;
use anyhow::Result;

/// T1: which queued tasks are eligible to be considered this tick.
pub trait TaskEligibilityPolicy {
    fn filter(&self, queued: &[TaskHandle], state: &SchedulerState) -> Vec<TaskHandle>;
}

/// T2: the dispatch order of eligible tasks.
pub trait TaskSortPolicy {
    fn sort(&mut self, eligible: Vec<TaskHandle>, state: &SchedulerState) -> Result<Vec<TaskHandle>>;
}

/// R4: the candidate machines for one task.
pub trait MachineDynamicFilterPolicy {
    fn filter(&self, task: &TaskHandle, state: &SchedulerState) -> Vec<MachineId>;
}

/// R5: the chosen machine, if any, among R4's candidates.
pub trait MachineSelectionPolicy {
    fn select(&mut self, task: &TaskHandle, candidates: &[MachineId], state: &SchedulerState) -> Result<Option<MachineId>>;
}

pub struct PolicySet {
    pub name: String,
    pub eligibility: Box<dyn TaskEligibilityPolicy>,
    pub sort: Box<dyn TaskSortPolicy>,
    pub machine_filter: Box<dyn MachineDynamicFilterPolicy>,
    pub select: Box<dyn MachineSelectionPolicy>,
}

impl PolicySet {
    /// Parses scheduler names of the form `SORT-SELECT` (`"SRTF-BESTFIT"`),
    /// plus the single-word names that designate the same algorithm for
    /// both stages (`"HEFT"`, `"CPOP"`) or, for `"FCP"`/`"DS"` which have no
    /// matching select-stage counterpart, pair with FirstFit (a deliberate
    /// choice, not named by the policy catalogue — see the design ledger).
    pub fn from_name(name: &str, seed: u64) -> Result<Self> {
        let upper = name.to_ascii_uppercase();
        let (sort, select): (Box<dyn TaskSortPolicy>, Box<dyn MachineSelectionPolicy>) = match upper.as_str() {
            "HEFT" => (Box::new(sort::HeftSort), Box::new(select::HeftSelect)),
            "CPOP" => (Box::new(sort::CpopSort), Box::new(select::CpopSelect)),
            "FCP" => (Box::new(sort::FcpSort), Box::new(select::FirstFitSelect)),
            "DS" => (Box::new(sort::DsSort::default()), Box::new(select::FirstFitSelect)),
            other => {
                let (sort_name, select_name) = other
                    .split_once('-')
                    .ok_or_else(|| anyhow::anyhow!("unrecognized scheduler name '{name}'"))?;
                (sort_policy(sort_name, seed)?, select_policy(select_name, seed)?)
            }
        };

        Ok(Self {
            name: name.to_string(),
            eligibility: Box::new(eligibility::DefaultEligibility),
            sort,
            machine_filter: Box::new(filter::DefaultMachineFilter),
            select,
        })
    }
}

fn sort_policy(name: &str, seed: u64) -> Result<Box<dyn TaskSortPolicy>> {
    Ok(match name {
        "FIFO" => Box::new(sort::FifoSort),
        "SRTF" => Box::new(sort::SrtfSort),
        "RANDOM" => Box::new(sort::RandomSort::new(seed)),
        "HEFT" => Box::new(sort::HeftSort),
        "CPOP" => Box::new(sort::CpopSort),
        "PISA" => Box::new(sort::PisaSort::default()),
        "FCP" => Box::new(sort::FcpSort),
        "DS" => Box::new(sort::DsSort::default()),
        other => anyhow::bail!("unrecognized task sort policy '{other}'"),
    })
}

fn select_policy(name: &str, seed: u64) -> Result<Box<dyn MachineSelectionPolicy>> {
    Ok(match name {
        "FIRSTFIT" => Box::new(select::FirstFitSelect),
        "BESTFIT" => Box::new(select::BestFitSelect),
        "WORSTFIT" => Box::new(select::WorstFitSelect),
        "RANDOM" => Box::new(select::RandomSelect::new(seed)),
        "ROUNDROBIN" => Box::new(select::RoundRobinSelect::default()),
        "HEFT" => Box::new(select::HeftSelect),
        "CPOP" => Box::new(select::CpopSelect),
        "LOTTERY" => Box::new(select::LotterySelect::new(seed)),
        other => anyhow::bail!("unrecognized machine select policy '{other}'"),
    })
}
