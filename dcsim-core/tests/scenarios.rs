//! End-to-end scenarios from spec.md §8, driven either through
//! `run_experiment` (when the resulting `TaskMetric`/`JobMetric` rows alone
//! are enough to tell the scenario apart) or directly against the kernel and
//! processes (when the scenario hinges on an intermediate state
//! `run_experiment`'s metrics surface doesn't expose, e.g. a deliberately
//! stale scheduler-side capacity projection).

use dcsim_core::experiment::{run_experiment, ExperimentConfig};
use dcsim_core::kernel::event::Message;
use dcsim_core::kernel::process::ProcessId;
use dcsim_core::kernel::Kernel;
use dcsim_core::machine::MachineProcess;
use dcsim_core::metrics::InMemorySink;
use dcsim_core::model::machine::{CpuSpec, MachineDescriptor, MachineId};
use dcsim_core::model::task::{JobId, OwnerId, Task, TaskId};
use dcsim_core::model::topology::{Cpu, Datacenter, MachineSpec, Rack, Room, Topology};
use dcsim_core::model::trace::{JobRecord, TaskRecord, Trace};
use dcsim_core::scheduler::policy::PolicySet;
use dcsim_core::scheduler::{machine_process_id, SchedulerProcess};

fn one_machine(cores: u32, speed: u64) -> Topology {
    Topology {
        datacenters: vec![Datacenter {
            name: "dc0".to_string(),
            rooms: vec![Room {
                name: "room0".to_string(),
                racks: vec![Rack {
                    name: "rack0".to_string(),
                    machines: vec![MachineSpec {
                        id: MachineId(1),
                        ethernet_speed: 1,
                        cpus: vec![Cpu { clock_rate_mhz: speed, cores }],
                    }],
                }],
            }],
        }],
    }
}

fn two_machines(a: (u32, u64), b: (u32, u64)) -> Topology {
    Topology {
        datacenters: vec![Datacenter {
            name: "dc0".to_string(),
            rooms: vec![Room {
                name: "room0".to_string(),
                racks: vec![Rack {
                    name: "rack0".to_string(),
                    machines: vec![
                        MachineSpec { id: MachineId(1), ethernet_speed: 1, cpus: vec![Cpu { clock_rate_mhz: a.1, cores: a.0 }] },
                        MachineSpec { id: MachineId(2), ethernet_speed: 1, cpus: vec![Cpu { clock_rate_mhz: b.1, cores: b.0 }] },
                    ],
                }],
            }],
        }],
    }
}

fn rec(id: u64, flops: i64, cores: i32, deps: Vec<u64>) -> TaskRecord {
    TaskRecord { id, owner_id: 1, priority: 0, flops, cores, input_size: 0, output_size: 0, submit_time: 0, dependencies: deps }
}

fn run(trace: &Trace, topology: &Topology, scheduler_name: &str) -> InMemorySink {
    let config = ExperimentConfig { name: "scenario".to_string(), scheduler_name: scheduler_name.to_string(), seed: 7, deadline: 1_000_000 };
    let mut sink = InMemorySink::default();
    run_experiment(trace, "scenario-trace", topology, &config, &mut sink).unwrap();
    sink
}

/// Scenario 1: Trivial FIFO. One machine, one task, nothing to contend over.
///
/// flops=1000 here (not the literal 4000 from spec.md §8's scenario text) so
/// that `execution = ceil(flops / (cores * speedPerCore)) = 1` matches the
/// scenario's stated expected execution of 1 tick exactly — with
/// cores=1/speedPerCore=1000 and the spec's literal flops=4000 the formula
/// gives execution=4, so flops=1000 is the reading used here to keep the
/// test's invariants consistent with the scenario's own stated numbers.
#[test]
fn scenario_1_trivial_fifo() {
    let topology = one_machine(4, 1000);
    let trace = Trace { jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, 1000, 1, vec![])] }] };
    let sink = run(&trace, &topology, "FIFO-FIRSTFIT");

    assert_eq!(sink.tasks.len(), 1);
    let t = &sink.tasks[0];
    assert_eq!(t.waiting, 0);
    assert_eq!(t.execution, 1);
    assert_eq!(t.turnaround, 1);

    assert_eq!(sink.jobs.len(), 1);
    let j = &sink.jobs[0];
    assert_eq!(j.makespan, 1);
    assert_eq!(j.critical_path, 1);
    assert_eq!(j.critical_path_length, 1);
    assert_eq!(j.nsl, 1);
}

/// Scenario 2: Capacity-gated. Two independent tasks needing all of the
/// machine's cores between them; the second can't dispatch until the first
/// finishes and frees capacity, and the scheduler's self-rescheduling poll
/// (not an external driver) is what gives it that second chance.
#[test]
fn scenario_2_capacity_gated() {
    let topology = one_machine(2, 1000);
    let trace = Trace {
        jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, 2000, 2, vec![]), rec(2, 2000, 2, vec![])] }],
    };
    let sink = run(&trace, &topology, "FIFO-FIRSTFIT");

    assert_eq!(sink.tasks.len(), 2);
    let first = sink.tasks.iter().find(|t| t.task_id == TaskId(1)).unwrap();
    let second = sink.tasks.iter().find(|t| t.task_id == TaskId(2)).unwrap();

    assert_eq!(first.waiting, 0);
    assert_eq!(first.execution, 1);
    // The second task cannot have started before the first task's capacity
    // was released.
    assert!(second.waiting >= first.turnaround);
    assert_eq!(second.execution, 1);
}

/// Scenario 3: Dependency DAG. A three-task chain A -> B -> C on one
/// machine; each dependent only becomes eligible once its predecessor has
/// actually finished, so finish times strictly increase down the chain and
/// the job's critical path spans all three tasks.
#[test]
fn scenario_3_dependency_chain() {
    let topology = one_machine(1, 1000);
    let trace = Trace {
        jobs: vec![JobRecord {
            id: 1,
            tasks: vec![rec(1, 1000, 1, vec![]), rec(2, 1000, 1, vec![1]), rec(3, 1000, 1, vec![2])],
        }],
    };
    let sink = run(&trace, &topology, "FIFO-FIRSTFIT");

    assert_eq!(sink.tasks.len(), 3);
    let finish = |id: u64| -> i64 {
        let t = sink.tasks.iter().find(|t| t.task_id == TaskId(id)).unwrap();
        t.turnaround // submit_time is 0 throughout
    };
    let a = finish(1);
    let b = finish(2);
    let c = finish(3);
    assert!(b > a, "B (finish {b}) must finish strictly after A (finish {a})");
    assert!(c > b, "C (finish {c}) must finish strictly after B (finish {b})");

    assert_eq!(sink.jobs.len(), 1);
    assert_eq!(sink.jobs[0].critical_path_length, 3);
}

/// Scenario 4: BestFit vs WorstFit. Two machines of very different size and
/// very different speed, one task that fits on either — BestFit should pick
/// the tighter-fitting (and here, slower) machine, WorstFit the roomier
/// (faster) one. The two machines' speeds are chosen far enough apart that
/// the resulting `execution` tick counts can only match one assignment each,
/// letting the test observe which machine ran the task without needing
/// internal scheduler state.
#[test]
fn scenario_4_bestfit_vs_worstfit() {
    // 4 cores @ 500/tick/core vs 16 cores @ 2000/tick/core.
    let topology = two_machines((4, 500), (16, 2000));
    let trace = Trace { jobs: vec![JobRecord { id: 1, tasks: vec![rec(1, 2000, 2, vec![])] }] };

    let best_fit = run(&trace, &topology, "SRTF-BESTFIT");
    assert_eq!(best_fit.tasks[0].execution, 2, "BestFit should land the task on the 4-core machine");

    let worst_fit = run(&trace, &topology, "SRTF-WORSTFIT");
    assert_eq!(worst_fit.tasks[0].execution, 1, "WorstFit should land the task on the 16-core machine");
}

/// Scenario 5: Decline retry. A machine already fully occupied by a task the
/// scheduler never dispatched itself (so its capacity bookkeeping still
/// shows the machine as free) declines the scheduler's offer of a second
/// task; the scheduler's retry loop keeps re-offering it every tick, and the
/// offer only succeeds once the in-flight task actually completes and frees
/// the core. Driven directly against the kernel/processes since the
/// deliberately-stale scheduler projection this exercises isn't reachable
/// through `run_experiment`'s topology/trace wiring (which always registers
/// machines at full, accurate capacity up front).
#[test]
fn scenario_5_decline_then_retry() {
    let mut kernel = Kernel::new();
    let bus_id = ProcessId::new("bus");
    let scheduler_id = ProcessId::new("scheduler");
    let machine_id = machine_process_id(MachineId(1));

    kernel.spawn(bus_id.clone(), Box::new(dcsim_core::kernel::bus::EventBus::new()));
    let policies = PolicySet::from_name("FIFO-FIRSTFIT", 0).unwrap();
    kernel.spawn(scheduler_id.clone(), Box::new(SchedulerProcess::new(policies, bus_id, "scenario5", "scenario5-trace")));

    let descriptor = MachineDescriptor { id: MachineId(1), cpus: vec![CpuSpec { clock_rate_mhz: 1000, cores: 1 }], ethernet_speed: 1 };
    kernel.spawn(machine_id.clone(), Box::new(MachineProcess::new(descriptor.clone())));

    // An in-flight task occupying the machine's only core, injected directly
    // (bypassing the scheduler) so the scheduler never learns about it.
    let in_flight = Task::new(TaskId(1), JobId(1), OwnerId(1), 0, 3000, 1, 0, 0, 0, vec![]).into_handle();
    in_flight.borrow_mut().mark_queued(0);
    kernel.schedule(&machine_id, Message::Task(in_flight.clone()), 0).unwrap();

    // The scheduler registers the same machine at full (stale) capacity...
    kernel.schedule(&scheduler_id, Message::Resources { registered: vec![descriptor], unregistered: vec![] }, 0).unwrap();
    // ...and is handed a second task it believes will fit.
    let gated = Task::new(TaskId(2), JobId(1), OwnerId(1), 0, 1000, 1, 0, 0, 0, vec![]).into_handle();
    kernel.schedule(&scheduler_id, Message::Schedule(vec![gated.clone()]), 0).unwrap();

    kernel.run(50).unwrap();

    assert!(in_flight.borrow().finished());
    assert!(gated.borrow().finished(), "the gated task must eventually dispatch once capacity frees");
    let in_flight_finish = in_flight.borrow().times().finished_at.unwrap();
    let gated_start = gated.borrow().times().started_at.unwrap();
    assert!(
        gated_start >= in_flight_finish,
        "the gated task (started {gated_start}) must not start before the in-flight task freed its core (finished {in_flight_finish})"
    );
}

/// Scenario 6: Lottery distribution. With two equally-ticketed machines,
/// 1000 independent draws split close to 50/50 — exercised directly against
/// `LotterySelect` since neither `TaskMetric` nor `JobMetric` records which
/// machine a task ran on, so the distribution isn't observable through a
/// full `run_experiment` run. The tolerance is wide (±10%) because this is a
/// fixed-seed deterministic draw rather than a statistically tuned test.
#[test]
fn scenario_6_lottery_distribution_is_roughly_even() {
    use dcsim_core::scheduler::policy::select::LotterySelect;
    use dcsim_core::scheduler::policy::MachineSelectionPolicy;
    use dcsim_core::scheduler::SchedulerState;

    let mut state = SchedulerState::new();
    for id in [1u64, 2u64] {
        let machine_id = MachineId(id);
        state.machine_order.push(machine_id);
        state.machine_cores.insert(machine_id, 1000);
        state.machines.insert(
            machine_id,
            MachineDescriptor { id: machine_id, cpus: vec![CpuSpec { clock_rate_mhz: 1000, cores: 1000 }], ethernet_speed: 1 },
        );
    }

    let candidates = [MachineId(1), MachineId(2)];
    let task = Task::new(TaskId(1), JobId(1), OwnerId(1), 0, 1000, 1, 0, 0, 0, vec![]).into_handle();
    let mut select = LotterySelect::new(42);

    let mut counts = std::collections::HashMap::new();
    for _ in 0..1000 {
        let picked = select.select(&task, &candidates, &state).unwrap().unwrap();
        *counts.entry(picked).or_insert(0u32) += 1;
    }

    let count_1 = *counts.get(&MachineId(1)).unwrap_or(&0);
    let count_2 = *counts.get(&MachineId(2)).unwrap_or(&0);
    assert_eq!(count_1 + count_2, 1000);
    assert!(count_1 >= 400 && count_1 <= 600, "machine 1 got {count_1}/1000 draws, expected roughly half");
    assert!(count_2 >= 400 && count_2 <= 600, "machine 2 got {count_2}/1000 draws, expected roughly half");
}
