mod commands;
mod endstop_fault;
mod queue_order;
mod threaded;

use cnc_common::config::MachineConfig;
use cnc_common::events::EventLog;
use cnc_control::moves::Tick;
use cnc_control::planner::Planner;
use cnc_control::sim::SimulatedSteppers;

pub type SimPlanner = Planner<SimulatedSteppers, EventLog>;

/// One step per unit, no feed floor.
pub fn unit_machine() -> MachineConfig {
    MachineConfig {
        steps_per_unit: [1.0; 3],
        feed_base: 1.0,
        ..MachineConfig::default()
    }
}

/// Unlocked planner on a configured simulated backend.
pub fn sim_planner(machine: &MachineConfig) -> SimPlanner {
    let mut p = Planner::new(SimulatedSteppers::new(), EventLog::new(), machine);
    assert!(p.unlock());
    p
}

/// Interleave background passes and ticks until nothing is executing.
pub fn run_until_idle(p: &mut SimPlanner) -> usize {
    let mut ticks = 0;
    loop {
        p.report_states();
        p.pre_calculate();
        if p.tick() == Tick::Idle {
            break;
        }
        ticks += 1;
        assert!(ticks < 1_000_000, "planner never went idle");
    }
    p.report_states();
    ticks
}
