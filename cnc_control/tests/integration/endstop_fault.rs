//! Integration test: endstop faults, homing and lock recovery.
//!
//! 1. A limit switch hit with the fail policy on fails the action and locks.
//! 2. The same hit with the policy off completes it (homing).
//! 3. Unlock restores admission.

use cnc_common::axis::Axis;
use cnc_common::config::MachineConfig;
use cnc_common::error::PlannerError;
use cnc_common::events::{EventLog, HostEvent};
use cnc_control::moves::{FeedProfile, Tick};
use cnc_control::planner::Planner;
use cnc_control::sim::SimulatedSteppers;

use super::{SimPlanner, run_until_idle, unit_machine};

fn feed() -> FeedProfile {
    FeedProfile::constant(600.0)
}

/// Backend with an X limit switch 5 steps below the origin.
fn with_x_limit(machine: &MachineConfig) -> SimPlanner {
    let hal = SimulatedSteppers::new().with_min_limit(Axis::X, -5);
    let mut p = Planner::new(hal, EventLog::new(), machine);
    assert!(p.unlock());
    p
}

#[test]
fn limit_hit_fails_action_and_locks() {
    let mut p = with_x_limit(&unit_machine());
    p.enqueue_line([-20.0, 0.0, 0.0], feed(), 1).unwrap();
    p.enqueue_line([0.0, 3.0, 0.0], feed(), 2).unwrap();
    run_until_idle(&mut p);

    assert!(p.is_locked());
    assert_eq!(p.events().count(HostEvent::Failed(1)), 1);
    assert_eq!(p.events().terminal_ids(), vec![1]);
    // Stopped on the switch, nothing beyond it.
    assert_eq!(p.position().pos, [-5, 0, 0]);
    assert_eq!(p.hal().position(), [-5, 0, 0]);
    assert_eq!(p.hal().line_errors(), 1);
    assert_eq!(p.active_count(), 0);
    assert_eq!(p.used_count(), 0);

    assert_eq!(
        p.enqueue_line([1.0, 0.0, 0.0], feed(), 3),
        Err(PlannerError::Locked)
    );
}

#[test]
fn recovery_after_unlock() {
    let mut p = with_x_limit(&unit_machine());
    p.enqueue_line([-20.0, 0.0, 0.0], feed(), 1).unwrap();
    run_until_idle(&mut p);
    assert!(p.is_locked());

    assert!(p.unlock());
    // Backing off the switch is allowed: it only trips on negative motion.
    p.enqueue_line([10.0, 0.0, 0.0], feed(), 2).unwrap();
    run_until_idle(&mut p);
    assert_eq!(p.events().count(HostEvent::Completed(2)), 1);
    assert_eq!(p.position().pos, [5, 0, 0]);
}

#[test]
fn homing_with_fail_policy_off() {
    let machine = MachineConfig {
        fail_on_endstops: false,
        ..unit_machine()
    };
    let mut p = with_x_limit(&machine);
    p.enqueue_line([-100.0, 0.0, 0.0], feed(), 1).unwrap();
    p.enqueue_line([2.0, 0.0, 0.0], feed(), 2).unwrap();
    run_until_idle(&mut p);

    assert!(!p.is_locked());
    assert_eq!(p.events().terminal_ids(), vec![1, 2]);
    assert_eq!(p.events().count(HostEvent::Failed(1)), 0);
    // Logical position takes the full request; the machine stopped early.
    assert_eq!(p.position().pos, [-98, 0, 0]);
    assert_eq!(p.hal().position(), [-3, 0, 0]);

    // Re-zero at the switch.
    assert!(p.set_position([0, 0, 0]));
    p.reset_flags();
    assert_eq!(p.position().pos, [0, 0, 0]);
}

#[test]
fn fault_during_queue_discards_pending_silently() {
    let mut p = with_x_limit(&unit_machine());
    p.enqueue_line([-2.0, 0.0, 0.0], feed(), 1).unwrap();
    p.enqueue_line([-20.0, 0.0, 0.0], feed(), 2).unwrap();
    p.enqueue_tool(0, true, 3).unwrap();
    run_until_idle(&mut p);

    assert_eq!(
        p.events().events(),
        &[
            HostEvent::Queued(1),
            HostEvent::Queued(2),
            HostEvent::Queued(3),
            HostEvent::Started(1),
            HostEvent::Completed(1),
            HostEvent::Started(2),
            HostEvent::Failed(2),
        ]
    );
    assert_eq!(p.hal().tool(0), None);
}

#[test]
fn probe_break_is_a_fault() {
    let mut p = super::sim_planner(&unit_machine());
    p.set_break_on_probe(true);
    p.enqueue_line([0.0, 0.0, 4.0], feed(), 1).unwrap();
    assert!(matches!(p.tick(), Tick::Delay(_)));
    p.hal_mut().set_probe(true);
    assert_eq!(p.tick(), Tick::Break);
    assert!(p.is_locked());
    p.report_states();
    assert_eq!(p.events().terminal_ids(), vec![1]);
    assert_eq!(p.position().pos, [0, 0, 1]);
}
