//! Integration test: admission, ordering and recycling across many actions.

use cnc_common::error::{Admission, PlannerError};
use cnc_common::consts::QUEUE_SIZE;
use cnc_common::events::HostEvent;
use cnc_control::moves::FeedProfile;
use cnc_control::planner::ActionState;

use super::{run_until_idle, sim_planner, unit_machine};

fn feed() -> FeedProfile {
    FeedProfile::constant(600.0)
}

#[test]
fn terminal_events_follow_enqueue_order() {
    let mut p = sim_planner(&unit_machine());
    let mut admitted = Vec::new();
    let mut id = 0;
    for round in 0..5 {
        while p.free_slots() > 0 {
            let result = if id % 4 == 3 {
                p.enqueue_tool(1, id % 8 == 3, id)
            } else {
                let delta = [(round + 1) as f64, -(id % 3) as f64, 0.0];
                p.enqueue_line(delta, feed(), id)
            };
            if result == Ok(Admission::Queued) {
                admitted.push(id);
            }
            id += 1;
        }
        assert_eq!(p.enqueue_tool(0, true, -1), Err(PlannerError::NoMem));
        run_until_idle(&mut p);
    }
    assert_eq!(p.events().terminal_ids(), admitted);
    assert_eq!(p.used_count(), 0);
    assert_eq!(p.free_slots(), QUEUE_SIZE - 1);
}

#[test]
fn every_admitted_action_has_exactly_one_terminal_event() {
    let mut p = sim_planner(&unit_machine());
    for id in 0..40 {
        while p.free_slots() == 0 {
            p.report_states();
            p.pre_calculate();
            p.tick();
        }
        p.enqueue_line([1.0, 1.0, 0.0], feed(), id).unwrap();
    }
    run_until_idle(&mut p);
    for id in 0..40 {
        let queued = p.events().count(HostEvent::Queued(id));
        let completed = p.events().count(HostEvent::Completed(id));
        assert_eq!((queued, completed), (1, 1), "action {id}");
    }
    assert_eq!(p.position().pos, [40, 40, 0]);
    assert_eq!(p.hal().position(), [40, 40, 0]);
}

#[test]
fn free_slots_never_underflow_when_full() {
    let mut p = sim_planner(&unit_machine());
    for id in 0..(QUEUE_SIZE as i32 - 1) {
        p.enqueue_line([10.0, 0.0, 0.0], feed(), id).unwrap();
    }
    assert_eq!(p.free_slots(), 0);
    let snapshot: Vec<_> = p.states().collect();
    for attempt in 0..5 {
        assert_eq!(
            p.enqueue_line([1.0, 0.0, 0.0], feed(), 100 + attempt),
            Err(PlannerError::NoMem)
        );
    }
    assert_eq!(p.states().collect::<Vec<_>>(), snapshot);
    assert_eq!(snapshot[0].1, ActionState::Started);
}

#[test]
fn background_pass_prepares_ahead_of_execution() {
    let mut p = sim_planner(&unit_machine());
    p.enqueue_line([3.0, 0.0, 0.0], feed(), 1).unwrap();
    p.enqueue_line([3.0, 0.0, 0.0], feed(), 2).unwrap();
    p.enqueue_tool(0, true, 3).unwrap();
    p.pre_calculate();
    let states: Vec<_> = p.states().map(|(_, s)| s).collect();
    assert_eq!(
        states,
        vec![
            ActionState::Started,
            ActionState::Prepared,
            ActionState::Prepared
        ]
    );
}

#[test]
fn mixed_program_reaches_target() {
    let mut p = sim_planner(&unit_machine());
    let moves = [
        [5.0, 0.0, 0.0],
        [0.0, 5.0, -2.0],
        [-2.5, -2.5, 1.0],
        [0.0, 0.0, 0.0],
    ];
    for (id, delta) in moves.iter().enumerate() {
        p.enqueue_line(*delta, feed(), id as i32).unwrap();
    }
    run_until_idle(&mut p);
    // -2.5 rounds away from zero.
    assert_eq!(p.position().pos, [2, 2, -1]);
    assert_eq!(p.events().count(HostEvent::Dropped(3)), 1);
    assert_eq!(p.events().terminal_ids(), vec![0, 1, 2]);
}
