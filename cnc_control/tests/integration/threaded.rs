//! Integration test: three execution contexts on real threads.

use std::thread;
use std::time::{Duration, Instant};

use cnc_common::events::EventLog;
use cnc_control::command::Dispatcher;
use cnc_control::moves::FeedProfile;
use cnc_control::planner::Planner;
use cnc_control::runtime::{Runtime, Timing};
use cnc_control::shared::SharedPlanner;
use cnc_control::sim::SimulatedSteppers;

use super::unit_machine;

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let end = Instant::now() + deadline;
    while !done() {
        assert!(Instant::now() < end, "timed out");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn producer_with_flow_control() {
    let machine = unit_machine();
    let mut planner = Planner::new(SimulatedSteppers::new(), EventLog::new(), &machine);
    assert!(planner.unlock());
    let shared: SharedPlanner<_, _> = SharedPlanner::new(planner);
    let dispatcher = Dispatcher::new(&machine);
    let runtime = Runtime::spawn(&shared, Timing::new(1, 1.0)).unwrap();

    for id in 1..=30 {
        wait_until(Duration::from_secs(5), || {
            shared.with(|p| p.free_slots() > 0)
        });
        let line = format!("N{id} G1 X200 Y-100 F6000 P6000 L6000");
        shared
            .with(|p| dispatcher.execute_line(p, &line))
            .unwrap();
    }
    wait_until(Duration::from_secs(5), || shared.with(|p| p.used_count() == 0));
    runtime.shutdown();

    shared.with(|p| {
        assert_eq!(p.events().terminal_ids(), (1..=30).collect::<Vec<_>>());
        assert_eq!(p.position().pos, [60, -30, 0]);
        assert_eq!(p.hal().position(), [60, -30, 0]);
        assert!(!p.is_locked());
    });
}

#[test]
fn lock_from_producer_stops_tick_thread() {
    let machine = unit_machine();
    let mut planner = Planner::new(SimulatedSteppers::new(), EventLog::new(), &machine);
    assert!(planner.unlock());
    let shared: SharedPlanner<_, _> = SharedPlanner::new(planner);
    // 10 ms per delay unit keeps the line running while we lock.
    let runtime = Runtime::spawn(&shared, Timing::new(10_000, 1.0)).unwrap();

    shared.with(|p| {
        p.enqueue_line([1000.0, 0.0, 0.0], FeedProfile::constant(600.0), 1)
            .unwrap();
    });
    thread::sleep(Duration::from_millis(30));
    shared.with(|p| p.lock());
    wait_until(Duration::from_secs(5), || shared.with(|p| p.used_count() == 0));
    runtime.shutdown();

    shared.with(|p| {
        assert!(p.is_locked());
        assert_eq!(p.events().terminal_ids(), vec![1]);
        let x = p.position().pos[0];
        assert!(x > 0 && x < 1000, "x = {x}");
        assert_eq!(p.hal().position()[0], x);
    });
}
