//! Integration test: host sessions through the command dispatcher.

use cnc_common::axis::Axis;
use cnc_common::events::HostEvent;
use cnc_control::command::{CommandError, Dispatcher, Reply};

use super::{SimPlanner, run_until_idle, sim_planner, unit_machine};

fn session() -> (Dispatcher, SimPlanner) {
    let machine = unit_machine();
    (Dispatcher::new(&machine), sim_planner(&machine))
}

#[test]
fn program_runs_to_completion() {
    let (d, mut p) = session();
    let program = "\
        N1 M3 T1\n\
        N2 G1 X1000 F1200\n\
        N3 G1 Y500 F1200 P100 L100 T20\n\
        N4 G2 X-1000 D300 F600\n\
        N5 M5 T1\n";
    for line in program.lines() {
        assert!(d.execute_line(&mut p, line).is_ok(), "{line}");
    }
    run_until_idle(&mut p);
    assert_eq!(p.events().terminal_ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(p.position().pos, [0, 5, 0]);
    assert_eq!(p.hal().tool(1), Some(false));
    assert_eq!(
        d.execute_line(&mut p, "N6 M114"),
        Ok(Reply::Position(6, [0, 5, 0]))
    );
}

#[test]
fn protocol_error_halts_motion() {
    let (d, mut p) = session();
    d.execute_line(&mut p, "N1 G1 X2000 F600").unwrap();
    d.execute_line(&mut p, "N2 G1 Y2000 F600").unwrap();
    for _ in 0..3 {
        p.tick();
    }
    let err = d.execute_line(&mut p, "N3 M42").unwrap_err();
    assert_eq!(err.id(), Some(3));
    assert!(p.is_locked());
    p.report_states();
    assert_eq!(p.events().count(HostEvent::Failed(1)), 1);
    assert_eq!(p.events().count(HostEvent::Completed(2)), 0);
    assert_eq!(p.position().pos, [3, 0, 0]);

    // Host recovers explicitly.
    assert_eq!(d.execute_line(&mut p, "N4 M800"), Ok(Reply::Ok(4)));
    assert_eq!(d.execute_line(&mut p, "N5 G1 X100"), Ok(Reply::Planned(5)));
}

#[test]
fn homing_session() {
    let (d, mut p) = session();
    d.execute_line(&mut p, "N1 M802").unwrap();
    d.execute_line(&mut p, "N2 G1 Z-500 F600").unwrap();
    p.tick();
    p.hal_mut().set_endstop(Axis::Z, true);
    run_until_idle(&mut p);
    assert!(!p.is_locked());
    assert_eq!(p.events().terminal_ids(), vec![2]);

    assert_eq!(d.execute_line(&mut p, "N3 M997"), Ok(Reply::Ok(3)));
    assert_eq!(d.execute_line(&mut p, "N4 M803"), Ok(Reply::Ok(4)));
    assert_eq!(
        d.execute_line(&mut p, "N5 M119").map(|r| r.to_string()),
        Ok("ok N5 EX:0 EY:0 EZ:1 EP:0".to_string())
    );
    assert_eq!(
        d.execute_line(&mut p, "N6 M114"),
        Ok(Reply::Position(6, [0, 0, 0]))
    );
}

#[test]
fn missing_number_is_reported_without_id() {
    let (d, mut p) = session();
    let err = d.execute_line(&mut p, "G0 X1").unwrap_err();
    assert_eq!(err, CommandError::MissingLineNumber);
    assert_eq!(err.id(), None);
    assert_eq!(err.to_string(), "no command number specified");
    assert!(p.is_locked());
}
