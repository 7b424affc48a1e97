// tests/deadlines.rs

mod common;
use crate::common::unmet;

use std::time::Duration;

use progsched::types::{Details, InstructionStatus::*};
use progsched_test_utils::{Fixture, admitted, init_tracing, run_to, try_admitted};

#[test]
fn queued_instruction_times_out_listing_pending_preconditions() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.try_submit_in("B", Duration::from_secs(20), &[]).unwrap();
    let mut c = fx
        .try_submit_in("C", Duration::from_secs(5), &["A", "B"])
        .unwrap();
    run_to(&mut a, Successful);

    fx.clock.advance(Duration::from_secs(5));
    assert_eq!(fx.timer.fire_due(), 1);

    assert_eq!(fx.status("C"), Some(Cancelled));
    let err = try_admitted(&mut c).unwrap().unwrap_err();
    assert_eq!(err.details, unmet(&["B"]));
    assert_eq!(fx.status("B"), Some(Scheduled));
}

#[test]
fn queued_timeout_cascades_to_dependants() {
    init_tracing();
    let fx = Fixture::new();

    let _gate = fx.try_submit_in("gate", Duration::from_secs(60), &[]).unwrap();
    let _a = fx.try_submit_in("A", Duration::from_secs(1), &["gate"]).unwrap();
    let _b = fx.try_submit_in("B", Duration::from_secs(60), &["A"]).unwrap();

    fx.clock.advance(Duration::from_secs(1));
    fx.timer.fire_due();

    assert_eq!(fx.status("A"), Some(Cancelled));
    assert_eq!(fx.status("B"), Some(Cancelled));
    assert_eq!(fx.sink.last_for("B").unwrap().details, unmet(&["A"]));
    assert_eq!(fx.status("gate"), Some(Scheduled));
}

#[test]
fn scheduled_instruction_times_out_with_held_up_details() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let handle = admitted(&mut a);
    handle.execution_held_up(Some(Details::message("waiting for PCC session")));

    fx.timer.fire_all();

    assert_eq!(fx.status("A"), Some(Cancelled));
    let result = a.executed.try_recv().unwrap();
    assert_eq!(result.status, Cancelled);
    assert_eq!(result.details, Some(Details::message("waiting for PCC session")));
    assert!(!handle.checked_execution_start());
}

#[test]
fn scheduled_instruction_times_out_without_details() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _handle = admitted(&mut a);
    fx.timeout("A");

    assert_eq!(fx.sink.last_for("A").unwrap().details, None);
}

#[test]
fn executing_instruction_times_out_into_unknown() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &["A"]);
    let handle = admitted(&mut a);
    assert!(handle.checked_execution_start());

    fx.timer.fire_all();

    assert_eq!(fx.status("A"), Some(Unknown));
    assert_eq!(a.executed.try_recv().unwrap().status, Unknown);
    assert_eq!(fx.status("B"), Some(Cancelled));

    // The late report is logged but changes nothing.
    assert!(!handle.execution_completed(Successful, None));
    assert_eq!(fx.status("A"), Some(Unknown));
    assert_eq!(fx.status("B"), Some(Cancelled));
    assert_eq!(fx.sink.statuses("A"), vec![Queued, Scheduled, Executing, Unknown]);
}

#[test]
fn firing_a_deadline_twice_is_a_no_op() {
    init_tracing();
    let fx = Fixture::new();

    let _a = fx.submit("A", &[]);
    fx.timeout("A");
    fx.timeout("A");

    assert_eq!(fx.sink.statuses("A"), vec![Queued, Scheduled, Cancelled]);
}

#[test]
fn deadline_that_lost_the_cancel_race_is_a_no_op() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    run_to(&mut a, Successful);
    assert_eq!(fx.timer.pending_count(), 0);

    assert_eq!(fx.timer.force_fire_all(), 1);

    assert_eq!(fx.status("A"), Some(Successful));
    assert_eq!(
        fx.sink.statuses("A"),
        vec![Queued, Scheduled, Executing, Successful]
    );
}

#[test]
fn settling_cancels_the_deadline() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &[]);
    let _c = fx.submit("C", &[]);
    assert_eq!(fx.timer.pending_count(), 3);

    // Executing keeps the deadline armed.
    let handle = admitted(&mut a);
    assert!(handle.checked_execution_start());
    assert_eq!(fx.timer.pending_count(), 3);

    assert!(handle.execution_completed(Failed, None));
    fx.cancel("B").unwrap();
    assert_eq!(fx.timer.pending_count(), 1);
}

#[test]
fn deadline_for_unknown_instruction_is_ignored() {
    init_tracing();
    let fx = Fixture::new();

    fx.timeout("ghost");
    assert!(fx.scheduler.is_empty());
    assert!(fx.sink.events().is_empty());
}

#[test]
fn deadline_after_clean_is_ignored() {
    init_tracing();
    let fx = Fixture::new();

    let _a = fx.submit("A", &[]);
    fx.cancel("A").unwrap();
    assert!(fx.clean(&["A"]).is_empty());

    assert_eq!(fx.timer.force_fire_all(), 1);
    assert_eq!(fx.status("A"), None);
}

#[test]
fn deadline_after_scheduler_drop_does_nothing() {
    init_tracing();
    let fx = Fixture::new();
    let a = fx.submit("A", &[]);

    let Fixture {
        timer, scheduler, ..
    } = fx;
    drop(a);
    drop(scheduler);

    assert_eq!(timer.fire_all(), 1);
}
