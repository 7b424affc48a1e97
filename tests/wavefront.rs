// tests/wavefront.rs

mod common;
use crate::common::{id, unmet};

use progsched::types::InstructionStatus::*;
use progsched_test_utils::{Fixture, admitted, init_tracing, run_to, try_admitted};

#[test]
fn dependant_is_promoted_when_its_precondition_succeeds() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &["A"]);
    assert_eq!(fx.status("B"), Some(Queued));

    run_to(&mut a, Successful);

    assert_eq!(fx.status("B"), Some(Scheduled));
    let handle = admitted(&mut b);
    assert_eq!(handle.id(), &id("B"));
    assert_eq!(fx.sink.statuses("B"), vec![Queued, Scheduled]);
}

#[test]
fn cancelling_a_queued_root_cancels_the_whole_chain() {
    init_tracing();
    let fx = Fixture::new();

    // Keep A queued behind an unrelated, still running instruction.
    let _gate = fx.submit("gate", &[]);
    let _a = fx.submit("A", &["gate"]);
    let mut b = fx.submit("B", &["A"]);
    let mut c = fx.submit("C", &["B"]);
    assert_eq!(fx.status("A"), Some(Queued));

    fx.cancel("A").unwrap();

    assert_eq!(fx.status("A"), Some(Cancelled));
    assert_eq!(fx.status("B"), Some(Cancelled));
    assert_eq!(fx.status("C"), Some(Cancelled));
    assert_eq!(fx.status("gate"), Some(Scheduled));

    let b_err = try_admitted(&mut b).unwrap().unwrap_err();
    assert_eq!(b_err.status, Cancelled);
    assert_eq!(b_err.details, unmet(&["A"]));
    let c_err = try_admitted(&mut c).unwrap().unwrap_err();
    assert_eq!(c_err.details, unmet(&["B"]));
}

#[test]
fn cancelling_a_scheduled_root_cancels_the_whole_chain() {
    init_tracing();
    let fx = Fixture::new();

    let _a = fx.submit("A", &[]);
    let _b = fx.submit("B", &["A"]);
    let _c = fx.submit("C", &["B"]);

    fx.cancel("A").unwrap();

    for insn in ["A", "B", "C"] {
        assert_eq!(fx.status(insn), Some(Cancelled), "{insn}");
    }
}

#[test]
fn partial_resolution_leaves_dependant_queued() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &[]);
    let mut c = fx.submit("C", &["A", "B"]);

    run_to(&mut a, Successful);
    assert_eq!(fx.status("C"), Some(Queued));
    assert!(try_admitted(&mut c).is_none());

    run_to(&mut b, Successful);
    assert_eq!(fx.status("C"), Some(Scheduled));
    admitted(&mut c);
}

#[test]
fn failure_cascades_transitively_with_per_edge_details() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &["A"]);
    let _c = fx.submit("C", &["B"]);
    let _d = fx.submit("D", &[]);

    run_to(&mut a, Failed);

    assert_eq!(fx.status("A"), Some(Failed));
    assert_eq!(fx.status("B"), Some(Cancelled));
    assert_eq!(fx.status("C"), Some(Cancelled));
    assert_eq!(fx.status("D"), Some(Scheduled));
    assert_eq!(fx.sink.last_for("B").unwrap().details, unmet(&["A"]));
    assert_eq!(fx.sink.last_for("C").unwrap().details, unmet(&["B"]));
}

#[test]
fn diamond_is_cancelled_exactly_once() {
    init_tracing();
    let fx = Fixture::new();

    //     A
    //    / \
    //   B   C
    //    \ /
    //     D
    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &["A"]);
    let _c = fx.submit("C", &["A"]);
    let mut d = fx.submit("D", &["B", "C"]);

    run_to(&mut a, Failed);

    assert_eq!(fx.status("D"), Some(Cancelled));
    assert_eq!(fx.sink.statuses("D"), vec![Queued, Cancelled]);
    assert!(try_admitted(&mut d).unwrap().is_err());
}

#[test]
fn diamond_is_promoted_exactly_once() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &["A"]);
    let mut c = fx.submit("C", &["A"]);
    let mut d = fx.submit("D", &["B", "C"]);

    run_to(&mut a, Successful);
    run_to(&mut b, Successful);
    assert_eq!(fx.status("D"), Some(Queued));
    run_to(&mut c, Successful);

    assert_eq!(fx.sink.statuses("D"), vec![Queued, Scheduled]);
    admitted(&mut d);
}

#[test]
fn one_failed_precondition_cancels_even_if_others_succeed() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &[]);
    let _c = fx.submit("C", &["A", "B"]);

    run_to(&mut a, Failed);
    assert_eq!(fx.status("C"), Some(Cancelled));

    run_to(&mut b, Successful);
    assert_eq!(fx.status("C"), Some(Cancelled));
    assert_eq!(fx.sink.statuses("C"), vec![Queued, Cancelled]);
}

#[test]
fn cancelling_a_scheduled_instruction_resolves_executed() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &["A"]);
    let mut c = fx.submit("C", &["B"]);

    run_to(&mut a, Successful);
    let b_handle = admitted(&mut b);
    fx.cancel("B").unwrap();

    assert_eq!(b_handle.status(), Cancelled);
    assert!(!b_handle.checked_execution_start());
    let result = b.executed.try_recv().unwrap();
    assert_eq!(result.status, Cancelled);
    assert!(try_admitted(&mut c).unwrap().is_err());
}
