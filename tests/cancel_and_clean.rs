// tests/cancel_and_clean.rs

mod common;
use crate::common::id;

use progsched::errors::{CancelError, SchedulerError};
use progsched::types::InstructionStatus::*;
use progsched_test_utils::recording::StoreOp;
use progsched_test_utils::{DEFAULT_DEADLINE, Fixture, TEST_QUEUE, admitted, init_tracing, run_to};

#[test]
fn cancel_unknown_instruction() {
    init_tracing();
    let fx = Fixture::new();

    assert_eq!(
        fx.cancel("ghost"),
        Err(CancelError::UnknownInstruction(id("ghost")))
    );
}

#[test]
fn cancel_is_refused_once_executing() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let handle = admitted(&mut a);
    assert!(handle.checked_execution_start());

    assert_eq!(
        fx.cancel("A"),
        Err(CancelError::UncancellableInstruction {
            id: id("A"),
            status: Executing,
        })
    );
    assert_eq!(fx.status("A"), Some(Executing));
}

#[test]
fn cancel_is_refused_once_terminal() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &[]);
    run_to(&mut a, Successful);
    fx.cancel("B").unwrap();

    assert!(matches!(
        fx.cancel("A"),
        Err(CancelError::UncancellableInstruction { status: Successful, .. })
    ));
    assert!(matches!(
        fx.cancel("B"),
        Err(CancelError::UncancellableInstruction { status: Cancelled, .. })
    ));
    assert_eq!(fx.sink.statuses("B"), vec![Queued, Scheduled, Cancelled]);
}

#[test]
fn explicit_cancel_has_no_details() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    fx.cancel("A").unwrap();

    assert_eq!(fx.sink.last_for("A").unwrap().details, None);
    let result = a.executed.try_recv().unwrap();
    assert_eq!(result.status, Cancelled);
    assert_eq!(result.details, None);
}

#[test]
fn clean_reports_unknown_ids() {
    init_tracing();
    let fx = Fixture::new();

    assert_eq!(fx.clean(&["ghost"]), vec!["ghost"]);
}

#[test]
fn clean_is_restrictive() {
    init_tracing();
    let fx = Fixture::new();

    // Queued
    let _gate = fx.submit("gate", &[]);
    let _queued = fx.submit("queued", &["gate"]);
    // Executing
    let mut executing = fx.submit("executing", &[]);
    let handle = admitted(&mut executing);
    assert!(handle.checked_execution_start());
    // Unknown
    let mut unknown = fx.submit("unknown", &[]);
    assert!(admitted(&mut unknown).checked_execution_start());
    fx.timeout("unknown");

    let ops_before = fx.store.ops().len();
    let unflushed = fx.clean(&["gate", "queued", "executing", "unknown"]);

    assert_eq!(unflushed, vec!["executing", "gate", "queued", "unknown"]);
    assert_eq!(fx.scheduler.len(), 4);
    assert_eq!(fx.store.ops().len(), ops_before);
    assert_eq!(fx.scheduler.dependants_of(&id("gate")), Some(vec![id("queued")]));
    assert_eq!(fx.scheduler.dependencies_of(&id("queued")), Some(vec![id("gate")]));
}

#[test]
fn clean_removes_terminal_instructions_and_their_edges() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &["A"]);
    let _c = fx.submit("C", &["B"]);
    run_to(&mut a, Successful);

    assert!(fx.clean(&["A"]).is_empty());

    assert_eq!(fx.status("A"), None);
    assert_eq!(fx.scheduler.dependencies_of(&id("B")), Some(vec![]));
    assert_eq!(fx.scheduler.dependants_of(&id("B")), Some(vec![id("C")]));
    assert!(fx.store.ops().contains(&StoreOp::Remove(id("A"))));
    assert!(fx.store.memory().record(TEST_QUEUE, &id("A")).is_none());
}

#[test]
fn clean_of_a_dependant_detaches_it_from_its_preconditions() {
    init_tracing();
    let fx = Fixture::new();

    let _gate = fx.submit("gate", &[]);
    let _a = fx.submit("A", &["gate"]);
    fx.cancel("A").unwrap();

    assert!(fx.clean(&["A"]).is_empty());
    assert_eq!(fx.scheduler.dependants_of(&id("gate")), Some(vec![]));
}

#[test]
fn cleaned_precondition_does_not_block_promotion() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let mut b = fx.submit("B", &[]);
    let mut c = fx.submit("C", &["A", "B"]);
    run_to(&mut a, Successful);
    assert!(fx.clean(&["A"]).is_empty());

    run_to(&mut b, Successful);

    assert_eq!(fx.status("C"), Some(Scheduled));
    admitted(&mut c);
}

#[test]
fn cleaned_id_can_be_reused() {
    init_tracing();
    let fx = Fixture::new();

    let _a = fx.submit("A", &[]);
    fx.cancel("A").unwrap();
    assert!(fx.clean(&["A"]).is_empty());

    let _again = fx.submit("A", &[]);
    assert_eq!(fx.status("A"), Some(Scheduled));
}

#[test]
fn clean_is_per_id() {
    init_tracing();
    let fx = Fixture::new();

    let mut a = fx.submit("A", &[]);
    let _b = fx.submit("B", &[]);
    run_to(&mut a, Failed);

    assert_eq!(fx.clean(&["A", "B", "ghost"]), vec!["B", "ghost"]);
    assert_eq!(fx.scheduler.instruction_ids(), vec![id("B")]);
}

#[test]
fn shutdown_cancels_pending_work_and_drops_the_queue() {
    init_tracing();
    let fx = Fixture::new();

    let mut done = fx.submit("done", &[]);
    run_to(&mut done, Successful);
    let mut running = fx.submit("running", &[]);
    assert!(admitted(&mut running).checked_execution_start());
    let _scheduled = fx.submit("scheduled", &["done"]);
    let _queued = fx.submit("queued", &["running"]);

    fx.scheduler.shutdown();

    assert_eq!(fx.status("done"), Some(Successful));
    assert_eq!(fx.status("running"), Some(Executing));
    assert_eq!(fx.status("scheduled"), Some(Cancelled));
    assert_eq!(fx.status("queued"), Some(Cancelled));
    assert_eq!(fx.scheduler.len(), 4);
    assert_eq!(
        fx.store.ops().last(),
        Some(&StoreOp::RemoveQueue(TEST_QUEUE.to_string()))
    );
    assert!(!fx.store.memory().has_queue(TEST_QUEUE));
}

#[test]
fn shut_down_queue_rejects_submissions_and_leaves_the_store_alone() {
    init_tracing();
    let fx = Fixture::new();

    let mut running = fx.submit("running", &[]);
    let handle = admitted(&mut running);
    assert!(handle.checked_execution_start());

    fx.scheduler.shutdown();
    let ops_at_shutdown = fx.store.ops().len();

    assert_eq!(
        fx.try_submit_in("late", DEFAULT_DEADLINE, &[]).unwrap_err(),
        SchedulerError::QueueClosed(id("late"))
    );
    assert_eq!(fx.status("late"), None);

    // Finishing and cleaning after shutdown only reaches the sink.
    assert!(handle.execution_completed(Successful, None));
    assert!(fx.clean(&["running"]).is_empty());

    assert_eq!(fx.store.ops().len(), ops_at_shutdown);
    assert_eq!(
        fx.sink.statuses("running"),
        vec![Queued, Scheduled, Executing, Successful]
    );
}
