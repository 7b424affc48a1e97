// tests/concurrency.rs

mod common;
use crate::common::id;

use std::collections::BTreeSet;
use std::thread;

use progsched::scheduler::Submission;
use progsched::time::Clock;
use progsched::types::InstructionStatus::*;
use progsched_test_utils::{DEFAULT_DEADLINE, Fixture, admitted, init_tracing, run_to, try_admitted};

const WORKERS: usize = 8;
const PER_WORKER: usize = 25;

#[test]
fn submissions_racing_a_completion_are_never_stranded() {
    init_tracing();
    let fx = Fixture::new();
    let deadline = fx.clock.now() + DEFAULT_DEADLINE;

    let mut root = fx.submit("root", &[]);
    let handle = admitted(&mut root);
    assert!(handle.checked_execution_start());

    let scheduler = &fx.scheduler;
    let mut submissions: Vec<Submission> = thread::scope(|s| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|t| {
                s.spawn(move || {
                    (0..PER_WORKER)
                        .map(|i| {
                            scheduler
                                .schedule_instruction(
                                    id(&format!("dep-{t}-{i}")),
                                    deadline,
                                    [id("root")],
                                )
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        s.spawn(|| assert!(handle.execution_completed(Successful, None)));
        workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect()
    });

    assert_eq!(submissions.len(), WORKERS * PER_WORKER);
    for submission in &mut submissions {
        assert_eq!(fx.scheduler.status_of(&submission.id), Some(Scheduled));
        admitted(submission);
        assert_eq!(fx.sink.statuses(submission.id.as_str()), vec![Queued, Scheduled]);
    }
}

#[test]
fn cancels_racing_a_failure_settle_each_dependant_once() {
    init_tracing();
    let fx = Fixture::new();

    let mut root = fx.submit("root", &[]);
    let names: Vec<String> = (0..WORKERS * PER_WORKER).map(|i| format!("dep-{i}")).collect();
    let _deps: Vec<Submission> = names.iter().map(|n| fx.submit(n, &["root"])).collect();
    let handle = admitted(&mut root);
    assert!(handle.checked_execution_start());

    thread::scope(|s| {
        for chunk in names.chunks(PER_WORKER) {
            let fx = &fx;
            s.spawn(move || {
                for name in chunk {
                    // Losing the race to the cascade is fine.
                    let _ = fx.cancel(name);
                }
            });
        }
        s.spawn(|| assert!(handle.execution_completed(Failed, None)));
    });

    for name in &names {
        assert_eq!(fx.status(name), Some(Cancelled));
        assert_eq!(fx.sink.statuses(name), vec![Queued, Cancelled]);
    }
}

#[test]
fn independent_chains_run_and_clean_in_parallel() {
    init_tracing();
    let fx = Fixture::new();

    thread::scope(|s| {
        for t in 0..WORKERS {
            let fx = &fx;
            s.spawn(move || {
                let names: Vec<String> = (0..PER_WORKER).map(|i| format!("chain-{t}-{i}")).collect();
                let mut submissions: Vec<Submission> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| match i {
                        0 => fx.submit(name, &[]),
                        _ => fx.submit(name, &[names[i - 1].as_str()]),
                    })
                    .collect();

                for submission in &mut submissions {
                    run_to(submission, Successful);
                }

                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                assert!(fx.clean(&names).is_empty());
            });
        }
    });

    assert!(fx.scheduler.is_empty());
    let seen: BTreeSet<String> = fx
        .sink
        .events()
        .into_iter()
        .filter(|e| e.status == Successful)
        .map(|e| e.id.as_str().to_string())
        .collect();
    assert_eq!(seen.len(), WORKERS * PER_WORKER);
}

#[test]
fn dependant_of_a_failed_and_cleaned_precondition_is_never_scheduled() {
    init_tracing();

    for _ in 0..2_000 {
        let fx = Fixture::new();
        let mut a = fx.submit("A", &[]);
        let handle = admitted(&mut a);
        assert!(handle.checked_execution_start());

        let submitted = thread::scope(|s| {
            let submit = s.spawn(|| {
                fx.scheduler
                    .schedule_instruction(id("B"), fx.clock.now() + DEFAULT_DEADLINE, [id("A")])
            });
            s.spawn(|| assert!(handle.execution_completed(Failed, None)));
            s.spawn(|| {
                while !fx.clean(&["A"]).is_empty() {
                    thread::yield_now();
                }
            });
            submit.join().unwrap()
        });

        // Rejected outright, or admitted and then cancelled.
        match submitted {
            Ok(mut b) => {
                assert_eq!(fx.status("B"), Some(Cancelled));
                assert!(matches!(try_admitted(&mut b), Some(Err(_))));
            }
            Err(_) => assert_eq!(fx.status("B"), None),
        }
    }
}
