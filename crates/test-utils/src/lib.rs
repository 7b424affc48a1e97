pub mod builders;
pub mod fake_executor;
pub mod recording;
pub mod time;

use std::sync::{Arc, Once};
use std::time::Duration;

use progsched::errors::{NotAdmitted, SchedulerError};
use progsched::scheduler::{Instruction, InstructionScheduler, SchedulerServices, Submission};
use progsched::time::Clock;
use progsched::types::{InstructionId, InstructionStatus};
use tokio::sync::oneshot::error::TryRecvError;
use tracing_subscriber::{fmt, EnvFilter};

use crate::recording::{RecordingSink, RecordingStore};
use crate::time::{ManualClock, ManualTimer};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

pub const TEST_QUEUE: &str = "test-queue";

/// Deadline used by [`Fixture::submit`].
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// A scheduler wired to a manual clock/timer and recording collaborators.
#[derive(Debug)]
pub struct Fixture {
    pub clock: ManualClock,
    pub timer: ManualTimer,
    pub store: Arc<RecordingStore>,
    pub sink: Arc<RecordingSink>,
    pub scheduler: InstructionScheduler,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = ManualClock::new();
        let timer = ManualTimer::new(clock.clone());
        let store = Arc::new(RecordingStore::new());
        let sink = Arc::new(RecordingSink::new());

        let services = SchedulerServices {
            clock: Arc::new(clock.clone()),
            timer: Arc::new(timer.clone()),
            store: store.clone(),
            sink: sink.clone(),
        };
        let scheduler = InstructionScheduler::new(TEST_QUEUE, services);

        Self {
            clock,
            timer,
            store,
            sink,
            scheduler,
        }
    }

    /// Submit `id` with a deadline `in` from now.
    pub fn try_submit_in(
        &self,
        id: &str,
        within: Duration,
        after: &[&str],
    ) -> Result<Submission, SchedulerError> {
        let deadline = self.clock.now() + within;
        self.scheduler.schedule_instruction(
            InstructionId::from(id),
            deadline,
            after.iter().map(|a| InstructionId::from(*a)),
        )
    }

    /// Submit `id` with [`DEFAULT_DEADLINE`], panicking on rejection.
    pub fn submit(&self, id: &str, after: &[&str]) -> Submission {
        self.try_submit_in(id, DEFAULT_DEADLINE, after)
            .unwrap_or_else(|err| panic!("submitting {id} failed: {err}"))
    }

    pub fn status(&self, id: &str) -> Option<InstructionStatus> {
        self.scheduler.status_of(&InstructionId::from(id))
    }

    pub fn cancel(&self, id: &str) -> Result<(), progsched::errors::CancelError> {
        self.scheduler.cancel_instruction(&InstructionId::from(id))
    }

    pub fn clean(&self, ids: &[&str]) -> Vec<String> {
        self.scheduler
            .clean_instructions(ids.iter().map(|id| InstructionId::from(*id)))
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    pub fn timeout(&self, id: &str) {
        self.scheduler.handle_timeout(&InstructionId::from(id));
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking look at the "admitted" signal.
///
/// `None` while the instruction is still queued.
pub fn try_admitted(submission: &mut Submission) -> Option<Result<Instruction, NotAdmitted>> {
    match submission.admitted.try_recv() {
        Ok(result) => Some(result),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Closed) => panic!("admission signal of {} dropped", submission.id),
    }
}

/// Take the executor handle, panicking if the instruction was not admitted.
pub fn admitted(submission: &mut Submission) -> Instruction {
    match try_admitted(submission) {
        Some(Ok(instruction)) => instruction,
        Some(Err(err)) => panic!("{} not admitted: {err}", submission.id),
        None => panic!("{} still waiting for admission", submission.id),
    }
}

/// Admit, start and complete an instruction in one go.
pub fn run_to(submission: &mut Submission, status: InstructionStatus) -> Instruction {
    let instruction = admitted(submission);
    assert!(instruction.checked_execution_start());
    assert!(instruction.execution_completed(status, None));
    instruction
}
