// src/engine/runner.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::PlannedInstruction;
use crate::exec::ExecutorBackend;
use crate::scheduler::{InstructionScheduler, Submission};
use crate::time::Clock;
use crate::types::{Details, InstructionId, InstructionStatus};

use super::report::{RunOutcome, RunReport};

/// Stand-in for deadlines too far away to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Submits a plan to an instruction scheduler and drives every admitted
/// instruction through an `ExecutorBackend`.
pub struct PlanRunner<E: ExecutorBackend> {
    scheduler: InstructionScheduler,
    clock: Arc<dyn Clock>,
    executor: Arc<E>,
}

impl<E: ExecutorBackend> fmt::Debug for PlanRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanRunner")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> PlanRunner<E> {
    pub fn new(scheduler: InstructionScheduler, clock: Arc<dyn Clock>, executor: Arc<E>) -> Self {
        Self {
            scheduler,
            clock,
            executor,
        }
    }

    pub fn scheduler(&self) -> &InstructionScheduler {
        &self.scheduler
    }

    /// Run `plan` to completion.
    ///
    /// - Submits every instruction in order (preconditions must come first),
    ///   with its deadline relative to the moment of submission.
    /// - Hands each admitted instruction to the executor.
    /// - Waits until every instruction settled, then cleans the graph.
    pub async fn run(&self, plan: &[PlannedInstruction]) -> RunReport {
        info!(
            queue = %self.scheduler.queue_id(),
            instructions = plan.len(),
            "running instruction plan"
        );

        let mut report = RunReport::default();
        let mut trackers = JoinSet::new();

        for planned in plan {
            let deadline = deadline_after(self.clock.now(), planned.deadline);
            let submitted = self.scheduler.schedule_instruction(
                planned.id.clone(),
                deadline,
                planned.after.iter().cloned(),
            );

            match submitted {
                Ok(submission) => {
                    let executor = Arc::clone(&self.executor);
                    trackers.spawn(track(submission, planned.clone(), executor));
                }
                Err(err) => {
                    warn!(instruction = %planned.id, error = %err, "instruction rejected");
                    report
                        .outcomes
                        .insert(planned.id.clone(), RunOutcome::Rejected(err));
                }
            }
        }

        while let Some(joined) = trackers.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    debug!(instruction = %id, ?outcome, "instruction settled");
                    report.outcomes.insert(id, outcome);
                }
                Err(err) => error!(error = %err, "instruction tracker failed"),
            }
        }

        // Trackers that panicked never reported back.
        for planned in plan {
            report
                .outcomes
                .entry(planned.id.clone())
                .or_insert(RunOutcome::Abandoned);
        }

        let resident: Vec<InstructionId> = report
            .outcomes
            .iter()
            .filter(|(_, outcome)| !matches!(outcome, RunOutcome::Rejected(_)))
            .map(|(id, _)| id.clone())
            .collect();
        report.unflushed = self.scheduler.clean_instructions(resident);
        if !report.unflushed.is_empty() {
            warn!(unflushed = ?report.unflushed, "instructions left in the graph");
        }

        info!(summary = ?report.summary(), "instruction plan finished");
        report
    }
}

fn deadline_after(now: Instant, deadline: Duration) -> Instant {
    now.checked_add(deadline)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Follow one submission until it settles.
async fn track<E: ExecutorBackend>(
    submission: Submission,
    planned: PlannedInstruction,
    executor: Arc<E>,
) -> (InstructionId, RunOutcome) {
    let Submission {
        id,
        admitted,
        executed,
    } = submission;

    let instruction = match admitted.await {
        Ok(Ok(instruction)) => instruction,
        Ok(Err(not_admitted)) => {
            info!(instruction = %id, error = %not_admitted, "instruction not admitted");
            return (id, RunOutcome::NotAdmitted(not_admitted));
        }
        Err(_) => {
            warn!(instruction = %id, "admission signal dropped");
            return (id, RunOutcome::Abandoned);
        }
    };

    if let Err(err) = executor.execute(instruction.clone(), planned).await {
        error!(instruction = %id, error = %err, "executor failed");
        if instruction.status() == InstructionStatus::Executing {
            instruction.execution_completed(
                InstructionStatus::Failed,
                Some(Details::message(err.to_string())),
            );
        }
    }

    match executed.await {
        Ok(result) => (id, RunOutcome::Executed(result)),
        Err(_) => {
            warn!(instruction = %id, "execution signal dropped");
            (id, RunOutcome::Abandoned)
        }
    }
}
