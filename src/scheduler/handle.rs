// src/scheduler/handle.rs

//! Handles given out to submitters and executors.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::errors::NotAdmitted;
use crate::scheduler::instruction::InstructionNode;
use crate::scheduler::core::SchedulerCore;
use crate::types::{Details, ExecutionResult, InstructionId, InstructionStatus};

/// Executor-facing handle of an instruction that became `Scheduled`.
///
/// The executor calls [`checked_execution_start`](Self::checked_execution_start)
/// before doing any work and reports the outcome through
/// [`execution_completed`](Self::execution_completed).
#[derive(Clone)]
pub struct Instruction {
    node: Arc<InstructionNode>,
    core: Arc<SchedulerCore>,
}

impl Instruction {
    pub(crate) fn new(node: Arc<InstructionNode>, core: Arc<SchedulerCore>) -> Self {
        Self { node, core }
    }

    pub fn id(&self) -> &InstructionId {
        self.node.id()
    }

    pub fn deadline(&self) -> Instant {
        self.node.deadline()
    }

    pub fn status(&self) -> InstructionStatus {
        self.node.status()
    }

    /// Move the instruction to `Executing`.
    ///
    /// Returns `false` if it is not `Scheduled` any more (cancelled, timed out
    /// or already started); the executor must then not perform the work.
    pub fn checked_execution_start(&self) -> bool {
        self.node.checked_execution_start()
    }

    /// Record why execution is not progressing. Reported as the cancellation
    /// details if the deadline expires.
    pub fn execution_held_up(&self, details: Option<Details>) {
        self.node.execution_held_up(details);
    }

    /// Report the final outcome of the execution.
    ///
    /// Returns `false` if the instruction had already left `Executing` (for
    /// example because its deadline expired); the report is then only logged.
    pub fn execution_completed(&self, status: InstructionStatus, details: Option<Details>) -> bool {
        let (applied, wave) = self.node.execution_completed(status, details);
        self.core.propagate(self.node.id(), wave);
        applied
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("id", self.node.id())
            .field("deadline", &self.node.deadline())
            .finish()
    }
}

/// Signals returned by a successful submission.
///
/// `admitted` resolves with the executor handle once every precondition
/// succeeded, or with [`NotAdmitted`] if the instruction was cancelled while
/// queued. `executed` resolves with the final outcome of an admitted
/// instruction; its sender is dropped when admission fails.
#[derive(Debug)]
pub struct Submission {
    pub id: InstructionId,
    pub admitted: oneshot::Receiver<Result<Instruction, NotAdmitted>>,
    pub executed: oneshot::Receiver<ExecutionResult>,
}
