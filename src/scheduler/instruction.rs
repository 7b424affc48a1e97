// src/scheduler/instruction.rs

//! A single instruction node and its state machine.
//!
//! Every transition runs under the node's own mutex and never touches another
//! node. Transitions that affect dependants return a [`Wavefront`] which the
//! scheduler walks after the lock has been released.

use std::collections::BTreeSet;
use std::fmt;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{CancelError, NotAdmitted};
use crate::scheduler::handle::Instruction;
use crate::scheduler::pusher::InstructionPusher;
use crate::time::TimeoutHandle;
use crate::types::{Details, ExecutionResult, InstructionId, InstructionStatus};

pub(crate) type AdmittedSender = oneshot::Sender<Result<Instruction, NotAdmitted>>;
pub(crate) type AdmittedReceiver = oneshot::Receiver<Result<Instruction, NotAdmitted>>;

/// Verdict on a queued instruction's preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Every precondition is `Successful`.
    Satisfied,
    /// At least one precondition is still in flight.
    Blocked,
    /// These preconditions ended unsuccessfully.
    Unmet(BTreeSet<InstructionId>),
}

/// Follow-up work left for the scheduler once a transition is applied.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wavefront {
    Settled,
    /// The node succeeded: re-check these dependants for promotion.
    PromoteDependants(Vec<InstructionId>),
    /// The node ended unsuccessfully: cancel these dependants.
    CancelDependants(Vec<InstructionId>),
}

/// Edges detached from a node that is being cleaned.
#[derive(Debug)]
pub(crate) struct Unlinked {
    /// Final status of the cleaned node.
    pub(crate) status: InstructionStatus,
    pub(crate) dependencies: Vec<InstructionId>,
    pub(crate) dependants: Vec<InstructionId>,
}

pub(crate) struct InstructionNode {
    id: InstructionId,
    deadline: Instant,
    state: Mutex<NodeState>,
}

struct NodeState {
    status: InstructionStatus,
    /// Preconditions this instruction was submitted with.
    dependencies: Vec<InstructionId>,
    /// Preconditions cleaned out of the graph after ending unsuccessfully.
    lost_dependencies: BTreeSet<InstructionId>,
    /// Instructions that listed this one as a precondition.
    dependants: Vec<InstructionId>,
    /// Armed from submission until the node reaches a terminal status.
    timeout: Option<TimeoutHandle>,
    /// Whether `Queued` has been published.
    announced: bool,
    held_up: Option<Details>,
    admitted: Option<AdmittedSender>,
    executed: Option<oneshot::Sender<ExecutionResult>>,
    pusher: InstructionPusher,
}

impl InstructionNode {
    /// Create a node in `Queued`.
    ///
    /// Nothing is published yet: `Queued` goes out through [`announce`] or
    /// ahead of the first transition, whichever comes first.
    ///
    /// Returns the node together with the receiving ends of its "admitted"
    /// and "executed" signals.
    ///
    /// [`announce`]: Self::announce
    pub(crate) fn new(
        id: InstructionId,
        deadline: Instant,
        dependencies: Vec<InstructionId>,
        pusher: InstructionPusher,
    ) -> (Self, AdmittedReceiver, oneshot::Receiver<ExecutionResult>) {
        let (admitted_tx, admitted_rx) = oneshot::channel();
        let (executed_tx, executed_rx) = oneshot::channel();

        let node = Self {
            id,
            deadline,
            state: Mutex::new(NodeState {
                status: InstructionStatus::Queued,
                dependencies,
                lost_dependencies: BTreeSet::new(),
                dependants: Vec::new(),
                timeout: None,
                announced: false,
                held_up: None,
                admitted: Some(admitted_tx),
                executed: Some(executed_tx),
                pusher,
            }),
        };

        (node, admitted_rx, executed_rx)
    }

    pub(crate) fn id(&self) -> &InstructionId {
        &self.id
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> InstructionStatus {
        self.lock().status
    }

    pub(crate) fn dependencies(&self) -> Vec<InstructionId> {
        self.lock().dependencies.clone()
    }

    pub(crate) fn dependants(&self) -> Vec<InstructionId> {
        self.lock().dependants.clone()
    }

    pub(crate) fn add_dependant(&self, id: InstructionId) {
        self.lock().dependants.push(id);
    }

    pub(crate) fn remove_dependant(&self, id: &InstructionId) {
        self.lock().dependants.retain(|d| d != id);
    }

    /// Detach the precondition `id`, which was cleaned while in `status`.
    ///
    /// An unsuccessful precondition stays on record so the node can never be
    /// promoted past it.
    pub(crate) fn remove_dependency(&self, id: &InstructionId, status: InstructionStatus) {
        let mut state = self.lock();
        state.dependencies.retain(|d| d != id);
        if status.is_unsuccessful() {
            state.lost_dependencies.insert(id.clone());
        }
    }

    pub(crate) fn lost_dependencies(&self) -> BTreeSet<InstructionId> {
        self.lock().lost_dependencies.clone()
    }

    /// Publish `Queued` unless an earlier transition already did.
    pub(crate) fn announce(&self) {
        let mut state = self.lock();
        Self::announce_locked(&mut state);
    }

    fn announce_locked(state: &mut NodeState) {
        if !state.announced {
            state.announced = true;
            state.pusher.instruction_updated(InstructionStatus::Queued, None);
        }
    }

    /// Attach the deadline timer. Cancelled on the spot if the node settled
    /// before the timer could be attached.
    pub(crate) fn arm_timeout(&self, timeout: TimeoutHandle) {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Executing => state.timeout = Some(timeout),
            InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "instruction settled before its deadline was armed"
                );
                timeout.cancel();
            }
        }
    }

    fn set_status(&self, state: &mut NodeState, status: InstructionStatus, details: Option<&Details>) {
        Self::announce_locked(state);
        debug!(
            instruction = %self.id,
            from = %state.status,
            to = %status,
            "instruction status changed"
        );
        state.status = status;
        state.pusher.instruction_updated(status, details);
    }

    /// Promote a queued node according to `readiness`.
    ///
    /// `handle` builds the executor handle delivered through "admitted".
    pub(crate) fn ready(
        &self,
        readiness: Readiness,
        handle: impl FnOnce() -> Instruction,
    ) -> Wavefront {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Queued => {}
            InstructionStatus::Scheduled
            | InstructionStatus::Executing
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "instruction is no longer queued; nothing to schedule"
                );
                return Wavefront::Settled;
            }
        }

        match readiness {
            Readiness::Blocked => {
                debug!(instruction = %self.id, "instruction still waiting for preconditions");
                Wavefront::Settled
            }
            Readiness::Unmet(unmet) => {
                debug!(
                    instruction = %self.id,
                    ?unmet,
                    "preconditions ended unsuccessfully; cancelling instruction"
                );
                self.cancel_locked(&mut state, Some(Details::unmet(unmet)))
            }
            Readiness::Satisfied => {
                self.set_status(&mut state, InstructionStatus::Scheduled, None);
                if let Some(tx) = state.admitted.take() {
                    if tx.send(Ok(handle())).is_err() {
                        debug!(instruction = %self.id, "submitter stopped waiting for admission");
                    }
                }
                Wavefront::Settled
            }
        }
    }

    /// Cancel a node that is still `Queued` or `Scheduled`.
    pub(crate) fn try_cancel(&self, details: Option<Details>) -> Result<Wavefront, CancelError> {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Queued | InstructionStatus::Scheduled => {
                Ok(self.cancel_locked(&mut state, details))
            }
            InstructionStatus::Executing
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "instruction cannot be cancelled"
                );
                Err(CancelError::UncancellableInstruction {
                    id: self.id.clone(),
                    status: state.status,
                })
            }
        }
    }

    fn cancel_locked(&self, state: &mut NodeState, details: Option<Details>) -> Wavefront {
        if let Some(timeout) = state.timeout.take() {
            timeout.cancel();
        }

        let previous = state.status;
        self.set_status(state, InstructionStatus::Cancelled, details.as_ref());

        match previous {
            InstructionStatus::Queued => {
                if let Some(tx) = state.admitted.take() {
                    let _ = tx.send(Err(NotAdmitted {
                        id: self.id.clone(),
                        status: InstructionStatus::Cancelled,
                        details,
                    }));
                }
                // Never admitted, so there is no execution to report.
                state.executed = None;
            }
            InstructionStatus::Scheduled => {
                if let Some(tx) = state.executed.take() {
                    let _ = tx.send(ExecutionResult {
                        status: InstructionStatus::Cancelled,
                        details,
                    });
                }
            }
            InstructionStatus::Executing
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {}
        }

        Wavefront::CancelDependants(state.dependants.clone())
    }

    /// `Scheduled → Executing`. Returns `false` (and changes nothing) from any
    /// other status.
    pub(crate) fn checked_execution_start(&self) -> bool {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Scheduled => {
                self.set_status(&mut state, InstructionStatus::Executing, None);
                true
            }
            InstructionStatus::Queued
            | InstructionStatus::Executing
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "execution start refused"
                );
                false
            }
        }
    }

    pub(crate) fn execution_held_up(&self, details: Option<Details>) {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Scheduled | InstructionStatus::Executing => {
                debug!(instruction = %self.id, ?details, "instruction execution held up");
                state.held_up = details;
            }
            InstructionStatus::Queued
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "ignoring held-up report"
                );
            }
        }
    }

    /// `Executing → Successful | Failed`. Returns whether the outcome was
    /// applied.
    pub(crate) fn execution_completed(
        &self,
        status: InstructionStatus,
        details: Option<Details>,
    ) -> (bool, Wavefront) {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Executing => {}
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                warn!(
                    instruction = %self.id,
                    current = %state.status,
                    reported = %status,
                    "execution outcome reported outside of execution; ignoring"
                );
                return (false, Wavefront::Settled);
            }
        }

        let promote = match status {
            InstructionStatus::Successful => true,
            InstructionStatus::Failed => false,
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Executing
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                warn!(
                    instruction = %self.id,
                    reported = %status,
                    "executor may only report Successful or Failed; ignoring"
                );
                return (false, Wavefront::Settled);
            }
        };

        if let Some(timeout) = state.timeout.take() {
            timeout.cancel();
        }
        self.set_status(&mut state, status, details.as_ref());
        if let Some(tx) = state.executed.take() {
            let _ = tx.send(ExecutionResult { status, details });
        }

        let dependants = state.dependants.clone();
        let wave = if promote {
            Wavefront::PromoteDependants(dependants)
        } else {
            Wavefront::CancelDependants(dependants)
        };
        (true, wave)
    }

    /// Deadline expiry.
    ///
    /// `pending` lists the preconditions that were not yet `Successful`; it
    /// becomes the cancellation details of a still-queued node.
    pub(crate) fn timeout(&self, pending: BTreeSet<InstructionId>) -> Wavefront {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Queued => {
                debug!(instruction = %self.id, "instruction timed out while Queued, cancelling it");
                // The timer already fired; nothing left to cancel.
                state.timeout = None;
                self.cancel_locked(&mut state, Some(Details::unmet(pending)))
            }
            InstructionStatus::Scheduled => {
                debug!(instruction = %self.id, "instruction timed out while Scheduled, cancelling it");
                state.timeout = None;
                let details = state.held_up.clone();
                self.cancel_locked(&mut state, details)
            }
            InstructionStatus::Executing => {
                debug!(
                    instruction = %self.id,
                    "instruction timed out while Executing, transitioning into Unknown"
                );
                state.timeout = None;
                let details = state.held_up.clone();
                self.set_status(&mut state, InstructionStatus::Unknown, details.as_ref());
                if let Some(tx) = state.executed.take() {
                    let _ = tx.send(ExecutionResult {
                        status: InstructionStatus::Unknown,
                        details,
                    });
                }
                Wavefront::CancelDependants(state.dependants.clone())
            }
            InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => {
                debug!(
                    instruction = %self.id,
                    status = %state.status,
                    "instruction timed out after settling; ignoring"
                );
                Wavefront::Settled
            }
        }
    }

    /// Detach every edge of a cleanable node.
    ///
    /// Returns the node's status instead if it cannot be cleaned.
    pub(crate) fn unlink(&self) -> Result<Unlinked, InstructionStatus> {
        let mut state = self.lock();

        match state.status {
            InstructionStatus::Cancelled
            | InstructionStatus::Failed
            | InstructionStatus::Successful => {
                Ok(Unlinked {
                    status: state.status,
                    dependencies: mem::take(&mut state.dependencies),
                    dependants: mem::take(&mut state.dependants),
                })
            }
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Executing
            | InstructionStatus::Unknown => Err(state.status),
        }
    }

    /// Drop the projected record of a node that left the graph.
    pub(crate) fn removed(&self) {
        self.lock().pusher.instruction_removed();
    }
}

impl fmt::Debug for InstructionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionNode")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
