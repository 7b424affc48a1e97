// src/scheduler/core.rs

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::{CancelError, SchedulerError};
use crate::publish::{NotificationSink, QueueStore};
use crate::scheduler::handle::{Instruction, Submission};
use crate::scheduler::instruction::{InstructionNode, Readiness, Wavefront};
use crate::scheduler::pusher::InstructionPusher;
use crate::scheduler::registry::Registry;
use crate::time::{Clock, Timer, TimerCallback};
use crate::types::{Details, InstructionId, InstructionStatus};

/// External collaborators a scheduler runs against.
#[derive(Debug, Clone)]
pub struct SchedulerServices {
    pub clock: Arc<dyn Clock>,
    pub timer: Arc<dyn Timer>,
    pub store: Arc<dyn QueueStore>,
    pub sink: Arc<dyn NotificationSink>,
}

/// Dependency-aware scheduler for one instruction queue.
///
/// It is responsible for:
/// - admitting new instructions (duplicate id, deadline, precondition checks)
/// - promoting queued instructions once all their preconditions succeeded
/// - cascading cancellation to dependants of unsuccessful instructions
/// - deadline expiry
/// - cleaning settled instructions out of the graph
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct InstructionScheduler {
    core: Arc<SchedulerCore>,
}

pub(crate) struct SchedulerCore {
    queue_id: Arc<str>,
    /// Set by shutdown; no submission is admitted afterwards.
    closed: Arc<AtomicBool>,
    registry: Registry,
    services: SchedulerServices,
}

/// One pending step of a wavefront walk.
enum Step {
    Promote(InstructionId),
    Cancel {
        target: InstructionId,
        cause: InstructionId,
    },
}

impl InstructionScheduler {
    /// Instantiate the scheduler and create its (empty) queue in the store.
    pub fn new(queue_id: impl Into<String>, services: SchedulerServices) -> Self {
        let queue_id: Arc<str> = Arc::from(queue_id.into());

        if let Err(err) = services.store.create_queue(&queue_id) {
            error!(queue = %queue_id, error = %err, "failed to add instruction queue");
        }
        info!(queue = %queue_id, "instruction queue instantiated");

        Self {
            core: Arc::new(SchedulerCore {
                queue_id,
                closed: Arc::new(AtomicBool::new(false)),
                registry: Registry::default(),
                services,
            }),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.core.queue_id
    }

    /// Admit a new instruction.
    ///
    /// On success the instruction is `Queued` (or already `Scheduled` if all
    /// of its preconditions had succeeded) and the returned [`Submission`]
    /// carries its signals. On error nothing was added to the graph.
    pub fn schedule_instruction(
        &self,
        id: InstructionId,
        deadline: Instant,
        preconditions: impl IntoIterator<Item = InstructionId>,
    ) -> Result<Submission, SchedulerError> {
        let core = &self.core;

        let (node, submission, remaining) = {
            let mut insns = core.registry.lock();

            if core.closed.load(Ordering::Acquire) {
                info!(instruction = %id, queue = %core.queue_id, "instruction queue is shut down");
                return Err(SchedulerError::QueueClosed(id));
            }

            if insns.contains_key(&id) {
                info!(instruction = %id, "instruction ID already present");
                return Err(SchedulerError::DuplicateInstructionId(id));
            }

            let now = core.services.clock.now();
            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                debug!(
                    instruction = %id,
                    overdue = ?now.saturating_duration_since(deadline),
                    "instruction deadline has already passed"
                );
                return Err(SchedulerError::DeadOnArrival {
                    id,
                    unmet: BTreeSet::new(),
                });
            }

            let mut seen = HashSet::new();
            let mut dependencies = Vec::new();
            for precondition in preconditions {
                if !seen.insert(precondition.clone()) {
                    continue;
                }
                match insns.get(&precondition) {
                    Some(node) => dependencies.push(Arc::clone(node)),
                    None => {
                        info!(
                            instruction = %id,
                            precondition = %precondition,
                            "instruction depends on an unknown instruction"
                        );
                        return Err(SchedulerError::UnknownPreconditionId { id, precondition });
                    }
                }
            }

            let unmet: BTreeSet<InstructionId> = dependencies
                .iter()
                .filter(|d| d.status().is_unsuccessful())
                .map(|d| d.id().clone())
                .collect();
            if !unmet.is_empty() {
                debug!(instruction = %id, ?unmet, "instruction's preconditions are already unsuccessful");
                return Err(SchedulerError::DeadOnArrival { id, unmet });
            }

            let pusher = InstructionPusher::new(
                Arc::clone(&core.queue_id),
                id.clone(),
                deadline,
                Arc::clone(&core.closed),
                Arc::clone(&core.services.store),
                Arc::clone(&core.services.sink),
            );
            let dependency_ids = dependencies.iter().map(|d| d.id().clone()).collect();
            let (node, admitted, executed) =
                InstructionNode::new(id.clone(), deadline, dependency_ids, pusher);
            let node = Arc::new(node);

            for dependency in &dependencies {
                dependency.add_dependant(id.clone());
            }
            insns.insert(id.clone(), Arc::clone(&node));

            debug!(instruction = %id, remaining = ?remaining, "instruction queued");
            (
                node,
                Submission {
                    id,
                    admitted,
                    executed,
                },
                remaining,
            )
        };

        let timeout = core.services.timer.schedule(
            remaining,
            deadline_callback(Arc::downgrade(core), node.id().clone()),
        );
        node.arm_timeout(timeout);
        node.announce();

        core.try_schedule(&node);
        Ok(submission)
    }

    /// Cancel a `Queued` or `Scheduled` instruction and, transitively, its
    /// dependants.
    pub fn cancel_instruction(&self, id: &InstructionId) -> Result<(), CancelError> {
        let Some(node) = self.core.registry.get(id) else {
            debug!(instruction = %id, "instruction not present in the graph");
            return Err(CancelError::UnknownInstruction(id.clone()));
        };

        let wave = node.try_cancel(None)?;
        self.core.propagate(id, wave);
        Ok(())
    }

    /// Remove settled instructions from the graph.
    ///
    /// Returns the ids that were not cleaned: unknown ids, and instructions
    /// that are not `Successful`, `Failed` or `Cancelled`.
    pub fn clean_instructions(
        &self,
        ids: impl IntoIterator<Item = InstructionId>,
    ) -> BTreeSet<InstructionId> {
        let mut unflushed = BTreeSet::new();
        let mut removed = Vec::new();
        let mut insns = self.core.registry.lock();

        for id in ids {
            let Some(node) = insns.get(&id).cloned() else {
                debug!(instruction = %id, "instruction not present in the graph");
                unflushed.insert(id);
                continue;
            };

            let unlinked = match node.unlink() {
                Ok(unlinked) => unlinked,
                Err(status) => {
                    debug!(
                        instruction = %id,
                        status = %status,
                        "instruction cannot be cleaned because of its state"
                    );
                    unflushed.insert(id);
                    continue;
                }
            };

            for dependency in &unlinked.dependencies {
                if let Some(d) = insns.get(dependency) {
                    d.remove_dependant(&id);
                }
            }
            for dependant in &unlinked.dependants {
                if let Some(d) = insns.get(dependant) {
                    d.remove_dependency(&id, unlinked.status);
                }
            }

            insns.remove(&id);
            debug!(instruction = %id, "instruction cleaned successfully");
            removed.push(node);
        }
        drop(insns);

        for node in removed {
            node.removed();
        }
        unflushed
    }

    /// Deadline callback target: expire the instruction `id`.
    ///
    /// Safe to call any number of times; only the first call on a node that is
    /// still in flight has an effect.
    pub fn handle_timeout(&self, id: &InstructionId) {
        self.core.handle_timeout(id);
    }

    /// Cancel everything still cancellable and drop the projected queue.
    ///
    /// Executing instructions are left to finish on their own. Later
    /// submissions are rejected with [`SchedulerError::QueueClosed`].
    pub fn shutdown(&self) {
        let core = &self.core;
        info!(queue = %core.queue_id, "closing instruction queue");
        core.closed.store(true, Ordering::Release);

        for node in core.registry.snapshot() {
            match node.try_cancel(None) {
                Ok(wave) => core.propagate(node.id(), wave),
                Err(err) => debug!(error = %err, "instruction left untouched by shutdown"),
            }
        }

        if let Err(err) = core.services.store.remove_queue(&core.queue_id) {
            error!(queue = %core.queue_id, error = %err, "failed to shut down instruction queue");
        }
    }

    pub fn status_of(&self, id: &InstructionId) -> Option<InstructionStatus> {
        Some(self.core.registry.get(id)?.status())
    }

    /// Preconditions `id` still depends on.
    pub fn dependencies_of(&self, id: &InstructionId) -> Option<Vec<InstructionId>> {
        Some(self.core.registry.get(id)?.dependencies())
    }

    /// Instructions that listed `id` as a precondition.
    pub fn dependants_of(&self, id: &InstructionId) -> Option<Vec<InstructionId>> {
        Some(self.core.registry.get(id)?.dependants())
    }

    /// Ids of every resident instruction, sorted.
    pub fn instruction_ids(&self) -> Vec<InstructionId> {
        let mut ids: Vec<_> = self.core.registry.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.core.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InstructionScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionScheduler")
            .field("queue_id", &self.core.queue_id)
            .field("instructions", &self.core.registry.len())
            .finish_non_exhaustive()
    }
}

fn deadline_callback(core: Weak<SchedulerCore>, id: InstructionId) -> TimerCallback {
    Box::new(move || match core.upgrade() {
        Some(core) => core.handle_timeout(&id),
        None => debug!(instruction = %id, "deadline fired after its scheduler was dropped"),
    })
}

impl SchedulerCore {
    fn handle_timeout(self: &Arc<Self>, id: &InstructionId) {
        let Some(node) = self.registry.get(id) else {
            warn!(instruction = %id, "instruction timed out, but not found in the queue");
            return;
        };

        let pending = self.pending_dependencies(&node);
        let wave = node.timeout(pending);
        self.propagate(id, wave);
    }

    /// Preconditions of `node` that have not succeeded.
    fn pending_dependencies(&self, node: &InstructionNode) -> BTreeSet<InstructionId> {
        let mut pending: BTreeSet<InstructionId> = node
            .dependencies()
            .into_iter()
            .filter(|dep| {
                self.registry
                    .get(dep)
                    .is_some_and(|d| d.status() != InstructionStatus::Successful)
            })
            .collect();
        pending.extend(node.lost_dependencies());
        pending
    }

    fn readiness_of(&self, node: &InstructionNode) -> Readiness {
        let mut unmet = BTreeSet::new();
        let mut blocked = false;

        for dep_id in node.dependencies() {
            let Some(dep) = self.registry.get(&dep_id) else {
                // Cleaned since the snapshot. If it ended unsuccessfully it is
                // already in the lost set read below.
                debug!(instruction = %node.id(), dependency = %dep_id, "dependency no longer in the graph");
                continue;
            };

            match dep.status() {
                InstructionStatus::Successful => {}
                InstructionStatus::Cancelled
                | InstructionStatus::Failed
                | InstructionStatus::Unknown => {
                    unmet.insert(dep_id);
                }
                InstructionStatus::Queued
                | InstructionStatus::Scheduled
                | InstructionStatus::Executing => blocked = true,
            }
        }

        // Read after the lookups: a clean records the loss before it drops the
        // precondition from the registry.
        unmet.extend(node.lost_dependencies());

        if !unmet.is_empty() {
            Readiness::Unmet(unmet)
        } else if blocked {
            Readiness::Blocked
        } else {
            Readiness::Satisfied
        }
    }

    fn try_schedule(self: &Arc<Self>, node: &Arc<InstructionNode>) {
        let readiness = self.readiness_of(node);
        let wave = node.ready(readiness, || Instruction::new(Arc::clone(node), Arc::clone(self)));
        self.propagate(node.id(), wave);
    }

    /// Walk the wavefront left behind by a transition of `source`.
    ///
    /// Iterative, and without a visited set: every step is guarded by the
    /// target's own state machine, so a node is promoted or cancelled at most
    /// once no matter how many paths lead to it.
    pub(crate) fn propagate(self: &Arc<Self>, source: &InstructionId, wave: Wavefront) {
        let mut steps = Vec::new();
        push_steps(&mut steps, source, wave);

        while let Some(step) = steps.pop() {
            match step {
                Step::Promote(target) => {
                    let Some(node) = self.registry.get(&target) else {
                        continue;
                    };
                    let readiness = self.readiness_of(&node);
                    let wave =
                        node.ready(readiness, || Instruction::new(Arc::clone(&node), Arc::clone(self)));
                    push_steps(&mut steps, &target, wave);
                }
                Step::Cancel { target, cause } => {
                    let Some(node) = self.registry.get(&target) else {
                        continue;
                    };
                    match node.try_cancel(Some(Details::unmet([cause]))) {
                        Ok(wave) => push_steps(&mut steps, &target, wave),
                        Err(err) => debug!(error = %err, "dependant not cancelled"),
                    }
                }
            }
        }
    }
}

fn push_steps(steps: &mut Vec<Step>, source: &InstructionId, wave: Wavefront) {
    match wave {
        Wavefront::Settled => {}
        Wavefront::PromoteDependants(dependants) => {
            steps.extend(dependants.into_iter().map(Step::Promote));
        }
        Wavefront::CancelDependants(dependants) => {
            steps.extend(dependants.into_iter().map(|target| Step::Cancel {
                target,
                cause: source.clone(),
            }));
        }
    }
}
