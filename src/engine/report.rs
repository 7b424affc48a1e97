// src/engine/report.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{NotAdmitted, SchedulerError};
use crate::types::{ExecutionResult, InstructionId, InstructionStatus};

/// How a single planned instruction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Admission failed; the instruction never entered the graph.
    Rejected(SchedulerError),
    /// Cancelled while queued, before it became executable.
    NotAdmitted(NotAdmitted),
    /// Admitted, then settled with this result.
    Executed(ExecutionResult),
    /// The scheduler dropped the instruction's signals without resolving
    /// them.
    Abandoned,
}

impl RunOutcome {
    /// Final status, if the instruction was ever part of the graph.
    pub fn status(&self) -> Option<InstructionStatus> {
        match self {
            RunOutcome::Rejected(_) | RunOutcome::Abandoned => None,
            RunOutcome::NotAdmitted(not_admitted) => Some(not_admitted.status),
            RunOutcome::Executed(result) => Some(result.status),
        }
    }
}

/// Result of running a whole plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: BTreeMap<InstructionId, RunOutcome>,
    /// Instructions left in the graph after the final clean.
    pub unflushed: BTreeSet<InstructionId>,
}

impl RunReport {
    pub fn status_of(&self, id: &InstructionId) -> Option<InstructionStatus> {
        self.outcomes.get(id)?.status()
    }

    pub fn all_successful(&self) -> bool {
        self.outcomes
            .values()
            .all(|outcome| outcome.status() == Some(InstructionStatus::Successful))
    }

    /// Number of instructions per final status; rejected and abandoned ones
    /// are not counted.
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for status in self.outcomes.values().filter_map(RunOutcome::status) {
            *counts.entry(status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
