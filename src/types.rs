// src/types.rs

//! Value types shared by the scheduler, its collaborators and the plan
//! runner.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;

/// Caller-supplied instruction identifier, unique within one instruction
/// queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct InstructionId(String);

impl InstructionId {
    pub fn new(id: impl Into<String>) -> Self {
        InstructionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstructionId {
    fn from(id: &str) -> Self {
        InstructionId(id.to_string())
    }
}

impl From<String> for InstructionId {
    fn from(id: String) -> Self {
        InstructionId(id)
    }
}

/// Lifecycle status of an instruction.
///
/// Allowed transitions:
///
/// ```text
/// Queued ──► Scheduled ──► Executing ──► Successful | Failed | Unknown
///   │            │
///   └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionStatus {
    /// Waiting for its preconditions to succeed.
    Queued,
    /// All preconditions succeeded; waiting for the executor to pick it up.
    Scheduled,
    /// The executor is performing the instruction.
    Executing,
    Successful,
    Failed,
    Cancelled,
    /// The deadline expired while executing; the real outcome is unknown.
    Unknown,
}

impl InstructionStatus {
    /// Whether the instruction has stopped making progress on its own.
    pub fn is_terminal(self) -> bool {
        match self {
            InstructionStatus::Successful
            | InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => true,
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Executing => false,
        }
    }

    /// Terminal statuses that cancel every dependant.
    pub fn is_unsuccessful(self) -> bool {
        match self {
            InstructionStatus::Failed
            | InstructionStatus::Cancelled
            | InstructionStatus::Unknown => true,
            InstructionStatus::Queued
            | InstructionStatus::Scheduled
            | InstructionStatus::Executing
            | InstructionStatus::Successful => false,
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstructionStatus::Queued => "Queued",
            InstructionStatus::Scheduled => "Scheduled",
            InstructionStatus::Executing => "Executing",
            InstructionStatus::Successful => "Successful",
            InstructionStatus::Failed => "Failed",
            InstructionStatus::Cancelled => "Cancelled",
            InstructionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Diagnostic payload attached to a status transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Details {
    /// Preconditions whose outcome caused (or is blocking) this transition.
    pub unmet_dependencies: BTreeSet<InstructionId>,
    /// Free-form executor diagnostics.
    pub message: Option<String>,
}

impl Details {
    pub fn unmet(ids: impl IntoIterator<Item = InstructionId>) -> Self {
        Self {
            unmet_dependencies: ids.into_iter().collect(),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            unmet_dependencies: BTreeSet::new(),
            message: Some(message.into()),
        }
    }
}

/// Final outcome delivered through the "executed" signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: InstructionStatus,
    pub details: Option<Details>,
}
