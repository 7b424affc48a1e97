// src/errors.rs

//! Crate-wide error types.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::types::{Details, InstructionId, InstructionStatus};

#[derive(Error, Debug)]
pub enum ProgschedError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in instruction plan: {0}")]
    PlanCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProgschedError>;

/// Admission failures returned synchronously by
/// [`InstructionScheduler::schedule_instruction`](crate::scheduler::InstructionScheduler::schedule_instruction).
///
/// None of these leave anything behind in the dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("instruction ID {0} currently in use")]
    DuplicateInstructionId(InstructionId),

    #[error("instruction {id} is dead on arrival: {}", describe_unmet(.unmet))]
    DeadOnArrival {
        id: InstructionId,
        /// Preconditions that were already unsuccessful. Empty when the
        /// deadline itself had passed.
        unmet: BTreeSet<InstructionId>,
    },

    #[error("instruction {id} depends on {precondition}, which is not a known instruction")]
    UnknownPreconditionId {
        id: InstructionId,
        precondition: InstructionId,
    },

    #[error("instruction {0} submitted to a queue that has been shut down")]
    QueueClosed(InstructionId),
}

fn describe_unmet(unmet: &BTreeSet<InstructionId>) -> String {
    if unmet.is_empty() {
        return "deadline already passed".to_string();
    }
    let ids: Vec<&str> = unmet.iter().map(InstructionId::as_str).collect();
    format!("preconditions already unsuccessful: {}", ids.join(", "))
}

/// Failures of an explicit cancel request. The instruction is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    #[error("instruction {0} not present in the graph")]
    UnknownInstruction(InstructionId),

    #[error("instruction {id} cannot be cancelled while {status}")]
    UncancellableInstruction {
        id: InstructionId,
        status: InstructionStatus,
    },
}

/// Delivered through the "admitted" signal when an instruction is cancelled
/// before it ever became executable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("instruction {id} was not admitted for execution ({status})")]
pub struct NotAdmitted {
    pub id: InstructionId,
    pub status: InstructionStatus,
    pub details: Option<Details>,
}
