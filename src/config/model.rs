// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::InstructionId;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// instruction_queue_id = "default"
/// notification_capacity = 256
///
/// [default]
/// deadline = "30s"
///
/// [instruction.create-lsp]
/// cmd = "echo creating"
/// deadline = "10s"
/// after = []
/// ```
///
/// All sections are optional at the TOML level; validation then requires
/// at least one instruction.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All instructions from `[instruction.<id>]`, keyed by id.
    #[serde(default)]
    pub instruction: BTreeMap<String, InstructionConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Name of the instruction queue the plan is submitted to. Used as the
    /// key of every projected record.
    #[serde(default = "default_instruction_queue_id")]
    pub instruction_queue_id: String,

    /// Buffer size of the status-change broadcast channel.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_instruction_queue_id() -> String {
    "default".to_string()
}

fn default_notification_capacity() -> usize {
    256
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            instruction_queue_id: default_instruction_queue_id(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSection {
    /// Relative deadline for instructions that do not set their own.
    #[serde(default = "default_deadline")]
    pub deadline: String,
}

fn default_deadline() -> String {
    "30s".to_string()
}

impl Default for DefaultSection {
    fn default() -> Self {
        Self {
            deadline: default_deadline(),
        }
    }
}

/// `[instruction.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct InstructionConfig {
    /// The command to execute.
    pub cmd: String,

    /// Preconditions: this instruction runs only once all of these
    /// succeeded.
    #[serde(default)]
    pub after: Vec<String>,

    /// Deadline relative to submission (`"500ms"`, `"10s"`, `"2m"`, `"1h"`).
    ///
    /// If `None`, `default.deadline` is used.
    #[serde(default)]
    pub deadline: Option<String>,
}

/// One instruction of a validated plan, with its deadline resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInstruction {
    pub id: InstructionId,
    pub cmd: String,
    pub after: Vec<InstructionId>,
    pub deadline: Duration,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so the plan is known to
/// be acyclic with every `after` reference resolvable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub instruction: BTreeMap<String, InstructionConfig>,
    plan: Vec<PlannedInstruction>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        instruction: BTreeMap<String, InstructionConfig>,
        plan: Vec<PlannedInstruction>,
    ) -> Self {
        Self {
            config,
            default,
            instruction,
            plan,
        }
    }

    /// Instructions in submission order: every instruction comes after all
    /// of its preconditions.
    pub fn plan(&self) -> &[PlannedInstruction] {
        &self.plan
    }
}
