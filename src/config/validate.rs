// src/config/validate.rs

use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, PlannedInstruction, RawConfigFile};
use crate::errors::{ProgschedError, Result};
use crate::types::InstructionId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ProgschedError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let plan = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.default,
            raw.instruction,
            plan,
        ))
    }
}

/// Validate `cfg` and return its instructions in submission order.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<Vec<PlannedInstruction>> {
    ensure_has_instructions(cfg)?;
    validate_global_config(cfg)?;
    validate_instruction_dependencies(cfg)?;
    let default_deadline = checked_deadline("[default].deadline", &cfg.default.deadline)?;
    let order = submission_order(cfg)?;

    order
        .into_iter()
        .map(|id| {
            let insn = &cfg.instruction[id];
            let deadline = match insn.deadline.as_deref() {
                Some(s) => checked_deadline(&format!("[instruction.{id}].deadline"), s)?,
                None => default_deadline,
            };
            Ok(PlannedInstruction {
                id: InstructionId::from(id),
                cmd: insn.cmd.clone(),
                after: insn.after.iter().map(|a| InstructionId::from(a.as_str())).collect(),
                deadline,
            })
        })
        .collect()
}

fn ensure_has_instructions(cfg: &RawConfigFile) -> Result<()> {
    if cfg.instruction.is_empty() {
        return Err(ProgschedError::ConfigError(
            "config must contain at least one [instruction.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.notification_capacity == 0 {
        return Err(ProgschedError::ConfigError(
            "[config].notification_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.instruction_queue_id.trim().is_empty() {
        return Err(ProgschedError::ConfigError(
            "[config].instruction_queue_id must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_instruction_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (id, insn) in cfg.instruction.iter() {
        for dep in insn.after.iter() {
            if dep == id {
                return Err(ProgschedError::ConfigError(format!(
                    "instruction '{}' cannot depend on itself in `after`",
                    id
                )));
            }
            if !cfg.instruction.contains_key(dep) {
                return Err(ProgschedError::ConfigError(format!(
                    "instruction '{}' has unknown dependency '{}' in `after`",
                    id, dep
                )));
            }
        }
    }
    Ok(())
}

fn checked_deadline(field: &str, value: &str) -> Result<Duration> {
    let deadline = parse_duration(value)
        .map_err(|e| ProgschedError::ConfigError(format!("{field}: {e}")))?;

    if deadline.is_zero() {
        return Err(ProgschedError::ConfigError(format!(
            "{field} must be greater than zero (got '{value}')"
        )));
    }
    Ok(deadline)
}

fn submission_order(cfg: &RawConfigFile) -> Result<Vec<&str>> {
    // Edge direction: dep -> instruction
    // For:
    //   [instruction.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in cfg.instruction.keys() {
        graph.add_node(id.as_str());
    }

    for (id, insn) in cfg.instruction.iter() {
        for dep in insn.after.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    toposort(&graph, None).map_err(|cycle| {
        ProgschedError::PlanCycle(format!(
            "cycle detected in instruction plan involving '{}'",
            cycle.node_id()
        ))
    })
}
