// src/exec/task_runner.rs

//! Individual instruction process runner.

use std::process::ExitStatus;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::PlannedInstruction;
use crate::scheduler::Instruction;
use crate::types::{Details, InstructionStatus};

/// Run the process of a single admitted instruction and report its outcome.
///
/// - If `checked_execution_start` refuses (the instruction was cancelled or
///   timed out after admission), no process is spawned.
/// - If the deadline passes while the process runs, the child is killed and
///   nothing is reported: the scheduler has already moved the instruction
///   to `Unknown`.
pub async fn run_instruction(instruction: Instruction, planned: PlannedInstruction) {
    if !instruction.checked_execution_start() {
        info!(
            instruction = %planned.id,
            status = %instruction.status(),
            "instruction no longer executable; not starting process"
        );
        return;
    }

    let deadline = instruction.deadline();
    let outcome = tokio::select! {
        res = run_process(&planned) => Some(res),
        _ = tokio::time::sleep_until(deadline) => None,
    };

    let (status, details) = match outcome {
        Some(Ok(exit)) if exit.success() => (InstructionStatus::Successful, None),
        Some(Ok(exit)) => {
            let code = exit.code().unwrap_or(-1);
            (
                InstructionStatus::Failed,
                Some(Details::message(format!("process exited with code {code}"))),
            )
        }
        Some(Err(err)) => {
            error!(
                instruction = %planned.id,
                error = %err,
                "instruction execution error"
            );
            (InstructionStatus::Failed, Some(Details::message(format!("{err:#}"))))
        }
        None => {
            warn!(
                instruction = %planned.id,
                "deadline passed while the process was running; process killed"
            );
            return;
        }
    };

    instruction.execution_completed(status, details);
}

async fn run_process(planned: &PlannedInstruction) -> Result<ExitStatus> {
    info!(
        instruction = %planned.id,
        cmd = %planned.cmd,
        "starting instruction process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&planned.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&planned.cmd);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for instruction '{}'", planned.id))?;

    // Always consume both pipes so buffers don't fill.
    if let Some(stdout) = child.stdout.take() {
        let id = planned.id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(instruction = %id, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let id = planned.id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(instruction = %id, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of instruction '{}'", planned.id))?;

    info!(
        instruction = %planned.id,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "instruction process exited"
    );

    Ok(status)
}
