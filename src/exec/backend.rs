// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The plan runner hands every admitted instruction to an `ExecutorBackend`.
//! The backend owns the execution protocol of the [`Instruction`] handle:
//! call `checked_execution_start` first, do nothing if it returns `false`,
//! and report the outcome through `execution_completed`.
//!
//! - `ShellExecutor` is the implementation used by the `progsched` binary.
//!   It runs the planned command as a shell process.
//! - Tests provide their own backend that completes instructions with
//!   scripted outcomes instead of spawning processes.

use std::future::Future;
use std::pin::Pin;

use crate::config::PlannedInstruction;
use crate::errors::Result;
use crate::scheduler::Instruction;

use super::task_runner::run_instruction;

/// Trait abstracting how admitted instructions are executed.
pub trait ExecutorBackend: Send + Sync + 'static {
    /// Execute `instruction`, whose work is described by `planned`.
    ///
    /// An `Err` means the backend could not report an outcome itself; the
    /// caller then fails the instruction if it is still executing.
    fn execute(
        &self,
        instruction: Instruction,
        planned: PlannedInstruction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;
}

/// Executor backend running each instruction's `cmd` through the platform
/// shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorBackend for ShellExecutor {
    fn execute(
        &self,
        instruction: Instruction,
        planned: PlannedInstruction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>> {
        Box::pin(async move {
            run_instruction(instruction, planned).await;
            Ok(())
        })
    }
}
