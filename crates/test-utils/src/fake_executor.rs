use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use progsched::config::PlannedInstruction;
use progsched::errors::{ProgschedError, Result};
use progsched::exec::ExecutorBackend;
use progsched::scheduler::Instruction;
use progsched::types::{Details, InstructionId, InstructionStatus};

/// What the [`FakeExecutor`] does with one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Start and complete as `Successful`.
    Succeed,
    /// Start and complete as `Failed` with this message.
    Fail(String),
    /// Start and never report; the deadline has to settle it.
    Hang,
    /// Start, then return an error instead of reporting.
    Error(String),
}

/// A fake executor that:
/// - records which instructions it started, in order
/// - completes each one according to its script (default: `Succeed`).
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    scripts: Arc<Mutex<HashMap<InstructionId, Script>>>,
    started: Arc<Mutex<Vec<InstructionId>>>,
    refused: Arc<Mutex<Vec<InstructionId>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, id: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(InstructionId::from(id), script);
        self
    }

    /// Instructions whose execution actually started.
    pub fn started(&self) -> Vec<InstructionId> {
        self.started.lock().unwrap().clone()
    }

    /// Instructions handed over but refused by `checked_execution_start`.
    pub fn refused(&self) -> Vec<InstructionId> {
        self.refused.lock().unwrap().clone()
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute(
        &self,
        instruction: Instruction,
        planned: PlannedInstruction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&planned.id)
            .cloned()
            .unwrap_or(Script::Succeed);
        let started = Arc::clone(&self.started);
        let refused = Arc::clone(&self.refused);

        Box::pin(async move {
            if !instruction.checked_execution_start() {
                refused.lock().unwrap().push(planned.id);
                return Ok(());
            }
            started.lock().unwrap().push(planned.id.clone());

            match script {
                Script::Succeed => {
                    instruction.execution_completed(InstructionStatus::Successful, None);
                }
                Script::Fail(message) => {
                    instruction
                        .execution_completed(InstructionStatus::Failed, Some(Details::message(message)));
                }
                Script::Hang => {}
                Script::Error(message) => {
                    return Err(ProgschedError::Other(anyhow::anyhow!(message)));
                }
            }
            Ok(())
        })
    }
}
