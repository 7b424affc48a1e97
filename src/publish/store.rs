// src/publish/store.rs

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use tokio::time::Instant;

use crate::types::{InstructionId, InstructionStatus};

/// Projected view of one instruction, keyed by its id within a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRecord {
    pub id: InstructionId,
    pub deadline: Instant,
    pub status: InstructionStatus,
}

/// Write-only operational store holding one record set per instruction
/// queue.
///
/// Implementations must not block: record writes are made while the
/// instruction's own state is locked. Errors are logged by the caller and
/// dropped.
pub trait QueueStore: Send + Sync + Debug {
    /// Create an empty queue. Fails if the queue already exists.
    fn create_queue(&self, queue: &str) -> Result<()>;

    fn put_instruction(&self, queue: &str, record: InstructionRecord) -> Result<()>;

    fn remove_instruction(&self, queue: &str, id: &InstructionId) -> Result<()>;

    /// Drop the queue and every record in it. Removing a missing queue is not
    /// an error.
    fn remove_queue(&self, queue: &str) -> Result<()>;
}

/// In-process [`QueueStore`].
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    queues: Mutex<HashMap<String, HashMap<InstructionId, InstructionRecord>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashMap<InstructionId, InstructionRecord>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.lock().contains_key(queue)
    }

    /// Current record for `id`, if the queue holds one.
    pub fn record(&self, queue: &str, id: &InstructionId) -> Option<InstructionRecord> {
        self.lock().get(queue)?.get(id).cloned()
    }

    /// All records of a queue, sorted by instruction id.
    pub fn records(&self, queue: &str) -> Option<Vec<InstructionRecord>> {
        let queues = self.lock();
        let records = queues.get(queue)?;
        let mut out: Vec<_> = records.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Some(out)
    }
}

impl QueueStore for MemoryQueueStore {
    fn create_queue(&self, queue: &str) -> Result<()> {
        let mut queues = self.lock();
        if queues.contains_key(queue) {
            bail!("conflicting instruction queue '{queue}' found");
        }
        queues.insert(queue.to_string(), HashMap::new());
        Ok(())
    }

    fn put_instruction(&self, queue: &str, record: InstructionRecord) -> Result<()> {
        let mut queues = self.lock();
        let Some(records) = queues.get_mut(queue) else {
            bail!("instruction queue '{queue}' does not exist");
        };
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove_instruction(&self, queue: &str, id: &InstructionId) -> Result<()> {
        let mut queues = self.lock();
        let Some(records) = queues.get_mut(queue) else {
            bail!("instruction queue '{queue}' does not exist");
        };
        if records.remove(id).is_none() {
            bail!("instruction {id} has no record in queue '{queue}'");
        }
        Ok(())
    }

    fn remove_queue(&self, queue: &str) -> Result<()> {
        self.lock().remove(queue);
        Ok(())
    }
}
