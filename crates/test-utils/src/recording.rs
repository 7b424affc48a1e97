//! Collaborators that record (or refuse) what the scheduler pushes to them.

use std::sync::Mutex;

use anyhow::{Result, bail};
use progsched::publish::{
    InstructionRecord, MemoryQueueStore, NotificationSink, QueueStore, StatusChanged,
};
use progsched::types::{InstructionId, InstructionStatus};

/// Sink keeping every published event, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusChanged>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusChanged> {
        self.events.lock().unwrap().clone()
    }

    /// Every status published for `id`, in order.
    pub fn statuses(&self, id: &str) -> Vec<InstructionStatus> {
        self.events_for(id).into_iter().map(|e| e.status).collect()
    }

    pub fn events_for(&self, id: &str) -> Vec<StatusChanged> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.id.as_str() == id)
            .cloned()
            .collect()
    }

    pub fn last_for(&self, id: &str) -> Option<StatusChanged> {
        self.events_for(id).pop()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, event: StatusChanged) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// One call into a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    CreateQueue(String),
    Put(InstructionId, InstructionStatus),
    Remove(InstructionId),
    RemoveQueue(String),
}

/// [`MemoryQueueStore`] that also logs every call made to it.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryQueueStore,
    ops: Mutex<Vec<StoreOp>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Statuses written for `id`, in order.
    pub fn puts_for(&self, id: &str) -> Vec<InstructionStatus> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                StoreOp::Put(put_id, status) if put_id.as_str() == id => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn memory(&self) -> &MemoryQueueStore {
        &self.inner
    }

    fn log(&self, op: StoreOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl QueueStore for RecordingStore {
    fn create_queue(&self, queue: &str) -> Result<()> {
        self.log(StoreOp::CreateQueue(queue.to_string()));
        self.inner.create_queue(queue)
    }

    fn put_instruction(&self, queue: &str, record: InstructionRecord) -> Result<()> {
        self.log(StoreOp::Put(record.id.clone(), record.status));
        self.inner.put_instruction(queue, record)
    }

    fn remove_instruction(&self, queue: &str, id: &InstructionId) -> Result<()> {
        self.log(StoreOp::Remove(id.clone()));
        self.inner.remove_instruction(queue, id)
    }

    fn remove_queue(&self, queue: &str) -> Result<()> {
        self.log(StoreOp::RemoveQueue(queue.to_string()));
        self.inner.remove_queue(queue)
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl QueueStore for FailingStore {
    fn create_queue(&self, queue: &str) -> Result<()> {
        bail!("store unavailable: cannot create '{queue}'")
    }

    fn put_instruction(&self, _queue: &str, record: InstructionRecord) -> Result<()> {
        bail!("store unavailable: cannot write {}", record.id)
    }

    fn remove_instruction(&self, _queue: &str, id: &InstructionId) -> Result<()> {
        bail!("store unavailable: cannot remove {id}")
    }

    fn remove_queue(&self, queue: &str) -> Result<()> {
        bail!("store unavailable: cannot remove '{queue}'")
    }
}

/// Sink that rejects every event.
#[derive(Debug, Default)]
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn publish(&self, event: StatusChanged) -> Result<()> {
        bail!("sink unavailable: dropped {} -> {}", event.id, event.status)
    }
}
