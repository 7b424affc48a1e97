// src/scheduler/pusher.rs

//! Per-instruction bridge to the queue store and the notification sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Instant;
use tracing::{debug, error};

use crate::publish::{InstructionRecord, NotificationSink, QueueStore, StatusChanged};
use crate::types::{Details, InstructionId, InstructionStatus};

pub(crate) struct InstructionPusher {
    queue: Arc<str>,
    id: InstructionId,
    deadline: Instant,
    /// Status last written to the store.
    projected: Option<InstructionStatus>,
    /// Set once the queue has been removed from the store.
    closed: Arc<AtomicBool>,
    store: Arc<dyn QueueStore>,
    sink: Arc<dyn NotificationSink>,
}

impl InstructionPusher {
    pub(crate) fn new(
        queue: Arc<str>,
        id: InstructionId,
        deadline: Instant,
        closed: Arc<AtomicBool>,
        store: Arc<dyn QueueStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            queue,
            id,
            deadline,
            projected: None,
            closed,
            store,
            sink,
        }
    }

    fn queue_closed(&self) -> bool {
        let closed = self.closed.load(Ordering::Acquire);
        if closed {
            debug!(
                queue = %self.queue,
                instruction = %self.id,
                "instruction queue closed; not touching its records"
            );
        }
        closed
    }

    /// Project the new status (only if it changed) and publish the event.
    pub(crate) fn instruction_updated(&mut self, status: InstructionStatus, details: Option<&Details>) {
        if self.projected != Some(status) && !self.queue_closed() {
            self.projected = Some(status);

            let record = InstructionRecord {
                id: self.id.clone(),
                deadline: self.deadline,
                status,
            };
            if let Err(err) = self.store.put_instruction(&self.queue, record) {
                error!(
                    queue = %self.queue,
                    instruction = %self.id,
                    error = %err,
                    "failed to update instruction queue"
                );
            }
        }

        let event = StatusChanged {
            queue: self.queue.to_string(),
            id: self.id.clone(),
            status,
            details: details.cloned(),
        };
        if let Err(err) = self.sink.publish(event) {
            debug!(
                instruction = %self.id,
                error = %err,
                "failed to publish status notification"
            );
        }
    }

    pub(crate) fn instruction_removed(&self) {
        if self.queue_closed() {
            return;
        }
        if let Err(err) = self.store.remove_instruction(&self.queue, &self.id) {
            error!(
                queue = %self.queue,
                instruction = %self.id,
                error = %err,
                "failed to remove instruction from queue"
            );
        }
    }
}
