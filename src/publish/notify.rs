// src/publish/notify.rs

use std::fmt::Debug;

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;

use crate::types::{Details, InstructionId, InstructionStatus};

/// Event broadcast for every status update of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub queue: String,
    pub id: InstructionId,
    pub status: InstructionStatus,
    pub details: Option<Details>,
}

/// Receiver of status-change events.
///
/// `publish` must not block; errors are logged by the caller and dropped.
pub trait NotificationSink: Send + Sync + Debug {
    fn publish(&self, event: StatusChanged) -> Result<()>;
}

/// Fan-out sink built on a Tokio broadcast channel.
///
/// Slow subscribers lag (and skip events) instead of back-pressuring the
/// scheduler.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StatusChanged>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChanged> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, event: StatusChanged) -> Result<()> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|err| anyhow!("no subscriber for status of instruction {}", err.0.id))
    }
}
