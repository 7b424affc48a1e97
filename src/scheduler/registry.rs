// src/scheduler/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::scheduler::instruction::InstructionNode;
use crate::types::InstructionId;

pub(crate) type Nodes = HashMap<InstructionId, Arc<InstructionNode>>;

/// Sole owner of every instruction node of a queue.
///
/// Edges between nodes are stored as ids and resolved here on every walk.
/// Lock order: this mutex may be held while a node's mutex is taken, never
/// the other way round.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    insns: Mutex<Nodes>,
}

impl Registry {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Nodes> {
        self.insns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self, id: &InstructionId) -> Option<Arc<InstructionNode>> {
        self.lock().get(id).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<InstructionNode>> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
