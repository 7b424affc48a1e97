// src/deployer.rs

//! Lifecycle of several named instruction queues.
//!
//! Every scheduler created by an [`InstructionDeployer`] shares the same
//! clock, timer, queue store and notification sink.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::scheduler::{InstructionScheduler, SchedulerServices};

#[derive(Debug)]
pub struct InstructionDeployer {
    services: SchedulerServices,
    schedulers: Mutex<HashMap<String, InstructionScheduler>>,
}

impl InstructionDeployer {
    pub fn new(services: SchedulerServices) -> Self {
        Self {
            services,
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, InstructionScheduler>> {
        self.schedulers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the scheduler serving `queue_id`.
    ///
    /// If one already exists it is kept and returned unchanged.
    pub fn write_configuration(&self, queue_id: &str) -> InstructionScheduler {
        let mut schedulers = self.lock();

        if let Some(existing) = schedulers.get(queue_id) {
            warn!(queue = %queue_id, "instruction scheduler already exists; keeping it");
            return existing.clone();
        }

        let scheduler = InstructionScheduler::new(queue_id, self.services.clone());
        schedulers.insert(queue_id.to_string(), scheduler.clone());
        info!(queue = %queue_id, "instruction scheduler created");
        scheduler
    }

    /// Remove and shut down the scheduler serving `queue_id`.
    ///
    /// Returns `false` if there was none.
    pub fn remove_configuration(&self, queue_id: &str) -> bool {
        // Shut down outside of the map lock.
        let removed = self.lock().remove(queue_id);

        match removed {
            Some(scheduler) => {
                scheduler.shutdown();
                info!(queue = %queue_id, "instruction scheduler removed");
                true
            }
            None => {
                warn!(queue = %queue_id, "no instruction scheduler to remove");
                false
            }
        }
    }

    pub fn scheduler(&self, queue_id: &str) -> Option<InstructionScheduler> {
        self.lock().get(queue_id).cloned()
    }

    pub fn queue_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Shut down every scheduler.
    pub fn close(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (queue_id, scheduler) in drained {
            scheduler.shutdown();
            info!(queue = %queue_id, "instruction scheduler closed");
        }
    }
}
