// src/time/timer.rs

use std::fmt::{self, Debug};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::trace;

/// Callback invoked when a deadline expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer service.
///
/// The callback may run on any thread, even before `schedule` returns.
pub trait Timer: Send + Sync + Debug {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimeoutHandle;
}

/// Handle to a pending timer callback.
///
/// Cancellation is best-effort: a callback that is already running (or has
/// already run) is not affected.
pub struct TimeoutHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimeoutHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle that has nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Debug for TimeoutHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Timer that spawns one sleeping task per deadline on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Build a timer on the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().context("timer service requires a Tokio runtime")?;
        Ok(Self::new(handle))
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimeoutHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        TimeoutHandle::new(move || {
            trace!("aborting pending deadline timer");
            task.abort();
        })
    }
}
