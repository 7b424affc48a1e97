// src/time/clock.rs

use std::fmt::Debug;

use tokio::time::Instant;

/// Monotonic time source comparable to instruction deadlines.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Clock backed by `tokio::time::Instant::now()`.
///
/// Under a paused Tokio test runtime this follows the mocked time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
