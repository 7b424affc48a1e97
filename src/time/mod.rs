// src/time/mod.rs

//! Time sources used by the scheduler.
//!
//! - [`clock`] supplies the monotonic "now" that deadlines are compared to.
//! - [`timer`] fires one-shot deadline callbacks and lets the scheduler
//!   cancel them once an instruction settles.
//!
//! Both are traits so tests can drive time by hand instead of sleeping.

pub mod clock;
pub mod timer;

pub use clock::{Clock, TokioClock};
pub use timer::{TimeoutHandle, Timer, TimerCallback, TokioTimer};
