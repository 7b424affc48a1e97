// src/scheduler/mod.rs

//! Instruction dependency scheduler.
//!
//! This module owns the mutable dependency graph of one instruction queue:
//! - [`core`] implements admission, the promotion/cancellation wavefront,
//!   deadline expiry, cleaning and shutdown ([`InstructionScheduler`]).
//! - [`instruction`] holds the per-node state machine. Each node sits behind
//!   its own mutex; the registry mutex is always taken first.
//! - [`handle`] defines what submitters and executors get back: the
//!   [`Submission`] signals and the executor-facing [`Instruction`] handle.
//! - [`pusher`] forwards every status change of a node to the queue store and
//!   the notification sink.
//!
//! Edges between nodes are ids, resolved through the registry on every walk,
//! so the registry is the only owner of a node.

pub mod core;
pub mod handle;
pub(crate) mod instruction;
pub(crate) mod pusher;
pub(crate) mod registry;

pub use core::{InstructionScheduler, SchedulerServices};
pub use handle::{Instruction, Submission};
