// src/publish/mod.rs

//! Outbound collaborators that observe the scheduler.
//!
//! - [`store`] is the operational projection of an instruction queue: one
//!   record per live instruction, written on every status change and never
//!   read back by the scheduler.
//! - [`notify`] broadcasts status-change events to subscribers.
//!
//! Both are best-effort. The scheduler logs their failures and carries on;
//! the in-memory graph stays the source of truth.

pub mod notify;
pub mod store;

pub use notify::{BroadcastSink, NotificationSink, StatusChanged};
pub use store::{InstructionRecord, MemoryQueueStore, QueueStore};
