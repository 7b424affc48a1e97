// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait the plan runner talks
//!   to, and `ShellExecutor`, the implementation used in production.
//! - [`task_runner`] runs one instruction's command with
//!   `tokio::process::Command` and reports the outcome into its handle.

pub mod backend;
pub mod task_runner;

pub use backend::{ExecutorBackend, ShellExecutor};
pub use task_runner::run_instruction;
