// src/engine/mod.rs

//! Plan execution on top of the instruction scheduler.
//!
//! [`runner`] submits a validated plan, feeds admitted instructions to an
//! executor backend and waits for them to settle; [`report`] describes how
//! each instruction ended.

pub mod report;
pub mod runner;

pub use report::{RunOutcome, RunReport};
pub use runner::PlanRunner;
