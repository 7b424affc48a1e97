// src/config/mod.rs

//! Configuration loading and validation for progsched.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Parse human-friendly durations (`duration.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the plan and resolve its submission order (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, DefaultSection, InstructionConfig, PlannedInstruction,
    RawConfigFile,
};
