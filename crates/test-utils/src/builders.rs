#![allow(dead_code)]

use std::collections::BTreeMap;

use progsched::config::{
    ConfigFile, ConfigSection, DefaultSection, InstructionConfig, RawConfigFile,
};
use progsched::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                instruction: BTreeMap::new(),
            },
        }
    }

    pub fn with_instruction(mut self, id: &str, insn: InstructionConfig) -> Self {
        self.config.instruction.insert(id.to_string(), insn);
        self
    }

    pub fn with_queue_id(mut self, queue_id: &str) -> Self {
        self.config.config.instruction_queue_id = queue_id.to_string();
        self
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.config.config.notification_capacity = capacity;
        self
    }

    pub fn with_default_deadline(mut self, deadline: &str) -> Self {
        self.config.default.deadline = deadline.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `InstructionConfig`.
pub struct InstructionConfigBuilder {
    insn: InstructionConfig,
}

impl InstructionConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            insn: InstructionConfig {
                cmd: cmd.to_string(),
                after: Vec::new(),
                deadline: None,
            },
        }
    }

    pub fn after(mut self, id: &str) -> Self {
        self.insn.after.push(id.to_string());
        self
    }

    pub fn deadline(mut self, deadline: &str) -> Self {
        self.insn.deadline = Some(deadline.to_string());
        self
    }

    pub fn build(self) -> InstructionConfig {
        self.insn
    }
}
