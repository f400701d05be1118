#![allow(dead_code)]

use stagechain::config::{ChainFile, ConfigSection, HandlerSection, RawChainFile, StageConfig};
use stagechain::types::ExecutorKind;

/// Builder for `ChainFile` to simplify test setup.
pub struct ChainFileBuilder {
    chain: RawChainFile,
}

impl ChainFileBuilder {
    pub fn new() -> Self {
        Self {
            chain: RawChainFile {
                config: ConfigSection::default(),
                stage: Vec::new(),
                handlers: HandlerSection::default(),
            },
        }
    }

    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.chain.stage.push(stage);
        self
    }

    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.chain.config.executor = executor;
        self
    }

    pub fn on_failure(mut self, cmd: &str) -> Self {
        self.chain.handlers.on_failure = Some(cmd.to_string());
        self
    }

    pub fn on_success(mut self, cmd: &str) -> Self {
        self.chain.handlers.on_success = Some(cmd.to_string());
        self
    }

    /// The raw form, for tests exercising validation.
    pub fn raw(self) -> RawChainFile {
        self.chain
    }

    pub fn build(self) -> ChainFile {
        ChainFile::try_from(self.chain).expect("Failed to build valid chain from builder")
    }
}

impl Default for ChainFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            stage: StageConfig {
                tasks: vec![cmd.to_string()],
                detach: false,
            },
        }
    }

    pub fn empty() -> Self {
        Self {
            stage: StageConfig {
                tasks: Vec::new(),
                detach: false,
            },
        }
    }

    pub fn task(mut self, cmd: &str) -> Self {
        self.stage.tasks.push(cmd.to_string());
        self
    }

    pub fn detach(mut self) -> Self {
        self.stage.detach = true;
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}
