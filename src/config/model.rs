// src/config/model.rs

use serde::Deserialize;

use crate::types::ExecutorKind;

/// Top-level chain description as read from a TOML file.
///
/// ```toml
/// [config]
/// executor = "thread"
///
/// [[stage]]
/// tasks = ["echo fetch", "echo warm-cache"]
///
/// [[stage]]
/// tasks = ["sleep 1 && echo report"]
/// detach = true
///
/// [handlers]
/// on_failure = "echo \"failed: $STAGECHAIN_ERROR\""
/// on_success = "echo done"
/// ```
///
/// This is the unvalidated form; convert it into a [`ChainFile`] with
/// `ChainFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChainFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Stages in execution order, from `[[stage]]` tables.
    #[serde(default)]
    pub stage: Vec<StageConfig>,

    #[serde(default)]
    pub handlers: HandlerSection,
}

/// A validated chain description.
///
/// Only obtainable through `TryFrom<RawChainFile>`, so holding one means the
/// checks in `validate.rs` passed.
#[derive(Debug, Clone)]
pub struct ChainFile {
    pub config: ConfigSection,
    pub stage: Vec<StageConfig>,
    pub handlers: HandlerSection,
}

impl ChainFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        stage: Vec<StageConfig>,
        handlers: HandlerSection,
    ) -> Self {
        Self {
            config,
            stage,
            handlers,
        }
    }

    pub fn task_count(&self) -> usize {
        self.stage.iter().map(|s| s.tasks.len()).sum()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// `"thread"` (default) or `"tokio"`.
    #[serde(default)]
    pub executor: ExecutorKind,
}

/// One `[[stage]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Shell commands run concurrently in this stage.
    pub tasks: Vec<String>,

    /// If true, the chain moves on without waiting for this stage.
    #[serde(default)]
    pub detach: bool,
}

/// `[handlers]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerSection {
    /// Command run once if the chain is rejected. The rejection message is
    /// available in `$STAGECHAIN_ERROR`.
    #[serde(default)]
    pub on_failure: Option<String>,

    /// Command run once if the chain completes without rejection.
    #[serde(default)]
    pub on_success: Option<String>,
}
