// src/config/validate.rs

use crate::config::model::{ChainFile, RawChainFile};
use crate::errors::{Result, StagechainError};

impl TryFrom<RawChainFile> for ChainFile {
    type Error = StagechainError;

    fn try_from(raw: RawChainFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_chain(&raw)?;
        Ok(ChainFile::new_unchecked(raw.config, raw.stage, raw.handlers))
    }
}

fn validate_raw_chain(cfg: &RawChainFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_stages(cfg)?;
    validate_handlers(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawChainFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(StagechainError::ConfigError(
            "chain must contain at least one [[stage]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_stages(cfg: &RawChainFile) -> Result<()> {
    for (index, stage) in cfg.stage.iter().enumerate() {
        if stage.tasks.is_empty() {
            return Err(StagechainError::ConfigError(format!(
                "stage {} has no tasks",
                index
            )));
        }
        if let Some(pos) = stage.tasks.iter().position(|t| t.trim().is_empty()) {
            return Err(StagechainError::ConfigError(format!(
                "stage {} task {} has an empty command",
                index, pos
            )));
        }
    }
    Ok(())
}

fn validate_handlers(cfg: &RawChainFile) -> Result<()> {
    let handlers = [
        ("on_failure", &cfg.handlers.on_failure),
        ("on_success", &cfg.handlers.on_success),
    ];
    for (name, cmd) in handlers {
        if matches!(cmd, Some(c) if c.trim().is_empty()) {
            return Err(StagechainError::ConfigError(format!(
                "[handlers].{} must not be empty",
                name
            )));
        }
    }
    Ok(())
}
