// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagechainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Failed to launch task: {0}")]
    SpawnFailed(String),

    #[error("Command `{cmd}` exited with status {code}")]
    CommandFailed { cmd: String, code: i32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagechainError>;

/// Error value carried by a rejection.
///
/// Task bodies may fail with anything convertible into `anyhow::Error`; the
/// failure handler receives it unchanged.
pub type TaskError = anyhow::Error;
