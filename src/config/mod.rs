// src/config/mod.rs

//! Chain file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a chain file from disk (`loader.rs`).
//! - Validate it into a `ChainFile` (`validate.rs`).
//! - Turn a `ChainFile` into a ready-to-start `Invoker` (`assemble.rs`).

pub mod assemble;
pub mod loader;
pub mod model;
pub mod validate;

pub use assemble::{FailureRecord, build_invoker, spawner_for};
pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ChainFile, ConfigSection, HandlerSection, RawChainFile, StageConfig};
