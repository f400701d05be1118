// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ChainFile, RawChainFile};
use crate::errors::Result;

/// Load a chain file from a given path and return the raw `RawChainFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawChainFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Parse chain TOML from a string.
pub fn parse_str(contents: &str) -> Result<RawChainFile> {
    let config: RawChainFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a chain file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - at least one stage,
///   - no stage without tasks,
///   - no empty commands.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ChainFile> {
    let raw = load_from_path(&path)?;
    let chain = ChainFile::try_from(raw)?;
    Ok(chain)
}
