use std::{path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;

pub const LOG_LEVEL_VAR: &str = "FATSH_LOG";
pub const LOG_JSON_PATH_VAR: &str = "FATSH_LOG_JSON_PATH";

pub fn parse_env_level(name: &str, default: LevelFilter) -> Result<LevelFilter> {
    match std::env::var(name) {
        Ok(raw) => LevelFilter::from_str(raw.trim())
            .with_context(|| format!("{name} must be one of off, error, warn, info, debug, trace")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}

pub fn parse_env_path(name: &str) -> Result<Option<PathBuf>> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Ok(Some(PathBuf::from(raw))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!("{name} invalid: {err}")),
    }
}

/// Command-line level wins; otherwise `FATSH_LOG`, defaulting to `warn`.
pub fn log_level(cli_override: Option<LevelFilter>) -> Result<LevelFilter> {
    match cli_override {
        Some(level) => Ok(level),
        None => parse_env_level(LOG_LEVEL_VAR, LevelFilter::Warn),
    }
}
