//! Validator configuration.
//!
//! Defaults work on a stock host; a JSON file and `SIGNINSPECT_*` environment
//! variables can override the external tool locations, the tool timeout and
//! the batch worker count.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_GPG: &str = "SIGNINSPECT_GPG";
pub const ENV_CODESIGN: &str = "SIGNINSPECT_CODESIGN";
pub const ENV_OBJDUMP: &str = "SIGNINSPECT_OBJDUMP";
pub const ENV_TOOL_TIMEOUT: &str = "SIGNINSPECT_TOOL_TIMEOUT";
pub const ENV_WORKERS: &str = "SIGNINSPECT_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// OpenPGP tool used for detached and armored signatures.
    pub gpg_program: String,
    /// macOS code-signing tool.
    pub codesign_program: String,
    /// Object-dump utility used to list section headers.
    pub objdump_program: String,
    /// Kill a tool that runs longer than this. `None` waits indefinitely.
    pub tool_timeout_secs: Option<u64>,
    /// Upper bound on concurrent validations in a batch; 0 lets rayon decide.
    pub max_workers: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            gpg_program: "gpg".to_string(),
            codesign_program: "codesign".to_string(),
            objdump_program: "objdump".to_string(),
            tool_timeout_secs: None,
            max_workers: 0,
        }
    }
}

impl ValidatorConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies `SIGNINSPECT_*` overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup, so tests need not touch the
    /// process environment.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_GPG) {
            self.gpg_program = v;
        }
        if let Some(v) = lookup(ENV_CODESIGN) {
            self.codesign_program = v;
        }
        if let Some(v) = lookup(ENV_OBJDUMP) {
            self.objdump_program = v;
        }
        if let Some(v) = lookup(ENV_TOOL_TIMEOUT) {
            let secs = parse_number(ENV_TOOL_TIMEOUT, &v)?;
            self.tool_timeout_secs = (secs > 0).then_some(secs as u64);
        }
        if let Some(v) = lookup(ENV_WORKERS) {
            self.max_workers = parse_number(ENV_WORKERS, &v)?;
        }
        Ok(self)
    }

    /// The tool timeout, with 0 meaning none wherever it was configured.
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
