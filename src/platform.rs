//! Backend contract and selection by platform identity.
//!
//! Selection takes the platform as a value instead of querying the host, so
//! any backend can be built (and tested) on any machine.

use crate::backends::{LinuxValidator, MacOsValidator, WindowsValidator};
use crate::config::ValidatorConfig;
use crate::error::ValidationError;
use crate::process::{CommandRunner, SystemRunner};
use crate::result::{Outcome, SignatureResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, debug_span, error};

/// Operating-system family a backend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The family this binary was compiled for.
    pub fn host() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Maps an OS name as reported by `std::env::consts::OS`. Anything that
    /// is neither Windows nor macOS is handled by the Linux backend.
    pub fn from_os_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "windows" => Platform::Windows,
            "macos" | "darwin" | "osx" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "macos" | "darwin" => Ok(Platform::MacOs),
            "linux" => Ok(Platform::Linux),
            other => Err(format!(
                "unknown platform '{other}' (expected windows, macos or linux)"
            )),
        }
    }
}

/// One platform-specific way of validating a file's signature.
pub trait SignatureValidator: Send + Sync {
    fn platform(&self) -> Platform;

    /// Gathers signature facts for `path`. Failures come back as
    /// `Err(Failure)` with whatever was gathered before the failure.
    fn evaluate(&self, path: &Path) -> Outcome;

    /// Validates `path` and collapses the outcome into a [`SignatureResult`].
    /// Never panics: a panic inside `evaluate` becomes an error result.
    fn validate(&self, path: &str) -> SignatureResult {
        let span = debug_span!("validate", platform = %self.platform(), path);
        let _entered = span.enter();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(Path::new(path)))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "signature evaluation panicked");
                Err(ValidationError::Unexpected(message).into())
            }
        };

        let result = SignatureResult::from_outcome(path, outcome);
        debug!(
            is_signed = result.is_signed,
            is_valid = result.is_valid,
            error = result.error_message.as_deref().unwrap_or(""),
            "validation finished"
        );
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "signature evaluation panicked".to_string()
    }
}

/// Builds the backend for `platform`, running external tools through a
/// [`SystemRunner`] configured from `config`.
pub fn select(platform: Platform, config: &ValidatorConfig) -> Box<dyn SignatureValidator> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::with_timeout(config.tool_timeout()));
    select_with_runner(platform, config, runner)
}

/// Same as [`select`] but with a caller-supplied process runner.
pub fn select_with_runner(
    platform: Platform,
    config: &ValidatorConfig,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn SignatureValidator> {
    debug!(%platform, "selecting signature backend");
    match platform {
        Platform::Windows => Box::new(WindowsValidator::new()),
        Platform::MacOs => Box::new(MacOsValidator::new(runner, &config.codesign_program)),
        Platform::Linux => Box::new(LinuxValidator::new(
            runner,
            &config.gpg_program,
            &config.objdump_program,
        )),
    }
}
