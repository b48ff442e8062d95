//! Linux backend.
//!
//! Two strategies, tried in order, the first positive one wins:
//!
//! 1. a detached (`<file>.sig`) or ASCII-armored (`<file>.asc`) OpenPGP
//!    signature next to the file, checked with `gpg --verify`;
//! 2. a `.signature` or `.note.sig` section listed by `objdump -h`.
//!
//! Linux signing conventions carry no issuer, validity window or algorithm,
//! so those fields stay empty.

use super::ensure_exists;
use crate::error::ValidationError;
use crate::platform::{Platform, SignatureValidator};
use crate::process::{CommandRunner, ToolOutput};
use crate::result::{Failure, Outcome, SignatureDetails};
use crate::utils::sibling_with_suffix;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const GOOD_SIGNATURE_MARKER: &str = "Good signature from";
const UNKNOWN_SIGNER: &str = "Unknown";
/// Signer reported for a file whose only evidence is a signature section.
pub const EMBEDDED_SIGNER: &str = "Embedded signature";
const SIGNATURE_SECTIONS: &[&str] = &[".signature", ".note.sig"];

/// Signer identity from `gpg --verify` output: the text between the first
/// and last double quote of the first well-formed "Good signature from" line.
pub fn extract_gpg_signer(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.contains(GOOD_SIGNATURE_MARKER))
        .find_map(|line| {
            let start = line.find('"')?;
            let end = line.rfind('"')?;
            (end > start).then(|| line[start + 1..end].to_string())
        })
        .unwrap_or_else(|| UNKNOWN_SIGNER.to_string())
}

/// `true` when an `objdump -h` section table lists a signature section.
pub fn has_signature_section(dump: &str) -> bool {
    dump.lines().any(|line| {
        let mut columns = line.split_whitespace();
        let is_row = columns
            .next()
            .is_some_and(|idx| idx.chars().all(|c| c.is_ascii_digit()));
        is_row && columns.next().is_some_and(|name| SIGNATURE_SECTIONS.contains(&name))
    })
}

pub struct LinuxValidator {
    runner: Arc<dyn CommandRunner>,
    gpg: String,
    objdump: String,
}

impl LinuxValidator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        gpg: impl Into<String>,
        objdump: impl Into<String>,
    ) -> Self {
        LinuxValidator {
            runner,
            gpg: gpg.into(),
            objdump: objdump.into(),
        }
    }

    /// Strategy 1. No sibling signature file is a clean "not signed".
    fn detached_signature(&self, path: &Path) -> Outcome {
        let sig = sibling_with_suffix(path, ".sig");
        if sig.is_file() {
            debug!(signature = %sig.display(), "verifying detached signature");
            let out = self.runner.run(
                &self.gpg,
                &[OsStr::new("--verify"), sig.as_os_str(), path.as_os_str()],
            )?;
            return self.gpg_verdict(&out);
        }

        let asc = sibling_with_suffix(path, ".asc");
        if asc.is_file() {
            debug!(signature = %asc.display(), "verifying armored signature");
            let out = self
                .runner
                .run(&self.gpg, &[OsStr::new("--verify"), asc.as_os_str()])?;
            return self.gpg_verdict(&out);
        }

        Ok(SignatureDetails::unsigned())
    }

    fn gpg_verdict(&self, out: &ToolOutput) -> Outcome {
        if out.success() {
            Ok(SignatureDetails::signed_and_valid(extract_gpg_signer(&out.combined())))
        } else {
            Err(Failure::new(
                SignatureDetails::unsigned(),
                ValidationError::Rejected(out.failure_message(&self.gpg)),
            ))
        }
    }

    /// Strategy 2. A dump objdump cannot produce (unrecognised format, shell
    /// scripts) simply has no signature section.
    fn embedded_section(&self, path: &Path) -> Outcome {
        let out = self
            .runner
            .run(&self.objdump, &[OsStr::new("-h"), path.as_os_str()])?;
        if !out.success() {
            debug!(exit_code = out.exit_code, "objdump could not list sections");
        }

        if has_signature_section(&out.stdout) {
            Ok(SignatureDetails::signed_and_valid(EMBEDDED_SIGNER))
        } else {
            Ok(SignatureDetails::unsigned())
        }
    }
}

impl SignatureValidator for LinuxValidator {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn evaluate(&self, path: &Path) -> Outcome {
        ensure_exists(path)?;

        match self.detached_signature(path) {
            Ok(details) if details.is_signed => return Ok(details),
            Ok(_) => {}
            // Only surfaced if this strategy's outcome is the one selected,
            // which for a negative outcome it never is.
            Err(failure) => debug!(error = %failure.error, "detached signature not accepted"),
        }

        self.embedded_section(path)
    }
}
