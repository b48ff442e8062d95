//! macOS backend built on `codesign(1)`.

use super::ensure_exists;
use crate::error::ValidationError;
use crate::platform::{Platform, SignatureValidator};
use crate::process::CommandRunner;
use crate::result::{Outcome, SignatureDetails, UNKNOWN_ALGORITHM};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const AUTHORITY_PREFIX: &str = "Authority=";
const TIMESTAMP_PREFIX: &str = "Timestamp=";
const SIGNATURE_MARKER: &str = "Signature=";

/// Layouts `codesign -dv` has been seen to print timestamps in.
const TIMESTAMP_LAYOUTS: &[&str] = &[
    "%b %d, %Y at %I:%M:%S %p",
    "%d %b %Y at %H:%M:%S",
    "%b %d, %Y at %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Fields recovered from `codesign -dv` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodesignDisplay {
    pub authority: Option<String>,
    pub has_timestamp: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub signature_algorithm: Option<String>,
}

/// Scans `codesign -dv` output line by line. Later matches overwrite earlier
/// ones, so with several `Authority=` lines the last one wins.
pub fn parse_codesign_display(raw: &str) -> CodesignDisplay {
    let mut display = CodesignDisplay::default();

    for line in raw.lines().filter(|l| !l.is_empty()) {
        if let Some(authority) = line.strip_prefix(AUTHORITY_PREFIX) {
            display.authority = Some(authority.trim().to_string());
        } else if let Some(stamp) = line.strip_prefix(TIMESTAMP_PREFIX) {
            display.has_timestamp = true;
            match parse_codesign_timestamp(stamp) {
                Some(ts) => display.timestamp = Some(ts),
                None => debug!(stamp, "unrecognized codesign timestamp"),
            }
        } else if line.contains(SIGNATURE_MARKER) {
            let algorithm = line
                .split('=')
                .nth(1)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_ALGORITHM);
            display.signature_algorithm = Some(algorithm.to_string());
        }
    }

    display
}

/// Parses a codesign timestamp, read as UTC.
pub fn parse_codesign_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // Recent macOS separates the AM/PM marker with U+202F.
    let text = raw.trim().replace('\u{202f}', " ");

    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Some(ts.with_timezone(&Utc));
    }
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&text, layout).ok())
        .map(|naive| naive.and_utc())
}

pub struct MacOsValidator {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl MacOsValidator {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        MacOsValidator {
            runner,
            program: program.into(),
        }
    }
}

impl SignatureValidator for MacOsValidator {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn evaluate(&self, path: &Path) -> Outcome {
        ensure_exists(path)?;

        let verify = self
            .runner
            .run(&self.program, &[OsStr::new("-v"), path.as_os_str()])?;
        if !verify.success() {
            return Err(ValidationError::Rejected(verify.failure_message(&self.program)).into());
        }

        let mut details = SignatureDetails {
            is_signed: true,
            is_valid: true,
            signature_algorithm: UNKNOWN_ALGORITHM.to_string(),
            ..SignatureDetails::default()
        };

        // codesign prints the verbose display on stderr.
        match self
            .runner
            .run(&self.program, &[OsStr::new("-dv"), path.as_os_str()])
        {
            Ok(out) => {
                let display = parse_codesign_display(&out.combined());
                details.has_timestamp = display.has_timestamp;
                details.valid_from = display.timestamp;
                if let Some(authority) = display.authority {
                    details.signer_name = authority;
                }
                if let Some(algorithm) = display.signature_algorithm {
                    details.signature_algorithm = algorithm;
                }
            }
            Err(e) => warn!(error = %e, "codesign display failed, signature metadata left empty"),
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::scripted::ScriptedRunner;
    use crate::process::ToolOutput;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    const DEVELOPER_ID_DISPLAY: &str = "\
Executable=/Applications/Example.app/Contents/MacOS/Example
Identifier=com.example.app
Format=app bundle with Mach-O universal (x86_64 arm64)
CodeDirectory v=20500 size=1234 flags=0x10000(runtime) hashes=27+7 location=embedded
Signature size=8980
Authority=Developer ID Application: Example Corp (ABCDE12345)
Authority=Developer ID Certification Authority
Authority=Apple Root CA
Timestamp=Jan 15, 2024 at 10:30:45 AM
Info.plist entries=22
TeamIdentifier=ABCDE12345
Runtime Version=14.2.0
Sealed Resources version=2 rules=13 files=8
Internal requirements count=1 size=212
";

    #[test]
    fn last_authority_wins() {
        let display = parse_codesign_display(DEVELOPER_ID_DISPLAY);
        assert_eq!(display.authority.as_deref(), Some("Apple Root CA"));
    }

    #[test]
    fn timestamp_line_sets_flag_and_date() {
        let display = parse_codesign_display(DEVELOPER_ID_DISPLAY);
        assert!(display.has_timestamp);
        assert_eq!(
            display.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap())
        );
    }

    #[test]
    fn signature_size_line_is_not_an_algorithm() {
        let display = parse_codesign_display(DEVELOPER_ID_DISPLAY);
        assert_eq!(display.signature_algorithm, None);
    }

    #[test]
    fn signature_marker_is_split_on_equals() {
        let display = parse_codesign_display("Signature=adhoc\n");
        assert_eq!(display.signature_algorithm.as_deref(), Some("adhoc"));

        let display = parse_codesign_display("Code Signature= sha256 \n");
        assert_eq!(display.signature_algorithm.as_deref(), Some("sha256"));
    }

    #[test]
    fn empty_signature_value_reads_as_unknown() {
        for raw in ["Signature=\n", "Signature=   \n"] {
            let display = parse_codesign_display(raw);
            assert_eq!(display.signature_algorithm.as_deref(), Some(UNKNOWN_ALGORITHM));
        }
    }

    #[test]
    fn empty_signature_value_keeps_unknown_on_result() {
        let file = NamedTempFile::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("codesign -v", Ok(ToolOutput::new(0, "", "")))
                .on("codesign -dv", Ok(ToolOutput::new(0, "", "Signature=\n"))),
        );
        let result = MacOsValidator::new(runner, "codesign").validate(&path_of(&file));
        assert!(result.is_signed);
        assert_eq!(result.signature_algorithm, UNKNOWN_ALGORITHM);
    }

    #[test]
    fn unparseable_timestamp_still_marks_presence() {
        let display = parse_codesign_display("Timestamp=sometime last week\n");
        assert!(display.has_timestamp);
        assert_eq!(display.timestamp, None);
    }

    #[test]
    fn timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 7, 16, 5, 9).unwrap();
        assert_eq!(parse_codesign_timestamp("Mar 7, 2023 at 4:05:09 PM"), Some(expected));
        assert_eq!(
            parse_codesign_timestamp("Mar 7, 2023 at 4:05:09\u{202f}PM"),
            Some(expected)
        );
        assert_eq!(parse_codesign_timestamp("7 Mar 2023 at 16:05:09"), Some(expected));
        assert_eq!(parse_codesign_timestamp("2023-03-07T16:05:09Z"), Some(expected));
        assert_eq!(parse_codesign_timestamp("2023-03-07 16:05:09"), Some(expected));
        assert_eq!(parse_codesign_timestamp("yesterday"), None);
    }

    #[test]
    fn empty_output_yields_defaults() {
        assert_eq!(parse_codesign_display(""), CodesignDisplay::default());
    }

    fn path_of(file: &NamedTempFile) -> String {
        file.path().to_str().unwrap().to_string()
    }

    #[test]
    fn signed_bundle_uses_display_metadata() {
        let file = NamedTempFile::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("codesign -v", Ok(ToolOutput::new(0, "", "")))
                .on(
                    "codesign -dv",
                    Ok(ToolOutput::new(0, "", DEVELOPER_ID_DISPLAY)),
                ),
        );
        let v = MacOsValidator::new(runner.clone(), "codesign");

        let result = v.validate(&path_of(&file));
        assert!(result.is_signed && result.is_valid);
        assert_eq!(result.signer_name, "Apple Root CA");
        assert!(result.has_timestamp);
        assert!(result.valid_from.is_some());
        assert_eq!(result.valid_to, None);
        assert_eq!(result.signature_algorithm, UNKNOWN_ALGORITHM);
        assert!(result.issuer_name.is_empty());
        assert_eq!(result.error_message, None);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("codesign -v "));
        assert!(calls[1].starts_with("codesign -dv "));
    }

    #[test]
    fn unsigned_reports_codesign_stderr() {
        let file = NamedTempFile::new().unwrap();
        let path = path_of(&file);
        let stderr = format!("{path}: code object is not signed at all\n");
        let runner = Arc::new(
            ScriptedRunner::new().on("codesign -v", Ok(ToolOutput::new(1, "", stderr.clone()))),
        );
        let v = MacOsValidator::new(runner.clone(), "codesign");

        let result = v.validate(&path);
        assert!(!result.is_signed && !result.is_valid);
        assert_eq!(result.error_message.as_deref(), Some(stderr.trim()));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn missing_codesign_is_an_invocation_error() {
        let file = NamedTempFile::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on(
            "codesign -v",
            Err(ValidationError::tool("codesign", "No such file or directory (os error 2)")),
        ));
        let result = MacOsValidator::new(runner, "codesign").validate(&path_of(&file));
        assert!(!result.is_signed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("failed to run codesign: No such file or directory (os error 2)")
        );
    }

    #[test]
    fn display_failure_degrades_to_defaults() {
        let file = NamedTempFile::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("codesign -v", Ok(ToolOutput::new(0, "", ""))),
        );
        let result = MacOsValidator::new(runner, "codesign").validate(&path_of(&file));
        assert!(result.is_signed && result.is_valid);
        assert_eq!(result.signature_algorithm, UNKNOWN_ALGORITHM);
        assert_eq!(result.error_message, None);
    }

    #[test]
    fn missing_file_never_runs_codesign() {
        let runner = Arc::new(ScriptedRunner::new());
        let v = MacOsValidator::new(runner.clone(), "codesign");
        let result = v.validate("/no/such/Example.app");
        assert_eq!(result.error_message.as_deref(), Some("File not found"));
        assert!(runner.calls().is_empty());
    }
}
