//! The normalized outcome every backend produces.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Algorithm name reported for a signature whose algorithm could not be recovered.
pub const UNKNOWN_ALGORITHM: &str = "Unknown";

/// Result of validating the signature of one file.
///
/// Serializes to the flat camelCase object consumed by the HTTP and report
/// layers. Optional fields are omitted rather than written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureResult {
    pub file_path: String,
    pub is_signed: bool,
    pub is_valid: bool,
    pub is_expired: bool,
    pub has_timestamp: bool,
    pub signer_name: String,
    pub issuer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub certificate_chain: Vec<String>,
    pub signature_algorithm: String,
    /// Reserved; no backend performs revocation lookups.
    pub is_revoked: bool,
}

impl SignatureResult {
    /// Collapses a backend outcome into the public result for `file_path`.
    pub fn from_outcome(file_path: impl Into<String>, outcome: Outcome) -> Self {
        let (details, error) = match outcome {
            Ok(details) => (details, None),
            Err(Failure { partial, error }) => (partial, Some(error)),
        };
        let details = details.normalized();

        SignatureResult {
            file_path: file_path.into(),
            is_signed: details.is_signed,
            is_valid: details.is_valid,
            is_expired: details.is_expired,
            has_timestamp: details.has_timestamp,
            signer_name: details.signer_name,
            issuer_name: details.issuer_name,
            valid_from: details.valid_from,
            valid_to: details.valid_to,
            error_message: error.map(|e| e.to_string()),
            certificate_chain: details.certificate_chain,
            signature_algorithm: details.signature_algorithm,
            is_revoked: details.is_revoked,
        }
    }

    /// Short-circuit result for a path that could not be evaluated at all.
    pub fn failed(file_path: impl Into<String>, error: ValidationError) -> Self {
        Self::from_outcome(file_path, Err(error.into()))
    }

    /// `true` when validation ran to completion, whatever the verdict.
    pub fn is_complete(&self) -> bool {
        self.error_message.is_none()
    }
}

/// Signature facts a backend gathered, without the path or error echo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDetails {
    pub is_signed: bool,
    pub is_valid: bool,
    pub is_expired: bool,
    pub has_timestamp: bool,
    pub signer_name: String,
    pub issuer_name: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub certificate_chain: Vec<String>,
    pub signature_algorithm: String,
    pub is_revoked: bool,
}

impl SignatureDetails {
    pub fn unsigned() -> Self {
        Self::default()
    }

    /// A signature that verified, with only the signer known.
    pub fn signed_and_valid(signer_name: impl Into<String>) -> Self {
        SignatureDetails {
            is_signed: true,
            is_valid: true,
            signer_name: signer_name.into(),
            ..Self::default()
        }
    }

    /// Clears every field that only has meaning for a signed file.
    fn normalized(self) -> Self {
        if self.is_signed {
            return self;
        }
        SignatureDetails {
            is_valid: false,
            is_expired: false,
            has_timestamp: false,
            signer_name: String::new(),
            issuer_name: String::new(),
            valid_from: None,
            valid_to: None,
            signature_algorithm: String::new(),
            ..self
        }
    }
}

/// A validation that stopped early. `partial` keeps whatever was gathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub partial: SignatureDetails,
    pub error: ValidationError,
}

impl Failure {
    pub fn new(partial: SignatureDetails, error: ValidationError) -> Self {
        Failure { partial, error }
    }
}

impl From<ValidationError> for Failure {
    fn from(error: ValidationError) -> Self {
        Failure::new(SignatureDetails::default(), error)
    }
}

/// What a backend's evaluation returns before it is collapsed into a [`SignatureResult`].
pub type Outcome = std::result::Result<SignatureDetails, Failure>;

/// Aggregate counts over a batch of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total_files: usize,
    pub signed_files: usize,
    pub unsigned_files: usize,
    pub expired_signatures: usize,
    pub results: Vec<SignatureResult>,
}

impl ScanSummary {
    pub fn from_results(results: Vec<SignatureResult>) -> Self {
        let signed_files = results.iter().filter(|r| r.is_signed).count();
        ScanSummary {
            total_files: results.len(),
            signed_files,
            unsigned_files: results.len() - signed_files,
            expired_signatures: results.iter().filter(|r| r.is_signed && r.is_expired).count(),
            results,
        }
    }

    /// Results that carry an error message.
    pub fn incomplete(&self) -> impl Iterator<Item = &SignatureResult> {
        self.results.iter().filter(|r| !r.is_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_signed() -> SignatureResult {
        SignatureResult::from_outcome(
            "/opt/tools/installer.exe",
            Ok(SignatureDetails {
                is_signed: true,
                is_valid: true,
                is_expired: false,
                has_timestamp: true,
                signer_name: "CN=Contoso Ltd".into(),
                issuer_name: "CN=Contoso Code Signing CA".into(),
                valid_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                valid_to: Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()),
                certificate_chain: Vec::new(),
                signature_algorithm: "sha256RSA".into(),
                is_revoked: false,
            }),
        )
    }

    #[test]
    fn json_shape_uses_camel_case_and_omits_absent_options() {
        let result = SignatureResult::from_outcome("/tmp/a.sh", Ok(SignatureDetails::unsigned()));
        let value = serde_json::to_value(&result).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "filePath",
            "isSigned",
            "isValid",
            "isExpired",
            "hasTimestamp",
            "signerName",
            "issuerName",
            "certificateChain",
            "signatureAlgorithm",
            "isRevoked",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("validFrom"));
        assert!(!obj.contains_key("validTo"));
        assert!(!obj.contains_key("errorMessage"));
    }

    #[test]
    fn json_round_trip_preserves_every_field() {
        let original = sample_signed();
        let json = serde_json::to_string(&original).unwrap();
        let back: SignatureResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);

        let failed = SignatureResult::failed("/missing", ValidationError::NotFound);
        let json = serde_json::to_string(&failed).unwrap();
        let back: SignatureResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failed);
        assert_eq!(back.valid_from, None);
    }

    #[test]
    fn deserialization_tolerates_missing_fields() {
        let result: SignatureResult = serde_json::from_str(r#"{"filePath":"/x"}"#).unwrap();
        assert_eq!(result.file_path, "/x");
        assert!(!result.is_signed);
        assert!(result.certificate_chain.is_empty());
    }

    #[test]
    fn unsigned_outcome_clears_signer_fields() {
        let details = SignatureDetails {
            is_signed: false,
            is_valid: true,
            has_timestamp: true,
            signer_name: "stale".into(),
            issuer_name: "stale".into(),
            ..SignatureDetails::default()
        };
        let result = SignatureResult::from_outcome("/bin/ls", Ok(details));
        assert!(!result.is_valid);
        assert!(!result.has_timestamp);
        assert!(result.signer_name.is_empty());
        assert!(result.issuer_name.is_empty());
    }

    #[test]
    fn failure_keeps_partial_fields_and_message() {
        let partial = SignatureDetails {
            is_signed: true,
            signature_algorithm: UNKNOWN_ALGORITHM.into(),
            ..SignatureDetails::default()
        };
        let result = SignatureResult::from_outcome(
            "/x",
            Err(Failure::new(partial, ValidationError::Rejected("bad".into()))),
        );
        assert_eq!(result.error_message.as_deref(), Some("bad"));
        assert!(result.is_signed);
        assert_eq!(result.signature_algorithm, UNKNOWN_ALGORITHM);
        assert!(!result.is_complete());

        let unsigned = SignatureDetails {
            signature_algorithm: UNKNOWN_ALGORITHM.into(),
            valid_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..SignatureDetails::default()
        };
        let result = SignatureResult::from_outcome(
            "/x",
            Err(Failure::new(unsigned, ValidationError::Rejected("bad".into()))),
        );
        assert!(result.signature_algorithm.is_empty());
        assert_eq!(result.valid_from, None);
    }

    #[test]
    fn scan_summary_counts() {
        let mut expired = sample_signed();
        expired.file_path = "/old.exe".into();
        expired.is_expired = true;
        let unsigned = SignatureResult::from_outcome("/a.sh", Ok(SignatureDetails::unsigned()));
        let missing = SignatureResult::failed("/gone", ValidationError::NotFound);

        let summary = ScanSummary::from_results(vec![sample_signed(), expired, unsigned, missing]);
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.signed_files, 2);
        assert_eq!(summary.unsigned_files, 2);
        assert_eq!(summary.expired_signatures, 1);
        assert_eq!(summary.incomplete().count(), 1);
    }
}
