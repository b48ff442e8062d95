//! Error types shared by the validation backends.
//!
//! Backends never let these escape the validation boundary: every
//! [`ValidationError`] is folded into `SignatureResult::error_message` by
//! [`crate::platform::SignatureValidator::validate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of why a validation could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The input path does not exist. No platform call was attempted.
    NotFound,
    /// The trust primitive or an external tool could not be started, or
    /// completed with a negative verdict.
    ToolInvocationFailure,
    /// Tool output did not match any expected pattern. Parsers degrade to
    /// defaults instead of producing this, so it only appears in logs.
    ParseFailure,
    /// Anything else.
    UnexpectedFailure,
}

/// Failure raised while evaluating a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found")]
    NotFound,

    /// Diagnostic returned by the trust primitive or the verification tool.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to run {tool}: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("{0}")]
    Unexpected(String),
}

impl ValidationError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::NotFound => ErrorKind::NotFound,
            ValidationError::Rejected(_) | ValidationError::ToolInvocation { .. } => {
                ErrorKind::ToolInvocationFailure
            }
            ValidationError::Unexpected(_) => ErrorKind::UnexpectedFailure,
        }
    }
}

/// Errors raised while loading a [`crate::config::ValidatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Verdicts WinVerifyTrust can report for a file.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum TrustError {
    #[error("TRUST_E_PROVIDER_UNKNOWN: The trust provider is not recognized on this system.")]
    ProviderUnknown,
    #[error("TRUST_E_ACTION_UNKNOWN: The trust verification action is not supported by the trust provider.")]
    ActionUnknown,
    #[error("TRUST_E_SUBJECT_FORM_UNKNOWN: The subject form specified is not one supported or known by the trust provider.")]
    SubjectFormUnknown,
    #[error("TRUST_E_SUBJECT_NOT_TRUSTED: The subject failed the specified verification action.")]
    SubjectNotTrusted,
    #[error("TRUST_E_NOSIGNATURE: No signature was present in the subject.")]
    NoSignature,
    #[error("TRUST_E_BAD_DIGEST: The file's digest does not match the expected value.")]
    BadDigest,
    #[error("TRUST_E_TIME_STAMP: The timestamp signature or certificate could not be verified.")]
    TimeStamp,
    #[error("TRUST_E_EXPLICIT_DISTRUST: The certificate was explicitly marked as untrusted.")]
    ExplicitDistrust,
    #[error("CERT_E_EXPIRED: The certificate has expired.")]
    Expired,
    #[error("CERT_E_CRITICAL: A certificate contains an unknown extension that is marked 'critical'.")]
    Critical,
    #[error("CERT_E_UNTRUSTEDROOT: The certificate chain terminates in an untrusted root.")]
    UntrustedRoot,
    #[error("CERT_E_CHAINING: The certificate chain could not be built.")]
    Chaining,
    #[error("CERT_E_REVOKED: The certificate has been revoked.")]
    Revoked,
    #[error("CERT_E_UNTRUSTEDTESTROOT: The certificate is based on an untrusted test root.")]
    UntrustedTestRoot,
    #[error("CERT_E_CN_NO_MATCH: The certificate's common name does not match the expected name.")]
    CnNoMatch,
    #[error("CERT_E_WRONG_USAGE: The certificate is not valid for the requested usage.")]
    WrongUsage,
    #[error("CRYPT_E_SECURITY_SETTINGS: Security settings prevented verification.")]
    SecuritySettings,
    #[error("CRYPT_E_NO_REVOCATION_CHECK: Revocation check was not performed.")]
    NoRevocationCheck,
    #[error("CRYPT_E_REVOCATION_OFFLINE: The revocation server was offline.")]
    RevocationOffline,
    #[error("CRYPT_E_FILE_ERROR: An error occurred while reading or writing the file.")]
    FileError,
    #[error("Unknown trust error (0x{0:08X})")]
    Unknown(i32),
}

/// Maps a WinVerifyTrust return code onto a [`TrustError`].
///
/// Codes are compared as their unsigned `winerror.h` spelling so the table
/// reads the same as the SDK headers.
pub fn hr_to_trust_error(hr: i32) -> TrustError {
    match hr as u32 {
        0x800B_0001 => TrustError::ProviderUnknown,
        0x800B_0002 => TrustError::ActionUnknown,
        0x800B_0003 => TrustError::SubjectFormUnknown,
        0x800B_0004 => TrustError::SubjectNotTrusted,
        0x800B_0100 => TrustError::NoSignature,
        0x8009_6010 => TrustError::BadDigest,
        0x8009_6005 => TrustError::TimeStamp,
        0x800B_0111 => TrustError::ExplicitDistrust,
        0x800B_0101 => TrustError::Expired,
        0x800B_0105 => TrustError::Critical,
        0x800B_0109 => TrustError::UntrustedRoot,
        0x800B_010A => TrustError::Chaining,
        0x800B_010C => TrustError::Revoked,
        0x800B_010D => TrustError::UntrustedTestRoot,
        0x800B_010F => TrustError::CnNoMatch,
        0x800B_0110 => TrustError::WrongUsage,
        0x8009_2026 => TrustError::SecuritySettings,
        0x8009_2012 => TrustError::NoRevocationCheck,
        0x8009_2013 => TrustError::RevocationOffline,
        0x8009_2003 => TrustError::FileError,
        _ => TrustError::Unknown(hr),
    }
}
