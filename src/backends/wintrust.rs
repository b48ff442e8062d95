//! Windows backend: WinVerifyTrust verdict plus the embedded signer
//! certificate.

use super::ensure_exists;
use crate::error::ValidationError;
use crate::platform::{Platform, SignatureValidator};
use crate::result::{Outcome, SignatureDetails, UNKNOWN_ALGORITHM};
use crate::signer_info::SignerCredential;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Access to the OS trust store.
pub trait TrustProvider: Send + Sync {
    /// `Ok` when the trust primitive accepted the file's signature; otherwise
    /// the primitive's diagnostic.
    fn verify_trust(&self, path: &Path) -> Result<(), ValidationError>;

    /// Signer certificate embedded in the file, if one can be read.
    fn signer_credential(&self, path: &Path) -> Option<SignerCredential>;
}

/// WinVerifyTrust (generic verify v2, no UI, no revocation checks) and
/// CryptQueryObject.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTrustProvider;

#[cfg(windows)]
impl TrustProvider for NativeTrustProvider {
    fn verify_trust(&self, path: &Path) -> Result<(), ValidationError> {
        use crate::error::hr_to_trust_error;
        use crate::win32_guards::TrustSession;

        let path = path
            .to_str()
            .ok_or_else(|| ValidationError::Unexpected("path is not valid Unicode".into()))?;

        let mut session = TrustSession::for_file(path);
        let hr = session.verify();
        debug!("WinVerifyTrust returned 0x{:08X}", hr);

        if hr == 0 {
            Ok(())
        } else {
            Err(ValidationError::Rejected(hr_to_trust_error(hr).to_string()))
        }
    }

    fn signer_credential(&self, path: &Path) -> Option<SignerCredential> {
        crate::signer_info::extract_signer_credential(path.to_str()?)
    }
}

/// Stand-in used when the Windows backend is built on another OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTrustProvider;

impl TrustProvider for UnavailableTrustProvider {
    fn verify_trust(&self, _path: &Path) -> Result<(), ValidationError> {
        Err(ValidationError::tool(
            "WinVerifyTrust",
            "the Windows trust store is not available on this host",
        ))
    }

    fn signer_credential(&self, _path: &Path) -> Option<SignerCredential> {
        None
    }
}

pub struct WindowsValidator {
    provider: Arc<dyn TrustProvider>,
}

impl WindowsValidator {
    /// Uses the native trust store on Windows and [`UnavailableTrustProvider`]
    /// everywhere else.
    pub fn new() -> Self {
        #[cfg(windows)]
        let provider: Arc<dyn TrustProvider> = Arc::new(NativeTrustProvider);
        #[cfg(not(windows))]
        let provider: Arc<dyn TrustProvider> = Arc::new(UnavailableTrustProvider);
        Self::with_provider(provider)
    }

    pub fn with_provider(provider: Arc<dyn TrustProvider>) -> Self {
        WindowsValidator { provider }
    }
}

impl Default for WindowsValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureValidator for WindowsValidator {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn evaluate(&self, path: &Path) -> Outcome {
        ensure_exists(path)?;
        self.provider.verify_trust(path)?;

        let mut details = SignatureDetails {
            is_signed: true,
            signature_algorithm: UNKNOWN_ALGORITHM.to_string(),
            ..SignatureDetails::default()
        };

        // The trust verdict already covers the chain; a readable credential is
        // all that is needed to call the signature valid.
        match self.provider.signer_credential(path) {
            Some(credential) => {
                details.is_valid = true;
                details.is_expired = credential.is_expired_at(Utc::now());
                details.signer_name = credential.subject;
                details.issuer_name = credential.issuer;
                details.valid_from = credential.valid_from;
                details.valid_to = credential.valid_to;
                details.signature_algorithm = credential.signature_algorithm;
                debug!(signer = %details.signer_name, "signer credential extracted");
            }
            None => warn!("trust check passed but the signer credential could not be read"),
        }

        Ok(details)
    }
}
