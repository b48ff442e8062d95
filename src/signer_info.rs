use crate::result::UNKNOWN_ALGORITHM;
use chrono::{DateTime, Utc};

/// Identity and validity window of the certificate that signed a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerCredential {
    pub subject: String,
    pub issuer: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub signature_algorithm: String,
}

impl SignerCredential {
    /// `true` once `now` is past the end of the validity window. A credential
    /// with no known end never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_to.is_some_and(|valid_to| now > valid_to)
    }
}

impl std::fmt::Display for SignerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_time = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        write!(
            f,
            "Signed by: {}\nIssued by: {}\nValid from: {}\nValid to: {}\nSignature Algorithm: {}",
            self.subject,
            self.issuer,
            fmt_time(&self.valid_from),
            fmt_time(&self.valid_to),
            self.signature_algorithm,
        )
    }
}

/// Friendly name for a certificate signature-algorithm OID, in the spelling
/// Windows certificate dialogs use. Unrecognized OIDs are returned verbatim.
pub fn algorithm_friendly_name(oid: Option<&str>) -> String {
    match oid {
        Some("1.2.840.113549.1.1.4") => "md5RSA".to_string(),
        Some("1.2.840.113549.1.1.5") => "sha1RSA".to_string(),
        Some("1.2.840.113549.1.1.10") => "RSASSA-PSS".to_string(),
        Some("1.2.840.113549.1.1.11") => "sha256RSA".to_string(),
        Some("1.2.840.113549.1.1.12") => "sha384RSA".to_string(),
        Some("1.2.840.113549.1.1.13") => "sha512RSA".to_string(),
        Some("1.2.840.10045.4.1") => "sha1ECDSA".to_string(),
        Some("1.2.840.10045.4.3.2") => "sha256ECDSA".to_string(),
        Some("1.2.840.10045.4.3.3") => "sha384ECDSA".to_string(),
        Some("1.2.840.10045.4.3.4") => "sha512ECDSA".to_string(),
        Some(oid) if !oid.trim().is_empty() => oid.to_string(),
        _ => UNKNOWN_ALGORITHM.to_string(),
    }
}

#[cfg(windows)]
pub use native::extract_signer_credential;

#[cfg(windows)]
mod native {
    use super::{algorithm_friendly_name, SignerCredential};
    use crate::utils::{filetime_to_datetime, to_wide_null_terminated};
    use crate::win32_guards::*;
    use std::ptr;
    use windows::Win32::Security::Cryptography::*;

    /// Reads the signer certificate embedded in `path`.
    ///
    /// Returns `None` when the file carries no PKCS#7 message or the signer
    /// certificate cannot be resolved. Handles are released by their guards.
    pub fn extract_signer_credential(path: &str) -> Option<SignerCredential> {
        let wide_path = to_wide_null_terminated(path);

        let mut h_store = HCERTSTORE(ptr::null_mut());
        let mut h_msg: *mut std::ffi::c_void = ptr::null_mut();
        let mut encoding = CERT_QUERY_ENCODING_TYPE(0);
        let mut content = CERT_QUERY_CONTENT_TYPE(0);
        let mut format = CERT_QUERY_FORMAT_TYPE(0);

        let content_flags = CERT_QUERY_CONTENT_TYPE_FLAGS(
            CERT_QUERY_CONTENT_FLAG_PKCS7_SIGNED.0 | CERT_QUERY_CONTENT_FLAG_PKCS7_SIGNED_EMBED.0,
        );
        let format_flags = CERT_QUERY_FORMAT_TYPE_FLAGS(CERT_QUERY_FORMAT_FLAG_ALL.0);

        unsafe {
            CryptQueryObject(
                CERT_QUERY_OBJECT_FILE,
                wide_path.as_ptr() as *const std::ffi::c_void,
                content_flags,
                format_flags,
                0,
                Some(&mut encoding as *mut CERT_QUERY_ENCODING_TYPE),
                Some(&mut content as *mut CERT_QUERY_CONTENT_TYPE),
                Some(&mut format as *mut CERT_QUERY_FORMAT_TYPE),
                Some(&mut h_store as *mut HCERTSTORE),
                Some(&mut h_msg),
                None,
            )
        }
        .ok()?;

        let _store = CertStoreHandle::new(h_store);
        let msg = CryptMsgHandle::new(h_msg);
        if msg.is_null() {
            return None;
        }
        let cert = CertContextHandle::from_crypto_message(*msg).ok()?;

        let cert_info = unsafe { &*(*cert.as_ptr()).pCertInfo };

        let subject = name_to_string(&cert_info.Subject)?;
        let issuer = name_to_string(&cert_info.Issuer).unwrap_or_default();

        let oid = cert_info.SignatureAlgorithm.pszObjId;
        let oid = if oid.is_null() {
            None
        } else {
            unsafe { oid.to_string() }.ok()
        };

        Some(SignerCredential {
            subject,
            issuer,
            valid_from: filetime_to_datetime(cert_info.NotBefore),
            valid_to: filetime_to_datetime(cert_info.NotAfter),
            signature_algorithm: algorithm_friendly_name(oid.as_deref()),
        })
    }

    /// Renders an encoded X.500 name, sizing the buffer with a first call.
    fn name_to_string(name: &CRYPT_INTEGER_BLOB) -> Option<String> {
        let encoding = X509_ASN_ENCODING | PKCS_7_ASN_ENCODING;
        let needed = unsafe { CertNameToStrW(encoding, name, CERT_X500_NAME_STR, None) };
        if needed <= 1 {
            return None;
        }

        let mut buf = vec![0u16; needed as usize];
        let written = unsafe { CertNameToStrW(encoding, name, CERT_X500_NAME_STR, Some(&mut buf)) };
        if written <= 1 {
            return None;
        }
        buf.truncate(written as usize - 1);
        Some(String::from_utf16_lossy(&buf))
    }
}
