// RAII owners for Win32 trust and crypto handles.
// Each guard releases its handle on drop.

use crate::utils::to_wide_null_terminated;
use std::ops::Deref;
use std::ptr;
use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Security::Cryptography::*;
use windows::Win32::Security::WinTrust::*;

/// One WinVerifyTrust request for a file path.
///
/// The wide path, `WINTRUST_FILE_INFO` and `WINTRUST_DATA` are boxed so the
/// raw pointers between them stay valid for the lifetime of the session. Any
/// state the provider opened is closed with `WTD_STATEACTION_CLOSE` on drop.
pub struct TrustSession {
    wide_path: Vec<u16>,
    file_info: Box<WINTRUST_FILE_INFO>,
    data: Box<WINTRUST_DATA>,
}

impl TrustSession {
    /// Builds a generic-verify request: no UI, no revocation checks.
    pub fn for_file(path: &str) -> Self {
        let wide_path = to_wide_null_terminated(path);

        let mut file_info = Box::new(WINTRUST_FILE_INFO {
            cbStruct: std::mem::size_of::<WINTRUST_FILE_INFO>() as u32,
            pcwszFilePath: PCWSTR::from_raw(wide_path.as_ptr()),
            hFile: HANDLE(ptr::null_mut()),
            pgKnownSubject: ptr::null_mut(),
        });

        let mut data = Box::new(WINTRUST_DATA {
            cbStruct: std::mem::size_of::<WINTRUST_DATA>() as u32,
            pPolicyCallbackData: ptr::null_mut(),
            pSIPClientData: ptr::null_mut(),
            dwUIChoice: WTD_UI_NONE,
            fdwRevocationChecks: WTD_REVOKE_NONE,
            dwUnionChoice: WTD_CHOICE_FILE,
            Anonymous: unsafe { std::mem::zeroed() },
            dwStateAction: WTD_STATEACTION_VERIFY,
            hWVTStateData: HANDLE(ptr::null_mut()),
            pwszURLReference: PWSTR(ptr::null_mut()),
            dwProvFlags: WTD_REVOCATION_CHECK_NONE,
            dwUIContext: WINTRUST_DATA_UICONTEXT(0),
            pSignatureSettings: ptr::null_mut(),
        });
        data.Anonymous.pFile = &mut *file_info as *mut _;

        TrustSession {
            wide_path,
            file_info,
            data,
        }
    }

    /// Issues the verify action and returns the raw HRESULT.
    pub fn verify(&mut self) -> i32 {
        debug_assert_eq!(self.file_info.pcwszFilePath.0, self.wide_path.as_ptr());
        self.data.dwStateAction = WTD_STATEACTION_VERIFY;
        self.call()
    }

    fn call(&mut self) -> i32 {
        let action = WINTRUST_ACTION_GENERIC_VERIFY_V2;
        unsafe {
            WinVerifyTrust(
                HWND(ptr::null_mut()),
                &action as *const GUID as *mut GUID,
                &mut *self.data as *mut WINTRUST_DATA as *mut std::ffi::c_void,
            )
        }
    }
}

impl Drop for TrustSession {
    fn drop(&mut self) {
        if self.data.hWVTStateData != HANDLE(ptr::null_mut()) {
            self.data.dwStateAction = WTD_STATEACTION_CLOSE;
            let _ = self.call();
        }
    }
}

/// The signer certificate of a file's embedded PKCS#7 message, the source of
/// every `SignerCredential` field. Freed with `CertFreeCertificateContext`.
pub struct CertContextHandle(*mut CERT_CONTEXT);

impl CertContextHandle {
    pub fn as_ptr(&self) -> *mut CERT_CONTEXT {
        self.0
    }

    pub fn from_crypto_message(h_msg: *mut std::ffi::c_void) -> Result<Self> {
        let mut signer_cert: *mut CERT_CONTEXT = ptr::null_mut();
        unsafe { CryptMsgGetAndVerifySigner(h_msg, None, 0, Some(&mut signer_cert), None) }?;
        if signer_cert.is_null() {
            return Err(Error::from(CRYPT_E_NOT_FOUND));
        }
        Ok(CertContextHandle(signer_cert))
    }
}

impl Drop for CertContextHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                let _ = CertFreeCertificateContext(Some(self.0));
            }
        }
    }
}

/// The PKCS#7 message `CryptQueryObject` returns for a signed file; the
/// signer certificate is resolved from it. Closed with `CryptMsgClose`.
pub struct CryptMsgHandle(*mut std::ffi::c_void);

impl CryptMsgHandle {
    pub fn new(ptr: *mut std::ffi::c_void) -> Self {
        CryptMsgHandle(ptr)
    }
}

impl Deref for CryptMsgHandle {
    type Target = *mut std::ffi::c_void;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for CryptMsgHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                let _ = CryptMsgClose(Some(self.0));
            }
        }
    }
}

/// The certificate store embedded alongside the PKCS#7 message. The credential
/// query never reads from it but owns it once `CryptQueryObject` succeeds.
/// Closed with `CertCloseStore`.
pub struct CertStoreHandle(HCERTSTORE);

impl CertStoreHandle {
    pub fn new(handle: HCERTSTORE) -> Self {
        CertStoreHandle(handle)
    }
}

impl Drop for CertStoreHandle {
    fn drop(&mut self) {
        if !self.0 .0.is_null() {
            unsafe {
                let _ = CertCloseStore(self.0, 0);
            }
        }
    }
}
