//! signinspect - cross-platform code signature inspection
//!
//! Answers "is this file signed, by whom, and is the signature trustworthy?"
//! on Windows (WinVerifyTrust plus the embedded signer certificate), macOS
//! (`codesign`) and Linux (`gpg` detached signatures, then `objdump` for an
//! embedded signature section). Every backend reports through the same
//! [`SignatureResult`] and never panics or returns an `Err` to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use signinspect::{validate_signature, Platform, SignatureService, ValidatorConfig};
//!
//! let result = validate_signature("/usr/bin/ls");
//! if result.is_signed && result.is_valid {
//!     println!("Signed by {}", result.signer_name);
//! }
//!
//! let service = SignatureService::for_platform(Platform::Linux, &ValidatorConfig::default());
//! let summary = service.scan(&["/usr/bin/ls", "/usr/bin/cat"]);
//! println!("{} of {} signed", summary.signed_files, summary.total_files);
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod process;
pub mod result;
pub mod signer_info;
pub mod utils;
pub mod verification;
#[cfg(windows)]
pub mod win32_guards;


pub use backends::{LinuxValidator, MacOsValidator, WindowsValidator};
pub use config::ValidatorConfig;
pub use error::{hr_to_trust_error, ConfigError, ErrorKind, TrustError, ValidationError};
pub use platform::{select, select_with_runner, Platform, SignatureValidator};
pub use process::{CommandRunner, SystemRunner, ToolOutput};
pub use result::{ScanSummary, SignatureResult};
pub use signer_info::SignerCredential;
pub use verification::{validate_signature, SignatureService};
