//! Platform-specific implementations of [`crate::platform::SignatureValidator`].

pub mod codesign;
pub mod linux;
pub mod wintrust;

pub use codesign::MacOsValidator;
pub use linux::LinuxValidator;
pub use wintrust::WindowsValidator;

use crate::error::ValidationError;
use std::path::Path;

/// Every backend starts here: a missing path short-circuits before any
/// platform call is attempted.
pub(crate) fn ensure_exists(path: &Path) -> Result<(), ValidationError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ValidationError::NotFound)
    }
}
