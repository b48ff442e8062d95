use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Converts a Rust `&str` to a Windows wide string (`Vec<u16>`) with a
/// trailing null terminator suitable for passing to Win32 APIs.
pub fn to_wide_null_terminated(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Converts a FILETIME tick count (100ns intervals since 1601-01-01 UTC)
/// to a UTC timestamp. Sub-second precision is dropped.
///
/// Returns `None` for values before the Unix epoch or beyond chrono's range.
pub fn filetime_ticks_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    const FILETIME_TO_UNIX_EPOCH: u64 = 116_444_736_000_000_000;
    const HUNDRED_NANOSECONDS_PER_SECOND: u64 = 10_000_000;

    let unix = ticks.checked_sub(FILETIME_TO_UNIX_EPOCH)? / HUNDRED_NANOSECONDS_PER_SECOND;
    DateTime::from_timestamp(i64::try_from(unix).ok()?, 0)
}

/// Converts a Windows FILETIME structure to a DateTime<Utc>
#[cfg(windows)]
pub fn filetime_to_datetime(
    ft: windows::Win32::Foundation::FILETIME,
) -> Option<DateTime<Utc>> {
    filetime_ticks_to_datetime(((ft.dwHighDateTime as u64) << 32) | (ft.dwLowDateTime as u64))
}

/// `path` with `suffix` appended to its final component: `app.bin` + `.sig`
/// gives `app.bin.sig`.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
