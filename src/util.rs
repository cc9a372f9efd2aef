//! Internal utilities.

use std::io;

use crate::error::{ConfError, Result};

/// Returns the machine's hostname as reported by `gethostname(2)`.
///
/// # Errors
///
/// Returns [`ConfError::Hostname`] if the call fails or the name is not
/// UTF-8.
#[cfg(unix)]
pub fn hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for `buf.len()` bytes and outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return Err(ConfError::Hostname(io::Error::last_os_error()));
    }
    decode_hostname(&buf)
}

/// Returns the machine's hostname. Unsupported off Unix.
///
/// # Errors
///
/// Always returns [`ConfError::Hostname`] wrapping `Unsupported`.
#[cfg(not(unix))]
pub fn hostname() -> Result<String> {
    Err(ConfError::Hostname(io::Error::from(io::ErrorKind::Unsupported)))
}

/// Decodes a NUL-terminated (or full) hostname buffer.
fn decode_hostname(buf: &[u8]) -> Result<String> {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..len].to_vec())
        .map_err(|e| ConfError::Hostname(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// ASCII case-insensitive `ends_with`.
#[must_use]
pub fn has_suffix_fold(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.as_bytes()[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn hostname_is_non_empty() {
        assert!(!hostname().unwrap().is_empty());
    }

    #[test]
    fn decode_stops_at_nul() {
        assert_eq!(decode_hostname(b"buildhost\0\0junk").unwrap(), "buildhost");
        assert_eq!(decode_hostname(b"full").unwrap(), "full");
    }

    #[test]
    fn non_utf8_hostname_is_hostname_error() {
        let err = decode_hostname(b"bad\xff\0").unwrap_err();
        assert!(matches!(
            err,
            ConfError::Hostname(ref e) if e.kind() == io::ErrorKind::InvalidData
        ));
    }

    #[test]
    fn suffix_fold() {
        assert!(has_suffix_fold("foo.LOCAL", ".local"));
        assert!(has_suffix_fold(".local", ".local"));
        assert!(!has_suffix_fold("local", ".local"));
        assert!(!has_suffix_fold("foo.locale", ".local"));
        // Multi-byte prefix must not panic on the byte slice.
        assert!(has_suffix_fold("ü.Local", ".local"));
    }
}
