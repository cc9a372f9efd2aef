//! Error types.

use std::io::ErrorKind;

use thiserror::Error;

/// Result alias for configuration reads.
pub type Result<T> = std::result::Result<T, ConfError>;

/// Errors recorded while reading resolver configuration.
///
/// These never reach callers of the decision engine. They are stored inside
/// [`ResolvConfig`](crate::ResolvConfig) and [`NssConf`](crate::NssConf) so
/// the engine can tell a missing file apart from an unreadable one.
#[derive(Debug, Error)]
pub enum ConfError {
    /// Opening or reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file was readable but malformed.
    #[error("parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The machine's own hostname could not be determined.
    #[error("hostname lookup failed: {0}")]
    Hostname(#[source] std::io::Error),
}

impl ConfError {
    /// Returns `true` if the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == ErrorKind::NotFound)
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == ErrorKind::PermissionDenied)
    }

    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}
