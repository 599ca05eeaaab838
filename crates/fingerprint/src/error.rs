//! Fingerprint Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A fingerprint error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fingerprint operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The encoded fingerprint could not be decoded.
    #[display("malformed fingerprint: {_0}")]
    Malformed(#[error(not(source))] String),
    /// No generator executable could be located on `$PATH`.
    #[display("fingerprint generator not available: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The generator ran but did not produce a usable fingerprint.
    #[display("fingerprint generation failed for {}: {_1}", _0.display())]
    Generation(#[error(not(source))] PathBuf, #[error(not(source))] String),
    /// Generation exceeded its wall-clock ceiling.
    #[display("fingerprint generation timed out: {}", _0.display())]
    Timeout(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io(_))
    }
}
