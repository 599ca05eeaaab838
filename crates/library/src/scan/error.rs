//! Error types for the [`scan`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The incoming file has no usable fingerprint, so nothing can be compared.
    #[display("no fingerprint for incoming file {}", _0.display())]
    Incoming(#[error(not(source))] PathBuf),
    /// A single candidate could not be parsed or compared.
    #[display("could not compare candidate {}", _0.display())]
    Candidate(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
