//! Error types for metadata providers and repair tools.

use derive_more::{Display, Error};

/// A provider error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The service could not be reached.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The service did not answer in time.
    #[display("timed out: {_0}")]
    Timeout(#[error(not(source))] String),
    /// The service answered but refused the request.
    #[display("rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}
