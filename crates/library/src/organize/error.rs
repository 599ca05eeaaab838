//! Error types for the [`organize`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organize failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A storage backend operation (copy, rename, delete) failed.
    #[display("storage operation failed on {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
    /// Tags could not be written into the temporary copy.
    #[display("could not save tags into {}", _0.display())]
    Save(#[error(not(source))] PathBuf),
    /// The temporary copy was missing or empty after saving.
    #[display("temporary file failed verification: {}", _0.display())]
    Verify(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
