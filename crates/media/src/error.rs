//! Media Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A media error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file could not be read as a media file.
    #[display("could not parse media file: {}", _0.display())]
    Parse(#[error(not(source))] PathBuf),
    /// Tags could not be written to the file.
    #[display("could not save media file: {}", _0.display())]
    Save(#[error(not(source))] PathBuf),
    /// Parsing or saving exceeded its wall-clock ceiling.
    #[display("timed out handling media file: {}", _0.display())]
    Timeout(#[error(not(source))] PathBuf),
    /// The fingerprint could not be generated or decoded.
    #[display("fingerprint unavailable for {}", _0.display())]
    Fingerprint(#[error(not(source))] PathBuf),
    /// The blocking worker running the backend panicked or was cancelled.
    #[display("media backend task failed: {_0}")]
    Worker(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Worker(_))
    }
}
