//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each submodule has its own
//! `ErrorKind`; public entry points raise them into this one.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("issue with path generation from template")]
    Template,
    #[display("similarity scan failed")]
    Scan,
    #[display("file operation failed")]
    Organize,
    #[display("metadata provider failed")]
    Provider,
    /// A rule was run against a context it does not support.
    #[display("rule `{_0}` could not run")]
    Rule(#[error(not(source))] String),
    #[display("could not list source directory {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    #[display("processing failed for {}", _0.display())]
    Process(#[error(not(source))] PathBuf),
    /// A worker task panicked or was cancelled.
    #[display("worker failed: {_0}")]
    Worker(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
