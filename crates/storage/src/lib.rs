//! Filesystem access for shelver.
//!
//! Everything the library does to disk goes through a [`StorageBackend`], so
//! a dry run can swap in a read-only wrapper and tests can use an in-memory
//! backend.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
