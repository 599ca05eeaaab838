//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the filesystem operations the library performs on source,
//! target and auxiliary directories.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::FileInfo;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous. It's a glorified CRUD interface,
/// but in ✨Rust✨
///
/// # Path Handling
/// All paths are absolute and are validated (and lexically normalized) using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation, and every [`FileInfo`] they return carries the
/// normalized path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shelver_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_hardcoded_file(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("/music/Artist/Album/01.flac");
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List all files under a directory, recursively.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] and sort them
    /// by path, giving callers a stable processing order.
    async fn list(&self, dir: &Path) -> Result<Vec<FileInfo>> {
        let mut files: Vec<FileInfo> = self.list_stream(dir).try_collect().await?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Stream metadata for every file under a directory, recursively.
    ///
    /// Yields results incrementally and in no particular order. Asking for
    /// the contents of a directory that doesn't exist results in an empty
    /// stream, not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use shelver_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Path::new("/music"));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Write file contents, creating or overwriting the file.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Copy a file, returning the number of bytes copied.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - If the destination already exists, it will be overwritten.
    async fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Rename/move a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - If the destination already exists, it will be overwritten
    ///   atomically where the backend supports it.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Create a directory and all of its parents.
    ///
    /// Returns `true` if the directory was created, `false` if it already
    /// existed. Racing another caller for the same directory is not an error.
    async fn create_dir_all(&self, path: &Path) -> Result<bool>;

    /// Free space, in bytes, on the volume that would hold `path`.
    ///
    /// `path` doesn't need to exist yet.
    async fn available_space(&self, path: &Path) -> Result<u64>;

    /// Check that `required` bytes are free on the volume that would hold
    /// `path`, returning the free space.
    ///
    /// Fails with [`InsufficientSpace`](ErrorKind::InsufficientSpace) when
    /// there is not enough room.
    async fn ensure_space(&self, path: &Path, required: u64) -> Result<u64> {
        let available = self.available_space(path).await?;
        if available < required {
            exn::bail!(ErrorKind::InsufficientSpace { path: path.to_path_buf(), required, available });
        }
        Ok(available)
    }
}
