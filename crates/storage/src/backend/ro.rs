//! Read-only storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and prevents mutating operations from executing, but
//! indicating success on return.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result, models::FileInfo};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all mutating operations, logging
/// an [`info event`](tracing::Event). Used for dry runs so that nothing can
/// reach the disk even if a decision slips past the pipeline's dry-run stop.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        self.inner.list_stream(dir)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(path = %path.display(), bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        tracing::info!(from = %from.display(), to = %to.display(), "Skipping copy during read-only mode");
        Ok(self.inner.stat(from).await?.size)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tracing::info!(from = %from.display(), to = %to.display(), "Skipping rename/move during read-only mode");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Skipping delete during read-only mode");
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<bool> {
        tracing::info!(path = %path.display(), "Skipping directory creation during read-only mode");
        Ok(!self.inner.exists(path).await?)
    }

    async fn available_space(&self, path: &Path) -> Result<u64> {
        self.inner.available_space(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mutations_are_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let inner: BackendHandle = Arc::new(LocalBackend::new("local"));
        let existing = temp_dir.path().join("keep.txt");
        inner.write(&existing, b"data").await.unwrap();

        let backend = ReadOnlyBackend::new(inner.clone());
        backend.write(&temp_dir.path().join("new.txt"), b"data").await.unwrap();
        backend.delete(&existing).await.unwrap();
        backend.rename(&existing, &temp_dir.path().join("moved.txt")).await.unwrap();
        assert!(backend.create_dir_all(&temp_dir.path().join("dir")).await.unwrap());

        assert!(inner.exists(&existing).await.unwrap());
        assert!(!inner.exists(&temp_dir.path().join("new.txt")).await.unwrap());
        assert!(!inner.exists(&temp_dir.path().join("moved.txt")).await.unwrap());
        assert!(!inner.exists(&temp_dir.path().join("dir")).await.unwrap());
        assert_eq!(std::fs::read(&existing).unwrap(), b"data");
    }
}
