//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local
//! filesystem using `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use shelver_storage::backend::{LocalBackend, StorageBackend};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local");
/// let files = backend.list(Path::new("/music/incoming")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
}
impl LocalBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Re-use same data collection from file metadata for both list and stat functions
    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Writing this helper function is the only way I could find to stay sane
    /// inside that stream loop where you can't `?` errors. You have to convert
    /// them to the right type, yield them, then continue the loop.
    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(Self::metadata(&validate_path(&path)?, metadata)?));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        let start = match validate_path(dir) {
            Ok(dir) => dir,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![start];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Asking for the contents of a directory that doesn't
                    // exist results in an empty list not an error.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path));
        }
        Self::metadata(&path, metadata)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        Self::ensure_parent(&path).await?;
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        Self::ensure_parent(&to).await?;
        Ok(fs::copy(&from, &to).await.map_err(|e| Self::map_io_error(e, &from))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        Self::ensure_parent(&to).await?;
        match fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            // Source and target live on different volumes: copy then remove.
            // Not atomic, but the target only appears once fully written.
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                tracing::debug!(from = %from.display(), to = %to.display(), "Rename crosses devices, copying instead");
                fs::copy(&from, &to).await.map_err(|e| Self::map_io_error(e, &from))?;
                if let Err(e) = fs::remove_file(&from).await {
                    tracing::warn!(path = %from.display(), error = %e, "Copied across devices but could not remove source");
                }
                Ok(())
            },
            Err(e) => Err(exn::Exn::from(Self::map_io_error(e, &from))),
        }
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        if fs::try_exists(&path).await.map_err(ErrorKind::Io)? {
            return Ok(false);
        }
        // `create_dir_all` succeeds when another worker won the race.
        fs::create_dir_all(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        Ok(true)
    }

    async fn available_space(&self, path: &Path) -> Result<u64> {
        let path = validate_path(path)?;
        // Refreshing the disk list touches every mount; keep it off the runtime.
        let space = tokio::task::spawn_blocking(move || {
            let disks = Disks::new_with_refreshed_list();
            disks
                .list()
                .iter()
                .filter(|disk| path.starts_with(disk.mount_point()))
                .max_by_key(|disk| disk.mount_point().components().count())
                .map(|disk| disk.available_space())
        })
        .await
        .map_err(|e| ErrorKind::BackendError(format!("disk space probe failed: {e}")))?;
        space.ok_or_else(|| exn::Exn::from(ErrorKind::BackendError("no disk found for path".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let path = temp_dir.path().join("test.txt");
        backend.write(&path, b"Hello, world!").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"Hello, world!");
    }

    #[tokio::test]
    async fn test_relative_paths_rejected() {
        let backend = LocalBackend::new("name");
        let err = backend.stat(Path::new("relative/file.flac")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let path = temp_dir.path().join("a/b/c/file.txt");
        backend.write(&path, b"data").await.unwrap();
        assert!(backend.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let path = temp_dir.path().join("exists.txt");
        assert!(!backend.exists(&path).await.unwrap());
        backend.write(&path, b"data").await.unwrap();
        assert!(backend.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let path = temp_dir.path().join("file.txt");
        backend.write(&path, b"data").await.unwrap();
        backend.delete(&path).await.unwrap();
        assert!(!backend.exists(&path).await.unwrap());
        // Deleting nonexistent file returns error
        let err = backend.delete(&path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_copy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let from = temp_dir.path().join("from.txt");
        let to = temp_dir.path().join("nested/to.txt");
        backend.write(&from, b"12345").await.unwrap();
        assert_eq!(backend.copy(&from, &to).await.unwrap(), 5);
        assert!(backend.exists(&from).await.unwrap());
        assert_eq!(std::fs::read(&to).unwrap(), b"12345");
    }

    #[tokio::test]
    async fn test_rename_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let old = temp_dir.path().join("old.txt");
        let new = temp_dir.path().join("a/b/new.txt");
        backend.write(&old, b"fresh").await.unwrap();
        backend.write(&new, b"stale").await.unwrap();
        backend.rename(&old, &new).await.unwrap();
        assert!(!backend.exists(&old).await.unwrap());
        assert_eq!(std::fs::read(&new).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_rename_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let err = backend
            .rename(&temp_dir.path().join("missing.txt"), &temp_dir.path().join("new.txt"))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let path = temp_dir.path().join("file.FLAC");
        backend.write(&path, b"Hello, world!").await.unwrap();
        let info = backend.stat(&path).await.unwrap();
        assert_eq!(info.path, path);
        assert_eq!(info.size, 13);
        assert_eq!(info.extension().as_deref(), Some("flac"));
    }

    #[tokio::test]
    async fn test_stat_directory_is_not_a_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let err = backend.stat(temp_dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_dir_all_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let dir = temp_dir.path().join("Artist/Album");
        assert!(backend.create_dir_all(&dir).await.unwrap());
        assert!(!backend.create_dir_all(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let root = temp_dir.path();
        backend.write(&root.join("b/2.flac"), b"data").await.unwrap();
        backend.write(&root.join("a/1.flac"), b"data").await.unwrap();
        backend.write(&root.join("a/sub/3.flac"), b"data").await.unwrap();
        backend.write(&root.join("0.mp3"), b"data").await.unwrap();
        let files = backend.list(root).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.strip_prefix(root).unwrap().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("0.mp3"),
                PathBuf::from("a/1.flac"),
                PathBuf::from("a/sub/3.flac"),
                PathBuf::from("b/2.flac"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_nonexistent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        let files = backend.list(&temp_dir.path().join("nonexistent")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_available_space() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name");
        // Some sandboxes don't expose any mount points; only check it doesn't blow up.
        if let Ok(space) = backend.available_space(temp_dir.path()).await {
            assert!(space > 0);
        }
    }
}
