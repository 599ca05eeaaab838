//! Path validation.
//!
//! Backends only ever deal in absolute paths. Paths are normalized lexically
//! (no filesystem access, symlinks are not resolved) so that the same file
//! always produces the same key in caches and comparisons.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an absolute path.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shelver_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("/music/Artist/Album/01.flac").is_ok());
/// assert!(validate_path("/music/a/../b.flac").is_ok());
/// // Invalid paths
/// assert!(validate_path("relative/file.flac").is_err());
/// assert!(validate_path("/../etc/passwd").is_err());
/// assert!(validate_path("/a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("/wrong/../still-wrong/.././correct//./path.flac/").unwrap(),
///     Path::new("/correct/path.flac")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    }
    let mut root = PathBuf::new();
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls; reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::Prefix(p) => root.push(p.as_os_str()),
            Component::RootDir => root.push(Component::RootDir.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    root.extend(components);
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("/music/Artist/01.flac").unwrap(), Path::new("/music/Artist/01.flac"));
        assert_eq!(validate("/simple.flac").unwrap(), Path::new("/simple.flac"));
        assert_eq!(validate("/").unwrap(), Path::new("/"));
    }

    #[test]
    fn test_path_normalization() {
        // Double slashes are normalized
        assert_eq!(validate("/a//b//c").unwrap(), Path::new("/a/b/c"));
        // Current directory references removed
        assert_eq!(validate("/a/./b/./c").unwrap(), Path::new("/a/b/c"));
        // Parent references resolved lexically
        assert_eq!(validate("/a/b/..").unwrap(), Path::new("/a"));
    }

    #[test]
    fn test_relative_rejected() {
        assert!(validate("a/b").is_err());
        assert!(validate("./a").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("/../etc/passwd").is_err());
        assert!(validate("/a/../../b").is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("/a\0b").is_err());
    }

    #[test]
    fn test_trailing_slashes() {
        assert_eq!(validate("/Artist1/").unwrap(), Path::new("/Artist1"));
        assert_eq!(validate("/a/b/c///").unwrap(), Path::new("/a/b/c"));
    }
}
