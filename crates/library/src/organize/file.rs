use crate::context::Services;
use crate::counters::Counter;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use exn::{OptionExt, ResultExt};
use shelver_media::{MediaItem, save_with_timeout};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Hidden sibling of `target` used while writing it.
pub fn temp_path(target: &Path) -> PathBuf {
    let name = target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    target.with_file_name(format!(".{name}.shelver-tmp"))
}

/// Create `dir` and its parents if missing. Already existing is not an error.
pub async fn ensure_dir(services: &Services, dir: &Path) -> LibraryResult<()> {
    let created = services
        .storage
        .create_dir_all(dir)
        .await
        .or_raise(|| OrganizeErrorKind::Storage(dir.to_path_buf()))
        .or_raise(|| LibraryErrorKind::Organize)?;
    if created {
        services.counters.incr(Counter::CreatedDirs);
        tracing::info!(dir = %dir.display(), "Created directory");
    }
    Ok(())
}

/// Write `item` (bytes from `source`, tags from `item`) to `target`.
///
/// `source` is deleted afterwards unless it is `target` itself.
#[instrument(skip_all, fields(source = %source.display(), target = %target.display()))]
pub async fn place(
    services: &Services,
    item: &MediaItem,
    source: &Path,
    target: &Path,
    save_timeout: Duration,
) -> LibraryResult<()> {
    place_inner(services, item, source, target, save_timeout).await.or_raise(|| LibraryErrorKind::Organize)
}

async fn place_inner(
    services: &Services,
    item: &MediaItem,
    source: &Path,
    target: &Path,
    save_timeout: Duration,
) -> OrganizeResult<()> {
    let storage = &services.storage;
    let parent = target.parent().ok_or_raise(|| OrganizeErrorKind::Storage(target.to_path_buf()))?;
    ensure_dir(services, parent).await.or_raise(|| OrganizeErrorKind::Storage(parent.to_path_buf()))?;

    let temp = temp_path(target);
    if let Err(e) = stage(services, item, source, &temp, save_timeout).await {
        tracing::warn!(temp = %temp.display(), "Discarding temporary file");
        _ = storage.delete(&temp).await;
        return Err(e);
    }

    let overwriting = storage.exists(target).await.or_raise(|| OrganizeErrorKind::Storage(target.to_path_buf()))?;
    if overwriting {
        tracing::warn!(target = %target.display(), "Overwriting existing file");
    }
    if let Err(e) = storage.rename(&temp, target).await {
        _ = storage.delete(&temp).await;
        return Err(e).or_raise(|| OrganizeErrorKind::Storage(target.to_path_buf()));
    }
    services.cache.invalidate(target);

    if source != target {
        storage.delete(source).await.or_raise(|| OrganizeErrorKind::Storage(source.to_path_buf()))?;
        services.cache.invalidate(source);
    }
    tracing::debug!(overwriting, "Placed file");
    Ok(())
}

/// Copy `source` to `temp`, save tags into it and check the result.
async fn stage(
    services: &Services,
    item: &MediaItem,
    source: &Path,
    temp: &Path,
    save_timeout: Duration,
) -> OrganizeResult<()> {
    let storage = &services.storage;
    storage.copy(source, temp).await.or_raise(|| OrganizeErrorKind::Storage(temp.to_path_buf()))?;

    let mut staged = item.clone();
    staged.set_path(temp);
    save_with_timeout(&services.media, staged, temp, save_timeout)
        .await
        .or_raise(|| OrganizeErrorKind::Save(temp.to_path_buf()))?;

    let info = storage.stat(temp).await.or_raise(|| OrganizeErrorKind::Verify(temp.to_path_buf()))?;
    if info.size == 0 {
        exn::bail!(OrganizeErrorKind::Verify(temp.to_path_buf()));
    }
    Ok(())
}

/// Delete `path`, logging `reason` first.
pub async fn remove(services: &Services, path: &Path, reason: &str) -> LibraryResult<()> {
    tracing::warn!(path = %path.display(), reason, "Deleting file");
    services
        .storage
        .delete(path)
        .await
        .or_raise(|| OrganizeErrorKind::Storage(path.to_path_buf()))
        .or_raise(|| LibraryErrorKind::Organize)?;
    services.cache.invalidate(path);
    services.counters.incr(Counter::Deleted);
    Ok(())
}

/// Write `item`'s embedded artwork to `<album_dir>/<file_name>.<ext>`
/// unless that file already exists. Returns the path written, if any.
pub async fn dump_artwork(
    services: &Services,
    item: &MediaItem,
    album_dir: &Path,
    file_name: &str,
) -> LibraryResult<Option<PathBuf>> {
    let Some(artwork) = item.artwork() else {
        return Ok(None);
    };
    let path = album_dir.join(format!("{file_name}.{}", artwork.extension));
    let storage_error = || OrganizeErrorKind::Storage(path.clone());
    if services.storage.exists(&path).await.or_raise(storage_error).or_raise(|| LibraryErrorKind::Organize)? {
        return Ok(None);
    }
    services
        .storage
        .write(&path, &artwork.data)
        .await
        .or_raise(storage_error)
        .or_raise(|| LibraryErrorKind::Organize)?;
    tracing::info!(path = %path.display(), "Saved artwork");
    Ok(Some(path))
}
