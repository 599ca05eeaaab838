use crate::MediaItem;
use crate::error::{ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Reads and writes tags for audio files.
///
/// Implementations are synchronous; callers on the async side go through
/// [`parse_with_timeout`] and [`save_with_timeout`], which run them on the
/// blocking pool under a wall-clock ceiling.
pub trait MediaBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Read tags, properties and artwork from `path`.
    fn parse(&self, path: &Path) -> Result<MediaItem>;

    /// Write the tags of `item` into the file at `path`.
    ///
    /// `path` is usually, but not necessarily, `item.path()`: the library
    /// writes tags into a temporary copy before moving it into place.
    fn save(&self, item: &MediaItem, path: &Path) -> Result<()>;
}

pub type MediaHandle = Arc<dyn MediaBackend>;

async fn run_blocking<T, F>(path: &Path, timeout: Duration, task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(task);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => exn::bail!(ErrorKind::Worker(join_error.to_string())),
        Err(_elapsed) => {
            tracing::warn!(path = %path.display(), ?timeout, "Media backend timed out");
            exn::bail!(ErrorKind::Timeout(path.to_path_buf()))
        },
    }
}

/// Parse `path` on the blocking pool, failing after `timeout`.
pub async fn parse_with_timeout(backend: &MediaHandle, path: &Path, timeout: Duration) -> Result<MediaItem> {
    let backend = Arc::clone(backend);
    let owned = path.to_path_buf();
    run_blocking(path, timeout, move || backend.parse(&owned)).await
}

/// Save `item`'s tags into `path` on the blocking pool, failing after `timeout`.
pub async fn save_with_timeout(backend: &MediaHandle, item: MediaItem, path: &Path, timeout: Duration) -> Result<()> {
    let backend = Arc::clone(backend);
    let owned = path.to_path_buf();
    run_blocking(path, timeout, move || backend.save(&item, &owned)).await
}
