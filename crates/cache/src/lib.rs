//! In-memory cache of parsed media items.
//!
//! Parsing tags is the most expensive thing the library does short of
//! fingerprinting, and the same target files get parsed over and over while
//! looking for duplicates. The cache is not a source of truth: every mutation
//! of a file on disk must be followed by [`ParseCache::invalidate`] for its
//! path, and entries expire after a fixed time-to-live regardless.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use parking_lot::RwLock;
use shelver_media::{MediaHandle, MediaItem, parse_with_timeout};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry {
    item: Arc<MediaItem>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<PathBuf, Entry>,
    // Bumped by every invalidation. Anything read before an invalidation
    // must not repopulate the cache.
    generation: u64,
}

/// Point in the cache's invalidation history.
///
/// Taken with [`ParseCache::generation`] before reading a snapshot, and
/// handed back to [`ParseCache::replace`] so that an enriched copy of a
/// snapshot cannot outlive a later write to the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Path-keyed, time-bounded cache of [`MediaItem`]s.
///
/// Shared across workers; all methods take `&self`.
pub struct ParseCache {
    backend: MediaHandle,
    state: RwLock<State>,
    ttl: Duration,
    parse_timeout: Duration,
}

impl ParseCache {
    pub fn new(backend: MediaHandle, ttl: Duration, parse_timeout: Duration) -> Self {
        Self { backend, state: RwLock::new(State::default()), ttl, parse_timeout }
    }

    pub fn backend(&self) -> &MediaHandle {
        &self.backend
    }

    /// The current generation, to be passed to [`replace`](Self::replace).
    pub fn generation(&self) -> Generation {
        Generation(self.state.read().generation)
    }

    fn lookup(&self, path: &Path) -> Option<Arc<MediaItem>> {
        let state = self.state.read();
        state.entries.get(path).filter(|e| e.expires_at > Instant::now()).map(|e| Arc::clone(&e.item))
    }

    /// Insert `item` unless the cache was invalidated since `observed`.
    fn store(&self, path: PathBuf, item: Arc<MediaItem>, observed: Generation) -> bool {
        let mut state = self.state.write();
        if state.generation != observed.0 {
            return false;
        }
        let expires_at = Instant::now() + self.ttl;
        state.entries.insert(path, Entry { item, expires_at });
        true
    }

    /// Return the cached item for `path`, parsing it on a miss.
    ///
    /// Parse failures are not cached.
    pub async fn get_or_parse(&self, path: &Path) -> Result<Arc<MediaItem>> {
        if let Some(item) = self.lookup(path) {
            tracing::trace!(path = %path.display(), "Parse cache hit");
            return Ok(item);
        }
        let observed = self.generation();
        let item = parse_with_timeout(&self.backend, path, self.parse_timeout)
            .await
            .or_raise(|| ErrorKind::Parse(path.to_path_buf()))?;
        let item = Arc::new(item);
        if !self.store(path.to_path_buf(), Arc::clone(&item), observed) {
            tracing::debug!(path = %path.display(), "Cache invalidated during parse, not storing result");
        }
        Ok(item)
    }

    /// Cache an item that was modified in memory, keyed by its own path.
    ///
    /// Used after enriching a cached item (e.g. with a freshly generated
    /// fingerprint) so later lookups don't redo the work. `observed` must
    /// have been taken before the original snapshot was read; if anything
    /// was invalidated since, the item is returned but not cached.
    pub fn replace(&self, item: MediaItem, observed: Generation) -> Arc<MediaItem> {
        let item = Arc::new(item);
        if !self.store(item.path().to_path_buf(), Arc::clone(&item), observed) {
            tracing::debug!(path = %item.path().display(), "Cache invalidated since snapshot, not storing enriched item");
        }
        item
    }

    /// Drop the entry for `path`. Returns `true` if there was one.
    pub fn invalidate(&self, path: &Path) -> bool {
        let mut state = self.state.write();
        state.generation += 1;
        let removed = state.entries.remove(path).is_some();
        drop(state);
        if removed {
            tracing::trace!(path = %path.display(), "Invalidated parse cache entry");
        }
        removed
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.expires_at > now);
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
