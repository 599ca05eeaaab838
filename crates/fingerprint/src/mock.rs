//! Canned fingerprint generator for testing.

use crate::error::{ErrorKind, Result};
use crate::generator::{Fingerprint, FingerprintGenerator};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns pre-registered fingerprints keyed by file name and counts calls.
///
/// Keyed by file name (not full path) so a fingerprint registered for
/// `A.flac` still applies after the file has been moved or copied to a
/// temporary sibling.
#[derive(Default)]
pub struct MockGenerator {
    fingerprints: Mutex<HashMap<PathBuf, Fingerprint>>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn with_fingerprints<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, f64)>) -> Self {
        let fingerprints = entries
            .into_iter()
            .map(|(name, raw, duration)| (PathBuf::from(name), Fingerprint { raw: raw.to_string(), duration }))
            .collect();
        Self { fingerprints: Mutex::new(fingerprints), calls: AtomicUsize::new(0) }
    }

    /// Number of times [`generate`](FingerprintGenerator::generate) was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FingerprintGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, path: &Path) -> Result<Fingerprint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path.file_name().map(PathBuf::from).unwrap_or_default();
        self.fingerprints.lock().get(&name).cloned().ok_or_else(|| {
            exn::Exn::from(ErrorKind::Generation(path.to_path_buf(), "no canned fingerprint".to_string()))
        })
    }
}
