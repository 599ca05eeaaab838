//! Duplicate detection against the target library.
//!
//! [`SimilarityScanner::scan`] walks an album directory (plus any extra
//! directories) looking for files that are the same recording as the
//! incoming one, either by file name alone or by comparing acoustic
//! fingerprints with [`shelver_fingerprint::similarity`].

pub mod error;

use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::scan::error::{ErrorKind as ScanErrorKind, Result as ScanResult};
use exn::{OptionExt, ResultExt};
use rapidfuzz::distance::indel;
use shelver_cache::ParseCache;
use shelver_config::Config;
use shelver_fingerprint::FingerprintGenerator;
use shelver_media::MediaItem;
use shelver_storage::{BackendHandle, FileInfo};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// A file in the target library that may be the same track as the incoming one.
#[derive(Debug, Clone)]
pub struct SimilarCandidate {
    pub path: PathBuf,
    pub size: u64,
    /// Parsed item; `None` in filename-only mode.
    pub item: Option<Arc<MediaItem>>,
    /// Filename ratio (0-100) or fingerprint similarity (0-1), depending on mode.
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityResult {
    pub candidates: Vec<SimilarCandidate>,
    /// At least one file could not be listed, parsed or compared.
    pub had_errors: bool,
}

impl SimilarityResult {
    pub fn contains(&self, path: &Path) -> bool {
        self.candidates.iter().any(|c| c.path == path)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub filename_only: bool,
    /// Minimum filename ratio, 0-100.
    pub filename_threshold: f64,
    /// Minimum fingerprint similarity, 0-1.
    pub similarity_threshold: f64,
    pub fingerprint_timeout: Duration,
    pub media_extensions: Vec<String>,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filename_only: config.duplicates.filename_only,
            filename_threshold: config.duplicates.filename_threshold,
            similarity_threshold: config.duplicates.similarity_threshold,
            fingerprint_timeout: config.processing.fingerprint_timeout(),
            media_extensions: config.library.media_extensions.clone(),
        }
    }

    fn is_media(&self, file: &FileInfo) -> bool {
        file.extension().is_some_and(|ext| self.media_extensions.iter().any(|m| m.eq_ignore_ascii_case(&ext)))
    }
}

/// Case-insensitive fuzzy ratio of two file stems, 0-100.
fn filename_ratio(a: &Path, b: &Path) -> f64 {
    let stem = |p: &Path| p.file_stem().map(|s| s.to_string_lossy().to_lowercase()).unwrap_or_default();
    let (a, b) = (stem(a), stem(b));
    indel::normalized_similarity(a.chars(), b.chars()) * 100.0
}

pub struct SimilarityScanner<'a> {
    storage: &'a BackendHandle,
    cache: &'a ParseCache,
    fingerprinter: &'a dyn FingerprintGenerator,
    options: ScanOptions,
}

impl<'a> SimilarityScanner<'a> {
    pub fn new(
        storage: &'a BackendHandle,
        cache: &'a ParseCache,
        fingerprinter: &'a dyn FingerprintGenerator,
        options: ScanOptions,
    ) -> Self {
        Self { storage, cache, fingerprinter, options }
    }

    /// Find files under `target_dir` and `extra_dirs` similar to `incoming`.
    ///
    /// In fingerprint mode the incoming item gets a fingerprint generated if
    /// it lacks one; failing that is an error. Problems with individual
    /// candidates only set [`SimilarityResult::had_errors`].
    #[instrument(skip_all, fields(incoming = %incoming.path().display(), target = %target_dir.display()))]
    pub async fn scan(
        &self,
        incoming: &mut MediaItem,
        target_dir: &Path,
        extra_dirs: &[PathBuf],
    ) -> LibraryResult<SimilarityResult> {
        self.scan_inner(incoming, target_dir, extra_dirs).await.or_raise(|| LibraryErrorKind::Scan)
    }

    async fn scan_inner(
        &self,
        incoming: &mut MediaItem,
        target_dir: &Path,
        extra_dirs: &[PathBuf],
    ) -> ScanResult<SimilarityResult> {
        if !self.options.filename_only {
            incoming
                .ensure_fingerprint(self.fingerprinter, self.options.fingerprint_timeout)
                .await
                .or_raise(|| ScanErrorKind::Incoming(incoming.path().to_path_buf()))?;
        }
        let incoming: &MediaItem = incoming;
        let reference = match self.options.filename_only {
            true => None,
            false => Some(
                incoming
                    .decoded_fingerprint()
                    .or_raise(|| ScanErrorKind::Incoming(incoming.path().to_path_buf()))?
                    .ok_or_raise(|| ScanErrorKind::Incoming(incoming.path().to_path_buf()))?,
            ),
        };

        let mut result = SimilarityResult::default();
        let mut seen = HashSet::new();
        let dirs = std::iter::once(target_dir).chain(extra_dirs.iter().map(PathBuf::as_path));
        for dir in dirs {
            let files = match self.storage.list(dir).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = ?e, "Could not list directory for similarity scan");
                    result.had_errors = true;
                    continue;
                },
            };
            for file in files.into_iter().filter(|f| self.options.is_media(f)) {
                if !seen.insert(file.path.clone()) {
                    continue;
                }
                let candidate = match reference {
                    None => Ok(self.compare_name(incoming.path(), file)),
                    Some(reference) if file.path != incoming.path() => self.compare_fingerprint(reference, file).await,
                    Some(_) => continue,
                };
                match candidate {
                    Ok(Some(candidate)) => result.candidates.push(candidate),
                    Ok(None) => (),
                    Err(e) => {
                        tracing::warn!(error = ?e, "Could not compare candidate");
                        result.had_errors = true;
                    },
                }
            }
        }
        tracing::debug!(candidates = result.candidates.len(), had_errors = result.had_errors, "Similarity scan complete");
        Ok(result)
    }

    fn compare_name(&self, incoming: &Path, file: FileInfo) -> Option<SimilarCandidate> {
        let score = filename_ratio(incoming, &file.path);
        (score >= self.options.filename_threshold).then(|| SimilarCandidate {
            path: file.path,
            size: file.size,
            item: None,
            score,
        })
    }

    async fn compare_fingerprint(&self, reference: &[u32], file: FileInfo) -> ScanResult<Option<SimilarCandidate>> {
        let candidate_error = || ScanErrorKind::Candidate(file.path.clone());
        let observed = self.cache.generation();
        let mut item = self.cache.get_or_parse(&file.path).await.or_raise(candidate_error)?;
        if !item.has_fingerprint() {
            let mut enriched = (*item).clone();
            enriched
                .ensure_fingerprint(self.fingerprinter, self.options.fingerprint_timeout)
                .await
                .or_raise(candidate_error)?;
            item = self.cache.replace(enriched, observed);
        }
        let decoded = item.decoded_fingerprint().or_raise(candidate_error)?.ok_or_raise(candidate_error)?;
        let threshold = self.options.similarity_threshold;
        let score = shelver_fingerprint::similarity(reference, decoded, threshold);
        tracing::trace!(candidate = %file.path.display(), score, "Compared fingerprints");
        Ok((score >= threshold).then(|| SimilarCandidate { path: file.path, size: file.size, item: Some(item), score }))
    }
}
