use crate::error::{ErrorKind, Result};
use crate::tags;
use exn::ResultExt;
use regex::Regex;
use shelver_fingerprint::{FingerprintGenerator, generate_with_timeout};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

static ARTIST_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:,|&|\+|/|;|\bfeat\.?(?:\s|$))\s*").expect("artist separator regex is valid")
});

/// Split a multi-artist credit ("A feat. B", "A & B", ...) into its names.
///
/// ```
/// assert_eq!(shelver_media::split_artist("A feat. B & C"), ["A", "B", "C"]);
/// assert_eq!(shelver_media::split_artist("Solo"), ["Solo"]);
/// ```
pub fn split_artist(name: &str) -> Vec<&str> {
    ARTIST_SEPARATORS.split(name).map(str::trim).filter(|n| !n.is_empty()).collect()
}

/// Embedded cover art.
#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub data: Vec<u8>,
    /// File extension matching the image format, without the dot.
    pub extension: String,
}

/// Snapshot of one audio file: tags, technical properties and fingerprint.
///
/// Tag names are compared case-insensitively; insertion order is kept so
/// that backends write tags back in the order they were read.
#[derive(Debug, Clone, Default)]
pub struct MediaItem {
    path: PathBuf,
    tags: Vec<(String, String)>,
    duration: u64,
    bit_rate: f64,
    artwork: Option<Artwork>,
    decoded: OnceLock<Vec<u32>>,
}

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn with_tag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_bit_rate(mut self, kbps: f64) -> Self {
        self.bit_rate = kbps;
        self
    }

    pub fn with_artwork(mut self, artwork: Artwork) -> Self {
        self.artwork = Some(artwork);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point the item at a new location, e.g. after it has been moved.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Duration in whole seconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Bit rate in kbps.
    pub fn bit_rate(&self) -> f64 {
        self.bit_rate
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.artwork.as_ref()
    }

    pub fn set_artwork(&mut self, artwork: Option<Artwork>) {
        self.artwork = artwork;
    }

    /// All tags in insertion order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Read a tag by name. Empty values read as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.tags[i].1.as_str()).filter(|v| !v.is_empty())
    }

    /// Write a tag, replacing any existing value in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name.eq_ignore_ascii_case(tags::ACOUSTID_FINGERPRINT) {
            self.decoded = OnceLock::new();
        }
        match self.position(name) {
            Some(i) => self.tags[i].1 = value,
            None => self.tags.push((name.to_string(), value)),
        }
    }

    /// Remove a tag, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        if name.eq_ignore_ascii_case(tags::ACOUSTID_FINGERPRINT) {
            self.decoded = OnceLock::new();
        }
        self.position(name).map(|i| self.tags.remove(i).1)
    }

    fn text(&self, name: &str) -> &str {
        self.get(name).map(str::trim).unwrap_or_default()
    }

    pub fn artist(&self) -> &str {
        self.text(tags::ARTIST)
    }

    pub fn sort_artist(&self) -> &str {
        self.text(tags::ARTISTSORT)
    }

    pub fn title(&self) -> &str {
        self.text(tags::TITLE)
    }

    pub fn album(&self) -> &str {
        self.text(tags::ALBUM)
    }

    pub fn album_artist(&self) -> &str {
        self.text(tags::ALBUMARTIST)
    }

    /// Track number; accepts both `3` and `3/12`.
    pub fn track_number(&self) -> Option<u32> {
        number_part(self.get(tags::TRACKNUMBER)?, 0)
    }

    /// Track count, from `TRACKTOTAL` or the second half of `3/12`.
    pub fn track_count(&self) -> Option<u32> {
        self.get(tags::TRACKTOTAL)
            .and_then(|v| number_part(v, 0))
            .or_else(|| number_part(self.get(tags::TRACKNUMBER)?, 1))
    }

    pub fn disc_number(&self) -> Option<u32> {
        number_part(self.get(tags::DISCNUMBER)?, 0)
    }

    pub fn disc_count(&self) -> Option<u32> {
        self.get(tags::DISCTOTAL)
            .and_then(|v| number_part(v, 0))
            .or_else(|| number_part(self.get(tags::DISCNUMBER)?, 1))
    }

    pub fn acoustic_id(&self) -> Option<&str> {
        self.get(tags::ACOUSTID_ID).map(str::trim)
    }

    /// The encoded fingerprint, exactly as stored.
    pub fn fingerprint_raw(&self) -> Option<&str> {
        self.get(tags::ACOUSTID_FINGERPRINT).map(str::trim)
    }

    pub fn fingerprint_duration(&self) -> Option<f64> {
        self.get(tags::ACOUSTID_FINGERPRINT_DURATION)?.trim().parse().ok()
    }

    /// Whether a usable fingerprint and its duration are both present.
    pub fn has_fingerprint(&self) -> bool {
        self.fingerprint_raw().is_some() && self.fingerprint_duration().is_some_and(|d| d > 0.0)
    }

    /// The decoded fingerprint, computed on first access and cached.
    ///
    /// Returns `Ok(None)` when the item has no fingerprint.
    pub fn decoded_fingerprint(&self) -> Result<Option<&[u32]>> {
        if let Some(decoded) = self.decoded.get() {
            return Ok(Some(decoded));
        }
        let Some(raw) = self.fingerprint_raw() else {
            return Ok(None);
        };
        let decoded = shelver_fingerprint::decode(raw).or_raise(|| ErrorKind::Fingerprint(self.path.clone()))?;
        Ok(Some(self.decoded.get_or_init(|| decoded).as_slice()))
    }

    /// Generate and store a fingerprint unless a valid one is already present.
    ///
    /// Returns `true` if a fingerprint was generated.
    pub async fn ensure_fingerprint(&mut self, generator: &dyn FingerprintGenerator, timeout: Duration) -> Result<bool> {
        if self.has_fingerprint() {
            return Ok(false);
        }
        let fingerprint = generate_with_timeout(generator, &self.path, timeout)
            .await
            .or_raise(|| ErrorKind::Fingerprint(self.path.clone()))?;
        tracing::debug!(path = %self.path.display(), generator = generator.name(), "Generated fingerprint");
        self.set(tags::ACOUSTID_FINGERPRINT, fingerprint.raw);
        self.set(tags::ACOUSTID_FINGERPRINT_DURATION, fingerprint.duration.to_string());
        Ok(true)
    }

    /// Every artist name the item mentions.
    ///
    /// The primary and album artist come first, followed by each of them split
    /// on common multi-artist separators. Duplicates (ignoring case) are
    /// dropped, keeping the first spelling seen.
    pub fn all_artist_names(&self) -> Vec<String> {
        let artist = self.artist();
        let album_artist = self.album_artist();
        let whole = [artist, album_artist].into_iter();
        let parts = [artist, album_artist].into_iter().flat_map(|name| ARTIST_SEPARATORS.split(name));

        let mut names: Vec<String> = Vec::new();
        for name in whole.chain(parts).map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
        names
    }
}

fn number_part(value: &str, index: usize) -> Option<u32> {
    value.split('/').nth(index)?.trim().parse().ok()
}
