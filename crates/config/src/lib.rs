//! Layered configuration.
//!
//! Values are resolved in order, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A TOML file, by default `config.toml` in the platform config directory
//!    (e.g. `~/.config/shelver/config.toml`).
//! 3. Environment variables prefixed with `SHELVER_`, using `__` to descend
//!    into sections: `SHELVER_PROCESSING__DRY_RUN=true`.
//! 4. Whatever the caller merges on top (CLI flags), see [`Config::figment`].
//!
//! ```toml
//! [library]
//! target = "/srv/music"
//! extra_scan_dirs = ["/srv/music-archive"]
//!
//! [duplicates]
//! delete_targets = true
//!
//! [processing]
//! parallel = true
//! max_workers = 8
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "SHELVER_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: Library,
    pub duplicates: Duplicates,
    pub processing: Processing,
    pub tagging: Tagging,
    pub repair: Repair,
    pub artwork: Artwork,
    pub artist: Artist,
}

/// Where the organised library lives and how files are laid out in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    /// Root of the organised library.
    pub target: Option<PathBuf>,
    /// Template for the artist directory, relative to `target`.
    pub artist_directory: String,
    /// Template for the album directory, relative to the artist directory.
    pub album_directory: String,
    /// Lossless (or otherwise "better") extensions, lowercase without dots.
    pub preferred_extensions: Vec<String>,
    /// Extensions considered media at all.
    pub media_extensions: Vec<String>,
    /// Additional library roots scanned for duplicates.
    pub extra_scan_dirs: Vec<PathBuf>,
}
impl Default for Library {
    fn default() -> Self {
        Self {
            target: None,
            artist_directory: "{{ artist|sanitize }}".to_string(),
            album_directory: "{{ album|sanitize }}".to_string(),
            preferred_extensions: ["flac", "wav", "aiff", "ape", "wv", "alac"].map(String::from).to_vec(),
            media_extensions: [
                "flac", "mp3", "m4a", "ogg", "opus", "wav", "aiff", "ape", "wv", "wma", "aac", "alac",
            ]
            .map(String::from)
            .to_vec(),
            extra_scan_dirs: vec![],
        }
    }
}
impl Library {
    pub fn is_preferred(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| self.preferred_extensions.iter().any(|p| p.eq_ignore_ascii_case(ext)))
    }

    pub fn is_media(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| self.media_extensions.iter().any(|m| m.eq_ignore_ascii_case(ext)))
    }
}

/// How duplicates are detected and what may be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Duplicates {
    /// Delete incoming files that lose against an existing copy.
    pub delete_incoming: bool,
    /// Delete existing copies that lose against an incoming file.
    pub delete_targets: bool,
    /// Compare file names only; never parse or fingerprint candidates.
    pub filename_only: bool,
    /// Fingerprint similarity at or above which two files are the same recording.
    pub similarity_threshold: f64,
    /// Fuzzy file name ratio (0-100) at or above which two files match.
    pub filename_threshold: f64,
    /// Continue when some candidates could not be compared.
    pub tolerate_scan_errors: bool,
}
impl Default for Duplicates {
    fn default() -> Self {
        Self {
            delete_incoming: true,
            delete_targets: false,
            filename_only: false,
            similarity_threshold: 0.99,
            filename_threshold: 95.0,
            tolerate_scan_errors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Processing {
    pub dry_run: bool,
    /// Run top-level source directories concurrently.
    pub parallel: bool,
    pub max_workers: usize,
    pub cache_ttl_secs: u64,
    pub parse_timeout_secs: u64,
    pub fingerprint_timeout_secs: u64,
    /// Bytes that must remain free on the target volume after a move.
    pub min_free_space: u64,
    pub progress_interval_secs: u64,
}
impl Default for Processing {
    fn default() -> Self {
        Self {
            dry_run: false,
            parallel: false,
            max_workers: 4,
            cache_ttl_secs: 300,
            parse_timeout_secs: 5,
            fingerprint_timeout_secs: 10,
            min_free_space: 64 * 1024 * 1024,
            progress_interval_secs: 10,
        }
    }
}
impl Processing {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }

    pub fn fingerprint_timeout(&self) -> Duration {
        Duration::from_secs(self.fingerprint_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

/// Metadata provider lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tagging {
    pub enabled: bool,
    /// Provider names, tried in this order.
    pub providers: Vec<String>,
    /// Retry once with identifying tags cleared when nothing matched.
    pub retry_cleared: bool,
    pub overwrite: Overwrite,
    pub retry: Retry,
}
impl Default for Tagging {
    fn default() -> Self {
        Self {
            enabled: false,
            providers: vec![],
            retry_cleared: true,
            overwrite: Overwrite::default(),
            retry: Retry::default(),
        }
    }
}

/// Which existing tags a provider match may replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overwrite {
    pub artist: bool,
    pub album: bool,
    pub title: bool,
    pub track_numbers: bool,
}

/// Exponential backoff for provider calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
}
impl Default for Retry {
    fn default() -> Self {
        Self { max_attempts: 3, initial_interval_ms: 500, max_interval_ms: 5_000, multiplier: 2.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repair {
    /// Attempt to repair incoming files that fail to parse.
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artwork {
    /// Write embedded artwork next to the album's files.
    pub dump: bool,
    /// File name (without extension) for dumped artwork.
    pub file_name: String,
}
impl Default for Artwork {
    fn default() -> Self {
        Self { dump: false, file_name: "cover".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    /// Use only the primary artist for directory names (and tags) when the
    /// artist field names several.
    pub simplify: bool,
}

/// Location of the default configuration file, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "shelver").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Figment with defaults, the config file and the environment merged.
    ///
    /// An explicit `file` must exist; the default location is optional.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        match file {
            Some(file) if !file.is_file() => exn::bail!(ErrorKind::NotFound(file.to_path_buf())),
            Some(file) => figment = figment.merge(Toml::file(file)),
            None => {
                if let Some(default) = default_path() {
                    tracing::debug!(path = %default.display(), "Using default config location");
                    figment = figment.merge(Toml::file(default));
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from defaults, config file and environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.duplicates.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            exn::bail!(ErrorKind::Invalid(format!("duplicates.similarity_threshold must be in (0, 1], got {threshold}")));
        }
        let ratio = self.duplicates.filename_threshold;
        if !(ratio > 0.0 && ratio <= 100.0) {
            exn::bail!(ErrorKind::Invalid(format!("duplicates.filename_threshold must be in (0, 100], got {ratio}")));
        }
        if self.processing.max_workers == 0 {
            exn::bail!(ErrorKind::Invalid("processing.max_workers must be at least 1".to_string()));
        }
        if self.processing.parse_timeout_secs == 0 || self.processing.fingerprint_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("processing timeouts must be at least 1 second".to_string()));
        }
        if self.tagging.retry.max_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("tagging.retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}
