//! Shared services and per-file pipeline state.

use crate::counters::Counters;
use crate::error::{ErrorKind, Result};
use crate::provider::{MetadataProvider, Repairer};
use crate::resolve::Resolution;
use crate::scan::SimilarityResult;
use crate::template::PathGenerator;
use exn::OptionExt;
use shelver_cache::ParseCache;
use shelver_config::Config;
use shelver_fingerprint::GeneratorHandle;
use shelver_media::{MediaHandle, MediaItem};
use shelver_storage::{BackendHandle, FileInfo};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Collaborators shared by every worker for the duration of a run.
pub struct Services {
    pub storage: BackendHandle,
    pub media: MediaHandle,
    pub fingerprinter: GeneratorHandle,
    pub cache: ParseCache,
    pub counters: Counters,
    pub providers: Vec<Arc<dyn MetadataProvider>>,
    pub repairer: Option<Arc<dyn Repairer>>,
    pub artist_template: PathGenerator,
    pub album_template: PathGenerator,
    stopping: AtomicBool,
}

impl Services {
    /// Build services for `config`, compiling its directory templates.
    pub fn new(
        config: &Config,
        storage: BackendHandle,
        media: MediaHandle,
        fingerprinter: GeneratorHandle,
    ) -> Result<Self> {
        let artist_template: PathGenerator = config.library.artist_directory.parse()?;
        let album_template: PathGenerator = config.library.album_directory.parse()?;
        let cache =
            ParseCache::new(Arc::clone(&media), config.processing.cache_ttl(), config.processing.parse_timeout());
        Ok(Self {
            storage,
            media,
            fingerprinter,
            cache,
            counters: Counters::default(),
            providers: Vec::new(),
            repairer: None,
            artist_template,
            album_template,
            stopping: AtomicBool::new(false),
        })
    }

    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_repairer(mut self, repairer: Arc<dyn Repairer>) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Ask workers to finish the file they are on and take no more.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

/// State threaded through the rule pipeline for one incoming file.
pub struct ProcessingContext {
    pub services: Arc<Services>,
    pub config: Arc<Config>,
    /// The incoming file as found on disk.
    pub source: FileInfo,
    /// Parsed incoming item; `None` until the parse rule succeeds.
    pub incoming: Option<MediaItem>,
    pub artist_dir: Option<PathBuf>,
    pub album_dir: Option<PathBuf>,
    /// Set when the directory artist was cut down from a multi-artist name.
    pub simplified_artist: Option<String>,
    /// Whether each metadata provider, by name, identified the track.
    pub identified: BTreeMap<String, bool>,
    pub similarity: Option<SimilarityResult>,
    pub resolution: Option<Resolution>,
    /// Nesting level of the engine currently running; 0 for the top level.
    pub depth: u8,
}

impl ProcessingContext {
    pub fn new(services: Arc<Services>, config: Arc<Config>, source: FileInfo) -> Self {
        Self {
            services,
            config,
            source,
            incoming: None,
            artist_dir: None,
            album_dir: None,
            simplified_artist: None,
            identified: BTreeMap::new(),
            similarity: None,
            resolution: None,
            depth: 0,
        }
    }

    pub fn item(&self) -> Result<&MediaItem> {
        self.incoming.as_ref().ok_or_raise(|| ErrorKind::Rule("incoming file has not been parsed".to_string()))
    }

    pub fn item_mut(&mut self) -> Result<&mut MediaItem> {
        self.incoming.as_mut().ok_or_raise(|| ErrorKind::Rule("incoming file has not been parsed".to_string()))
    }

    pub fn is_parsed(&self) -> bool {
        self.incoming.is_some()
    }

    pub fn is_identified(&self) -> bool {
        self.identified.values().any(|v| *v)
    }

    /// Where the incoming file goes: its file name inside the album directory.
    pub fn target_path(&self) -> Option<PathBuf> {
        let name = self.source.path.file_name()?;
        self.album_dir.as_ref().map(|dir| dir.join(name))
    }
}
