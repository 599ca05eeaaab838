//! Processing a whole source tree.
//!
//! [`process`] discovers every media file under a source directory and runs
//! the rule pipeline over each of them. Files are grouped into one worker per
//! top-level directory (plus one for loose files in the root); each worker
//! handles its files one at a time, in path order. Workers run one after
//! another, or concurrently up to `processing.max_workers` when
//! `processing.parallel` is set.

use crate::context::{ProcessingContext, Services};
use crate::counters::{Counter, CounterSnapshot};
use crate::engine::{Outcome, RuleEngine};
use crate::error::{ErrorKind, Result};
use crate::rules;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use shelver_config::Config;
use shelver_storage::FileInfo;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Progress events emitted by [`process`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once.
/// 3. [`Processed`](Self::Processed), zero or more times, one per file.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// A discovery failure ends the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum ProcessEvent {
    Started,
    DiscoveryComplete { files: u64, workers: u64 },
    Processed(FileReport),
    Complete(CounterSnapshot),
}

/// Everything the pipeline did with one incoming file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcomes: Vec<Outcome>,
}

impl FileReport {
    /// The outcome that ended the pipeline, if any rule ran.
    pub fn last(&self) -> Option<&Outcome> {
        self.outcomes.last()
    }
}

/// Files handled by one worker, in processing order.
struct Worker {
    services: Arc<Services>,
    config: Arc<Config>,
    engine: Arc<RuleEngine<ProcessingContext>>,
    files: Vec<FileInfo>,
}

impl Worker {
    async fn run(self) -> Vec<Result<FileReport>> {
        let mut reports = Vec::with_capacity(self.files.len());
        for file in self.files {
            if self.services.is_stopping() {
                tracing::debug!(path = %file.path.display(), "Stopping, file left untouched");
                break;
            }
            let span = tracing::info_span!("file", path = %file.path.display());
            let report = Self::run_file(&self.services, &self.config, &self.engine, file).instrument(span).await;
            reports.push(report);
        }
        let purged = self.services.cache.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        reports
    }

    async fn run_file(
        services: &Arc<Services>,
        config: &Arc<Config>,
        engine: &RuleEngine<ProcessingContext>,
        file: FileInfo,
    ) -> Result<FileReport> {
        services.counters.incr(Counter::Scanned);
        let path = file.path.clone();
        let mut ctx = ProcessingContext::new(Arc::clone(services), Arc::clone(config), file);
        match engine.run(&mut ctx).await {
            Ok(outcomes) => Ok(FileReport { path, outcomes }),
            Err(e) => {
                services.counters.incr(Counter::Errors);
                Err(e).or_raise(|| ErrorKind::Process(path))
            },
        }
    }
}

/// List `source` and group its media files by top-level directory.
///
/// Files inside the library target are left out, so a source that contains
/// the library does not feed the library back into itself.
async fn discover(services: &Services, config: &Config, source: &Path) -> Result<BTreeMap<Option<PathBuf>, Vec<FileInfo>>> {
    let files = services.storage.list(source).await.or_raise(|| ErrorKind::Discovery(source.to_path_buf()))?;
    let target = config.library.target.as_deref();

    let mut groups: BTreeMap<Option<PathBuf>, Vec<FileInfo>> = BTreeMap::new();
    for file in files {
        if !config.library.is_media(file.extension().as_deref()) {
            continue;
        }
        if target.is_some_and(|t| file.path.starts_with(t)) {
            continue;
        }
        let Ok(relative) = file.path.strip_prefix(source) else {
            continue;
        };
        let mut components = relative.components();
        let first = components.next().map(|c| PathBuf::from(c.as_os_str()));
        let key = first.filter(|_| components.next().is_some());
        groups.entry(key).or_default().push(file);
    }
    for files in groups.values_mut() {
        files.sort_by(|a, b| a.path.cmp(&b.path));
    }
    Ok(groups)
}

/// Streams [`ProcessEvent`]s while running the pipeline over every media
/// file under `source`.
///
/// Only a discovery failure is fatal. A file whose pipeline raised an error
/// is surfaced as an `Err` item (and counted) without ending the stream.
///
/// After [`Services::stop`], workers finish their current file and skip the
/// rest; the stream still waits for every worker and ends with
/// [`Complete`](ProcessEvent::Complete). Dropping the stream early instead
/// leaves spawned workers running unobserved, so drain it.
pub fn process(services: Arc<Services>, config: Arc<Config>, source: PathBuf) -> impl Stream<Item = Result<ProcessEvent>> {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ProcessEvent::Started);

        let groups = match discover(&services, &config, &source).await {
            Ok(groups) => groups,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let files = groups.values().map(Vec::len).sum::<usize>();
        yield Ok(ProcessEvent::DiscoveryComplete {
            files: u64::try_from(files).unwrap_or(u64::MAX),
            workers: u64::try_from(groups.len()).unwrap_or(u64::MAX),
        });
        tracing::info!(source = %source.display(), files, workers = groups.len(), "Discovery complete");

        let engine = Arc::new(rules::pipeline(&services, &config));
        let workers = groups.into_values().map(|files| Worker {
            services: Arc::clone(&services),
            config: Arc::clone(&config),
            engine: Arc::clone(&engine),
            files,
        });

        if config.processing.parallel {
            let semaphore = Arc::new(Semaphore::new(config.processing.max_workers));
            let mut running = FuturesUnordered::new();
            for worker in workers {
                let semaphore = Arc::clone(&semaphore);
                running.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    worker.run().await
                }));
            }
            while let Some(joined) = running.next().await {
                match joined.or_raise(|| ErrorKind::Worker("processing task failed".to_string())) {
                    Ok(reports) => {
                        for report in reports {
                            yield report.map(ProcessEvent::Processed);
                        }
                    },
                    Err(e) => {
                        services.counters.incr(Counter::Errors);
                        yield Err(e);
                    },
                }
            }
        } else {
            for worker in workers {
                for report in worker.run().await {
                    yield report.map(ProcessEvent::Processed);
                }
            }
        }

        yield Ok(ProcessEvent::Complete(services.counters.snapshot()));
    })
}
