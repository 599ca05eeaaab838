mod cli;
mod error;
mod logging;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::{CommandFactory, Parser};
use exn::ResultExt;
use figment::providers::Serialized;
use futures::StreamExt;
use shelver_config::Config;
use shelver_fingerprint::{FpcalcGenerator, GeneratorHandle};
use shelver_library::{CounterSnapshot, ProcessEvent, Services, process};
use shelver_media::{LoftyBackend, MediaHandle};
use shelver_storage::BackendHandle;
use shelver_storage::backend::{LocalBackend, ReadOnlyBackend};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn load_config(cli: &Cli) -> Result<Config> {
    let figment = Config::figment(cli.config.as_deref())
        .or_raise(|| ErrorKind::Config)?
        .merge(Serialized::globals(cli.overrides()));
    let mut config = Config::from_figment(figment).or_raise(|| ErrorKind::Config)?;
    if let Some(target) = config.library.target.take() {
        config.library.target = Some(absolute(&target)?);
    }
    config.library.extra_scan_dirs =
        config.library.extra_scan_dirs.iter().map(|dir| absolute(dir)).collect::<Result<_>>()?;
    Ok(config)
}

fn absolute(path: &Path) -> Result<std::path::PathBuf> {
    std::path::absolute(path).or_raise(|| ErrorKind::Path(path.to_path_buf()))
}

fn fingerprinter(config: &Config) -> Result<GeneratorHandle> {
    match FpcalcGenerator::discover() {
        Ok(generator) => Ok(Arc::new(generator)),
        // Fingerprints are only generated on demand in filename-only mode.
        Err(e) if config.duplicates.filename_only => {
            warn!(error = %e, "fpcalc not available, fingerprints will not be generated");
            Ok(Arc::new(FpcalcGenerator::new("fpcalc")))
        },
        Err(e) => Err(e).or_raise(|| ErrorKind::Setup("fingerprint generator".to_string())),
    }
}

fn services(config: &Config) -> Result<Services> {
    let local: BackendHandle = Arc::new(LocalBackend::new("local"));
    let storage: BackendHandle = match config.processing.dry_run {
        true => Arc::new(ReadOnlyBackend::new(local)),
        false => local,
    };
    let media: MediaHandle = Arc::new(LoftyBackend);
    Services::new(config, storage, media, fingerprinter(config)?).or_raise(|| ErrorKind::Setup("services".to_string()))
}

async fn run(config: Config, source: &Path) -> Result<CounterSnapshot> {
    let config = Arc::new(config);
    let services = Arc::new(services(&config)?);

    let progress = {
        let services = Arc::clone(&services);
        let period = config.processing.progress_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                info!(counters = %services.counters.snapshot(), "Progress");
            }
        })
    };

    let mut events = std::pin::pin!(process(Arc::clone(&services), Arc::clone(&config), source.to_path_buf()));
    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(ProcessEvent::Started)) => info!(source = %source.display(), "Scanning source"),
                Some(Ok(ProcessEvent::DiscoveryComplete { files, workers })) => info!(files, workers, "Found incoming files"),
                Some(Ok(ProcessEvent::Processed(report))) => {
                    if let Some(last) = report.last() {
                        debug!(path = %report.path.display(), rule = %last.rule, success = last.success, "{}", last.message);
                    }
                },
                Some(Ok(ProcessEvent::Complete(_))) => {},
                Some(Err(e)) => error!(error = ?e, "Processing failed"),
                None => break,
            },
            _ = &mut interrupt, if !services.is_stopping() => {
                warn!("Interrupted, stopping after the current files");
                services.stop();
            },
        }
    }
    progress.abort();

    let snapshot = services.counters.snapshot();
    info!(counters = %snapshot, "Finished");
    Ok(snapshot)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_filter());

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, "Could not start");
            return ExitCode::from(2);
        },
    };
    if config.library.target.is_none() {
        Cli::command()
            .error(clap::error::ErrorKind::MissingRequiredArgument, "no TARGET given and `library.target` is not configured")
            .exit();
    }
    let source = match absolute(&cli.source) {
        Ok(source) => source,
        Err(e) => {
            error!(error = ?e, "Could not start");
            return ExitCode::from(2);
        },
    };

    match run(config, &source).await {
        Ok(snapshot) if snapshot.errors == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = ?e, "Could not start");
            ExitCode::from(2)
        },
    }
}
