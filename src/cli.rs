use clap::{ArgAction, Parser};
use serde::Serialize;
use std::path::PathBuf;

/// Reconcile incoming audio files against an organised music library.
#[derive(Debug, Parser)]
#[command(name = "shelver", version, about)]
pub struct Cli {
    /// Directory holding the incoming files.
    pub source: PathBuf,

    /// Root of the organised library; overrides `library.target`.
    pub target: Option<PathBuf>,

    /// Configuration file to load instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Decide what would happen to every file without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Process top-level source directories concurrently.
    #[arg(long)]
    pub parallel: bool,

    /// Maximum number of concurrent workers in parallel mode.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Additional directory to search for duplicates. Repeatable.
    #[arg(long = "extra-scan-dir", value_name = "DIR")]
    pub extra_scan_dirs: Vec<PathBuf>,

    /// Match duplicates by file name instead of acoustic fingerprint.
    #[arg(long)]
    pub filename_only: bool,

    /// Remove library files replaced by a better incoming copy.
    #[arg(long)]
    pub delete_targets: bool,

    /// Keep incoming files that duplicate library files instead of deleting them.
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Carry on when some library files could not be compared.
    #[arg(long)]
    pub tolerate_scan_errors: bool,

    /// More logging; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,
}

/// The subset of the configuration the command line can set. Only flags the
/// user actually passed are serialized, so everything else falls through to
/// the lower layers.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Overrides {
    library: LibraryOverrides,
    duplicates: DuplicatesOverrides,
    processing: ProcessingOverrides,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct LibraryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_scan_dirs: Option<Vec<PathBuf>>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct DuplicatesOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    filename_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delete_targets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delete_incoming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tolerate_scan_errors: Option<bool>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct ProcessingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_workers: Option<usize>,
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            library: LibraryOverrides {
                target: self.target.clone(),
                extra_scan_dirs: Some(self.extra_scan_dirs.clone()).filter(|dirs| !dirs.is_empty()),
            },
            duplicates: DuplicatesOverrides {
                filename_only: flag(self.filename_only),
                delete_targets: flag(self.delete_targets),
                delete_incoming: self.keep_duplicates.then_some(false),
                tolerate_scan_errors: flag(self.tolerate_scan_errors),
            },
            processing: ProcessingOverrides {
                dry_run: flag(self.dry_run),
                parallel: flag(self.parallel),
                max_workers: self.workers,
            },
        }
    }

    /// Default log filter for the `-v`/`-q` flags.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "info,shelver=debug,shelver_library=debug",
            (false, _) => "debug,shelver=trace,shelver_library=trace",
        }
    }
}
