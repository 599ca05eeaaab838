//! Deciding what happens to an incoming file that may duplicate others.
//!
//! The decision is pure: [`ResolutionPolicy`] looks at file paths, sizes
//! and extension quality classes and returns a [`Resolution`]. Carrying it
//! out is the job of [`organize`](crate::organize).

use crate::scan::SimilarCandidate;
use derive_more::Display;
use shelver_config::{Config, Duplicates, Library};
use shelver_storage::FileInfo;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Resolution {
    /// Nothing similar exists; place the incoming file at `target`.
    #[display("move to {}", target.display())]
    MoveAsNew { target: PathBuf },
    /// Write the incoming file to `target`, replacing whatever is there, then
    /// remove each path in `remove`.
    #[display("overwrite {} and remove {} other copies", target.display(), remove.len())]
    Overwrite { target: PathBuf, remove: Vec<PathBuf> },
    /// The incoming file is a redundant copy; delete it.
    #[display("delete incoming file: {reason}")]
    DeleteIncoming { reason: String },
    /// The incoming file is a redundant copy, but deletion is disabled.
    #[display("keep duplicate: {reason}")]
    KeptDuplicate { reason: String },
    #[display("leave as is: {reason}")]
    NoOp { reason: String },
}

impl Resolution {
    /// Whether carrying this out writes a file into the library.
    pub fn writes(&self) -> bool {
        matches!(self, Self::MoveAsNew { .. } | Self::Overwrite { .. })
    }
}

pub struct ResolutionPolicy<'a> {
    library: &'a Library,
    duplicates: &'a Duplicates,
}

impl<'a> ResolutionPolicy<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { library: &config.library, duplicates: &config.duplicates }
    }

    fn is_preferred(&self, path: &Path) -> bool {
        self.library.is_preferred(path.extension().and_then(|e| e.to_str()))
    }

    /// Resolve `incoming` against any number of candidates.
    pub fn resolve(&self, incoming: &FileInfo, target: &Path, candidates: &[SimilarCandidate]) -> Resolution {
        match candidates {
            [] => self.none(target),
            [candidate] => self.single(incoming, target, candidate),
            many => self.multiple(incoming, target, many),
        }
    }

    pub fn none(&self, target: &Path) -> Resolution {
        Resolution::MoveAsNew { target: target.to_path_buf() }
    }

    pub fn single(&self, incoming: &FileInfo, target: &Path, candidate: &SimilarCandidate) -> Resolution {
        if candidate.path == target {
            return Resolution::Overwrite { target: target.to_path_buf(), remove: Vec::new() };
        }
        if candidate.path == incoming.path {
            return self.none(target);
        }
        let name = candidate.path.display();
        match (self.is_preferred(&incoming.path), self.is_preferred(&candidate.path)) {
            (true, false) => self.replace(target, candidate),
            (false, true) => self.discard(format!("{name} has a preferred format")),
            _ => match incoming.size.cmp(&candidate.size) {
                Ordering::Greater => self.replace(target, candidate),
                Ordering::Less => self.discard(format!("{name} is larger ({} > {} bytes)", candidate.size, incoming.size)),
                Ordering::Equal if self.duplicates.delete_incoming => {
                    Resolution::DeleteIncoming { reason: format!("{name} is identical in size") }
                },
                Ordering::Equal => Resolution::NoOp { reason: format!("{name} is identical in size") },
            },
        }
    }

    pub fn multiple(&self, incoming: &FileInfo, target: &Path, candidates: &[SimilarCandidate]) -> Resolution {
        let count = candidates.len();
        let any_lower = candidates.iter().any(|c| !self.is_preferred(&c.path));
        if self.is_preferred(&incoming.path) && any_lower {
            let remove = match self.duplicates.delete_targets {
                true => candidates
                    .iter()
                    .map(|c| c.path.clone())
                    .filter(|p| p != target && *p != incoming.path)
                    .collect(),
                false => Vec::new(),
            };
            return Resolution::Overwrite { target: target.to_path_buf(), remove };
        }
        if candidates.iter().any(|c| c.path == incoming.path) {
            return Resolution::NoOp { reason: format!("already one of {count} copies in the library") };
        }
        self.discard(format!("{count} copies already in the library"))
    }

    fn replace(&self, target: &Path, candidate: &SimilarCandidate) -> Resolution {
        let remove = match self.duplicates.delete_targets && candidate.path != target {
            true => vec![candidate.path.clone()],
            false => Vec::new(),
        };
        Resolution::Overwrite { target: target.to_path_buf(), remove }
    }

    fn discard(&self, reason: String) -> Resolution {
        match self.duplicates.delete_incoming {
            true => Resolution::DeleteIncoming { reason },
            false => Resolution::KeptDuplicate { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::OffsetDateTime;

    const TARGET: &str = "/music/The Band/Live/A.flac";

    fn file(path: &str, size: u64) -> FileInfo {
        FileInfo::new(path, size, OffsetDateTime::UNIX_EPOCH)
    }

    fn candidate(path: &str, size: u64) -> SimilarCandidate {
        SimilarCandidate { path: PathBuf::from(path), size, item: None, score: 1.0 }
    }

    fn config(delete_incoming: bool, delete_targets: bool) -> Config {
        let mut config = Config::default();
        config.duplicates.delete_incoming = delete_incoming;
        config.duplicates.delete_targets = delete_targets;
        config
    }

    fn resolve(config: &Config, incoming: FileInfo, candidates: &[SimilarCandidate]) -> Resolution {
        ResolutionPolicy::new(config).resolve(&incoming, Path::new(TARGET), candidates)
    }

    fn overwrite(remove: &[&str]) -> Resolution {
        Resolution::Overwrite { target: PathBuf::from(TARGET), remove: remove.iter().map(PathBuf::from).collect() }
    }

    #[test]
    fn test_no_candidates_moves_as_new() {
        let resolution = resolve(&config(true, false), file("/in/A.flac", 10), &[]);
        assert_eq!(resolution, Resolution::MoveAsNew { target: PathBuf::from(TARGET) });
        assert!(resolution.writes());
    }

    #[test]
    fn test_candidate_at_target_is_in_place_update() {
        let resolution = resolve(&config(true, true), file("/in/A.flac", 1), &[candidate(TARGET, 100)]);
        assert_eq!(resolution, overwrite(&[]));
    }

    #[test]
    fn test_candidate_is_incoming_itself() {
        let resolution =
            resolve(&config(true, true), file("/music/Old/A.flac", 1), &[candidate("/music/Old/A.flac", 1)]);
        assert_eq!(resolution, Resolution::MoveAsNew { target: PathBuf::from(TARGET) });
    }

    #[rstest]
    // Preferred incoming replaces a non-preferred candidate regardless of size.
    #[case("/in/A.flac", 1, "/music/The Band/Live/A.mp3", 100, false, overwrite(&[]))]
    #[case("/in/A.flac", 1, "/music/The Band/Live/A.mp3", 100, true, overwrite(&["/music/The Band/Live/A.mp3"]))]
    // Same class, incoming larger.
    #[case("/in/A.flac", 200, "/music/The Band/Live/B.flac", 100, false, overwrite(&[]))]
    #[case("/in/A.flac", 200, "/music/The Band/Live/B.flac", 100, true, overwrite(&["/music/The Band/Live/B.flac"]))]
    #[case("/in/A.mp3", 200, "/music/The Band/Live/B.mp3", 100, true, overwrite(&["/music/The Band/Live/B.mp3"]))]
    fn test_single_overwrite(
        #[case] incoming: &str,
        #[case] incoming_size: u64,
        #[case] existing: &str,
        #[case] existing_size: u64,
        #[case] delete_targets: bool,
        #[case] expected: Resolution,
    ) {
        let resolution =
            resolve(&config(true, delete_targets), file(incoming, incoming_size), &[candidate(existing, existing_size)]);
        assert_eq!(resolution, expected);
    }

    #[rstest]
    // Non-preferred incoming never overwrites a preferred candidate.
    #[case("/in/A.mp3", 500, "/music/B.flac", 1, true, "DeleteIncoming")]
    #[case("/in/A.mp3", 500, "/music/B.flac", 1, false, "KeptDuplicate")]
    // Same class, incoming smaller.
    #[case("/in/A.flac", 50, "/music/B.flac", 100, true, "DeleteIncoming")]
    #[case("/in/A.flac", 50, "/music/B.flac", 100, false, "KeptDuplicate")]
    // Same class, equal size.
    #[case("/in/A.flac", 100, "/music/B.flac", 100, true, "DeleteIncoming")]
    #[case("/in/A.flac", 100, "/music/B.flac", 100, false, "NoOp")]
    fn test_single_keeps_existing(
        #[case] incoming: &str,
        #[case] incoming_size: u64,
        #[case] existing: &str,
        #[case] existing_size: u64,
        #[case] delete_incoming: bool,
        #[case] expected: &str,
    ) {
        let resolution =
            resolve(&config(delete_incoming, true), file(incoming, incoming_size), &[candidate(existing, existing_size)]);
        let variant = match resolution {
            Resolution::DeleteIncoming { .. } => "DeleteIncoming",
            Resolution::KeptDuplicate { .. } => "KeptDuplicate",
            Resolution::NoOp { .. } => "NoOp",
            other => panic!("unexpected resolution {other:?}"),
        };
        assert_eq!(variant, expected);
    }

    #[test]
    fn test_multiple_preferred_replaces_set() {
        let candidates = [candidate("/music/B.mp3", 10), candidate(TARGET, 10), candidate("/music/C.flac", 10)];
        let resolution = resolve(&config(true, true), file("/in/A.flac", 1), &candidates);
        assert_eq!(resolution, overwrite(&["/music/B.mp3", "/music/C.flac"]));

        let resolution = resolve(&config(true, false), file("/in/A.flac", 1), &candidates);
        assert_eq!(resolution, overwrite(&[]));
    }

    #[test]
    fn test_multiple_never_removes_incoming() {
        let candidates = [candidate("/music/B.mp3", 10), candidate("/in/A.flac", 10)];
        let resolution = resolve(&config(true, true), file("/in/A.flac", 1), &candidates);
        assert_eq!(resolution, overwrite(&["/music/B.mp3"]));
    }

    #[rstest]
    #[case(true, "/in/A.mp3", "DeleteIncoming")]
    #[case(false, "/in/A.mp3", "KeptDuplicate")]
    #[case(true, "/music/B.flac", "NoOp")]
    fn test_multiple_redundant(#[case] delete_incoming: bool, #[case] incoming: &str, #[case] expected: &str) {
        let candidates = [candidate("/music/B.flac", 10), candidate("/music/C.flac", 10)];
        let resolution = resolve(&config(delete_incoming, true), file(incoming, 1), &candidates);
        let variant = match resolution {
            Resolution::DeleteIncoming { .. } => "DeleteIncoming",
            Resolution::KeptDuplicate { .. } => "KeptDuplicate",
            Resolution::NoOp { .. } => "NoOp",
            other => panic!("unexpected resolution {other:?}"),
        };
        assert_eq!(variant, expected);
    }
}
