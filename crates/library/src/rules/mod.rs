//! The rules that make up the per-file pipeline.
//!
//! [`pipeline`] assembles them in order:
//!
//! 1. parse the incoming file (repairing it if allowed);
//! 2. ask each configured metadata provider, then retry with cleared tags;
//! 3. require an artist and album, and resolve the target directories;
//! 4. scan for similar files and decide what to do about them;
//! 5. stop here in dry-run mode, otherwise check disk space and apply.

mod apply;
mod parse;
mod paths;
mod resolve;
mod similar;
mod tagging;

pub use self::apply::{Apply, CheckDiskSpace};
pub use self::parse::ParseIncoming;
pub use self::paths::ResolveTargetPaths;
pub use self::resolve::{DryRun, ResolveMultiple, ResolveNone, ResolveSingle};
pub use self::similar::ScanSimilar;
pub use self::tagging::{ProviderRule, RequireTags, RetryCleared};
use crate::context::{ProcessingContext, Services};
use crate::engine::{RuleEngine, RuleHandle};
use shelver_config::Config;
use std::sync::Arc;

pub type PipelineRule = RuleHandle<ProcessingContext>;

/// Build the full pipeline for `config`.
///
/// Provider rules follow the order of `tagging.providers`; names with no
/// registered provider are skipped with a warning.
pub fn pipeline(services: &Services, config: &Config) -> RuleEngine<ProcessingContext> {
    let providers: Vec<PipelineRule> = config
        .tagging
        .providers
        .iter()
        .filter_map(|name| {
            let provider = services.providers.iter().find(|p| p.name() == name);
            if provider.is_none() {
                tracing::warn!(provider = %name, "Configured metadata provider is not registered");
            }
            provider.map(|p| -> PipelineRule { Arc::new(ProviderRule::new(Arc::clone(p))) })
        })
        .collect();

    let mut rules: Vec<PipelineRule> = Vec::new();
    rules.push(Arc::new(ParseIncoming));
    rules.extend(providers.iter().cloned());
    rules.push(Arc::new(RetryCleared::new(RuleEngine::new(providers))));
    rules.push(Arc::new(RequireTags));
    rules.push(Arc::new(ResolveTargetPaths));
    rules.push(Arc::new(ScanSimilar));
    rules.push(Arc::new(ResolveNone));
    rules.push(Arc::new(ResolveSingle));
    rules.push(Arc::new(ResolveMultiple));
    rules.push(Arc::new(DryRun));
    rules.push(Arc::new(CheckDiskSpace));
    rules.push(Arc::new(Apply));
    RuleEngine::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::Counter;
    use crate::engine::Outcome;
    use crate::provider::error::Result as ProviderResult;
    use crate::provider::{CandidateMatch, MetadataProvider, Repairer};
    use crate::resolve::Resolution;
    use crate::test_support::Harness;
    use async_trait::async_trait;
    use shelver_fingerprint::MockGenerator;
    use shelver_media::{MediaItem, MockMediaBackend, tags};
    use std::path::Path;

    const F1: &str = "1,2,3,4,5,6,7,8";
    const F2: &str = "100000000,0,0,0";
    // 0.995 similar to F2.
    const F3: &str = "14100655,0,0,0";
    const UNRELATED: &str = "4000000000,4000000000,4000000000,4000000000";

    fn track<'a>(fingerprint: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            (tags::ARTIST, "The Band"),
            (tags::ALBUM, "Live"),
            (tags::TITLE, "Song"),
            (tags::ACOUSTID_FINGERPRINT, fingerprint),
            (tags::ACOUSTID_FINGERPRINT_DURATION, "120"),
        ]
    }

    fn ran(outcomes: &[Outcome]) -> Vec<&str> {
        outcomes.iter().map(|o| o.rule.as_str()).collect()
    }

    async fn run(h: &Harness, source: &Path) -> (ProcessingContext, Vec<Outcome>) {
        let mut ctx = h.context(source);
        let outcomes = pipeline(&h.services, &h.config).run(&mut ctx).await.unwrap();
        (ctx, outcomes)
    }

    enum Mode {
        Always,
        OnlyWhenCleared,
        Never,
    }

    struct Catalog {
        name: &'static str,
        mode: Mode,
        tags: Vec<(String, String)>,
    }

    impl Catalog {
        fn new(name: &'static str, mode: Mode, tags: &[(&str, &str)]) -> Arc<dyn MetadataProvider> {
            let tags = tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            Arc::new(Self { name, mode, tags })
        }
    }

    #[async_trait]
    impl MetadataProvider for Catalog {
        fn name(&self) -> &str {
            self.name
        }

        async fn find_candidates(&self, item: &MediaItem) -> ProviderResult<Vec<CandidateMatch>> {
            let found = match self.mode {
                Mode::Always => true,
                Mode::OnlyWhenCleared => item.artist().is_empty(),
                Mode::Never => false,
            };
            if !found {
                return Ok(Vec::new());
            }
            Ok(vec![CandidateMatch { provider: self.name.to_string(), score: 0.9, tags: self.tags.clone() }])
        }
    }

    struct Rewrite(String);

    #[async_trait]
    impl Repairer for Rewrite {
        fn name(&self) -> &str {
            "rewrite"
        }

        async fn repair(&self, path: &Path) -> ProviderResult<bool> {
            std::fs::write(path, &self.0).unwrap();
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_new_file_is_moved_into_place() {
        let h = Harness::new();
        let source = h.write("incoming/A.flac", &track(F1), "audio");

        let (_, outcomes) = run(&h, &source).await;

        assert_eq!(
            ran(&outcomes),
            [
                "parse-incoming",
                "require-tags",
                "resolve-target-paths",
                "scan-similar",
                "resolve-none",
                "check-disk-space",
                "apply"
            ]
        );
        assert!(outcomes.iter().all(|o| o.success));
        assert!(h.path("library/The Band/Live/A.flac").exists());
        assert!(!source.exists());
        assert_eq!(h.services.counters.get(Counter::Moved), 1);
        assert_eq!(h.services.counters.get(Counter::CreatedDirs), 1);
    }

    #[tokio::test]
    async fn test_larger_match_overwrites_and_removes_old_copy() {
        let h = Harness::with(|c| c.duplicates.delete_targets = true, MockGenerator::default(), Vec::new());
        let old = h.write("library/The Band/Live/Song.flac", &track(F3), "small");
        let source = h.write("incoming/A.flac", &track(F2), &"large".repeat(100));

        let (ctx, outcomes) = run(&h, &source).await;

        assert!(ran(&outcomes).contains(&"resolve-single"));
        let target = h.path("library/The Band/Live/A.flac");
        assert_eq!(ctx.resolution, Some(Resolution::Overwrite { target: target.clone(), remove: vec![old.clone()] }));
        assert!(target.exists());
        assert!(!old.exists());
        assert!(!source.exists());
        assert_eq!(h.services.counters.get(Counter::Moved), 1);
        assert_eq!(h.services.counters.get(Counter::Deleted), 1);
    }

    #[tokio::test]
    async fn test_larger_match_keeps_old_copy_without_target_deletion() {
        let h = Harness::new();
        let old = h.write("library/The Band/Live/Song.flac", &track(F3), "small");
        let source = h.write("incoming/A.flac", &track(F2), &"large".repeat(100));

        run(&h, &source).await;

        assert!(h.path("library/The Band/Live/A.flac").exists());
        assert!(old.exists());
        assert_eq!(h.services.counters.get(Counter::Moved), 1);
        assert_eq!(h.services.counters.get(Counter::Deleted), 0);
    }

    #[tokio::test]
    async fn test_equal_duplicate_deletes_incoming() {
        let h = Harness::new();
        let existing = h.write("library/The Band/Live/Song.flac", &track(F1), "same");
        let source = h.write("incoming/B.flac", &track(F1), "same");

        let (ctx, _) = run(&h, &source).await;

        assert!(matches!(ctx.resolution, Some(Resolution::DeleteIncoming { .. })));
        assert!(!source.exists());
        assert!(existing.exists());
        assert_eq!(h.services.counters.get(Counter::Deleted), 1);
        assert_eq!(h.services.counters.get(Counter::Moved), 0);
    }

    #[tokio::test]
    async fn test_smaller_duplicate_is_kept_when_deletion_is_disabled() {
        let h = Harness::with(|c| c.duplicates.delete_incoming = false, MockGenerator::default(), Vec::new());
        h.write("library/The Band/Live/Song.flac", &track(F1), &"large".repeat(100));
        let source = h.write("incoming/B.flac", &track(F1), "small");

        let (ctx, outcomes) = run(&h, &source).await;

        assert!(matches!(ctx.resolution, Some(Resolution::KeptDuplicate { .. })));
        assert!(outcomes.last().unwrap().success);
        assert!(source.exists());
        assert_eq!(h.services.counters.get(Counter::Kept), 1);
    }

    #[tokio::test]
    async fn test_name_collision_gets_a_suffix() {
        let h = Harness::new();
        let existing = h.write("library/The Band/Live/A.flac", &track(UNRELATED), "other");
        let source = h.write("incoming/A.flac", &track(F1), "audio");

        run(&h, &source).await;

        assert!(h.path("library/The Band/Live/A (1).flac").exists());
        assert!(std::fs::read_to_string(existing).unwrap().contains("other"));
    }

    #[tokio::test]
    async fn test_overwrite_never_replaces_an_unrelated_file_at_the_target() {
        let h = Harness::with(|c| c.duplicates.delete_targets = true, MockGenerator::default(), Vec::new());
        let unrelated = h.write("library/The Band/Live/A.flac", &track(UNRELATED), "UNRELATED-RECORDING");
        let old = h.write("library/The Band/Live/Song.flac", &track(F3), "small");
        let source = h.write("incoming/A.flac", &track(F2), &"large".repeat(100));

        let (ctx, _) = run(&h, &source).await;

        let target = h.path("library/The Band/Live/A.flac");
        assert_eq!(ctx.resolution, Some(Resolution::Overwrite { target, remove: vec![old.clone()] }));
        assert!(std::fs::read_to_string(&unrelated).unwrap().contains("UNRELATED-RECORDING"));
        assert!(h.path("library/The Band/Live/A (1).flac").exists());
        assert!(!old.exists());
        assert!(!source.exists());
        assert_eq!(h.services.counters.get(Counter::Moved), 1);
    }

    #[tokio::test]
    async fn test_fingerprint_is_generated_for_untagged_incoming() {
        let generator = MockGenerator::with_fingerprints([("A.flac", F1, 120.0)]);
        let h = Harness::with(|_| {}, generator, Vec::new());
        let source = h.write("incoming/A.flac", &track(F1)[..3], "audio");

        run(&h, &source).await;

        assert_eq!(h.generator.calls(), 1);
        let saved = std::fs::read_to_string(h.path("library/The Band/Live/A.flac")).unwrap();
        assert!(saved.contains(&format!("ACOUSTID_FINGERPRINT={F1}")));
    }

    #[tokio::test]
    async fn test_dry_run_stops_before_mutation() {
        let h = Harness::with(|c| c.processing.dry_run = true, MockGenerator::default(), Vec::new());
        let source = h.write("incoming/A.flac", &track(F1), "audio");

        let (_, outcomes) = run(&h, &source).await;

        let last = outcomes.last().unwrap();
        assert_eq!(last.rule, "dry-run");
        assert!(!last.success);
        assert!(last.message.starts_with("dry run: would move to"));
        assert!(source.exists());
        assert!(!h.path("library").exists());
    }

    #[tokio::test]
    async fn test_insufficient_disk_space() {
        let h = Harness::new();
        h.storage.set_free_space(10);
        let source = h.write("incoming/A.flac", &track(F1), "audio");

        let (_, outcomes) = run(&h, &source).await;

        assert_eq!(outcomes.last().unwrap().rule, "check-disk-space");
        assert!(source.exists());
        assert_eq!(h.services.counters.get(Counter::Errors), 1);
    }

    #[tokio::test]
    async fn test_missing_tags_skip_file() {
        let h = Harness::new();
        let source = h.write("incoming/A.flac", &[(tags::ARTIST, "The Band")], "audio");

        let (_, outcomes) = run(&h, &source).await;

        assert_eq!(ran(&outcomes), ["parse-incoming", "require-tags"]);
        assert_eq!(outcomes[1].message, "missing required tags: album");
        assert_eq!(h.services.counters.get(Counter::Skipped), 1);
    }

    #[tokio::test]
    async fn test_unparseable_file_is_skipped() {
        let h = Harness::new();
        let source = h.path("incoming/A.flac");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "CORRUPT").unwrap();

        let (_, outcomes) = run(&h, &source).await;

        assert_eq!(ran(&outcomes), ["parse-incoming"]);
        assert!(!outcomes[0].success);
        assert_eq!(h.services.counters.get(Counter::Skipped), 1);
    }

    #[tokio::test]
    async fn test_repair_then_parse() {
        let repaired = MediaItem::new("/ignored").with_tag(tags::ARTIST, "The Band").with_tag(tags::ALBUM, "Live");
        let contents = MockMediaBackend::encode(&repaired, "audio");
        let h = Harness::with(
            |c| {
                c.repair.enabled = true;
                c.duplicates.filename_only = true;
            },
            MockGenerator::default(),
            Vec::new(),
        )
        .with_repairer(Arc::new(Rewrite(contents)));
        let source = h.path("incoming/A.flac");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "CORRUPT").unwrap();

        let (_, outcomes) = run(&h, &source).await;

        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].message, "parsed incoming file after repair");
        assert!(h.path("library/The Band/Live/A.flac").exists());
    }

    #[tokio::test]
    async fn test_provider_fills_missing_album() {
        let catalog = Catalog::new("catalog", Mode::Always, &[(tags::ALBUM, "Live")]);
        let h = Harness::with(
            |c| {
                c.tagging.enabled = true;
                c.tagging.providers = vec!["catalog".to_string()];
            },
            MockGenerator::default(),
            vec![catalog],
        );
        let source = h.write(
            "incoming/A.flac",
            &[(tags::ARTIST, "The Band"), (tags::ACOUSTID_FINGERPRINT, F1), (tags::ACOUSTID_FINGERPRINT_DURATION, "120")],
            "audio",
        );

        let (ctx, outcomes) = run(&h, &source).await;

        assert_eq!(&ran(&outcomes)[..3], ["parse-incoming", "tag-catalog", "require-tags"]);
        assert_eq!(ctx.identified.get("catalog"), Some(&true));
        assert!(h.path("library/The Band/Live/A.flac").exists());
    }

    #[tokio::test]
    async fn test_retry_with_cleared_tags_identifies() {
        let catalog = Catalog::new(
            "catalog",
            Mode::OnlyWhenCleared,
            &[(tags::ARTIST, "The Band"), (tags::ALBUM, "Live"), (tags::TITLE, "Song")],
        );
        let h = Harness::with(
            |c| {
                c.tagging.enabled = true;
                c.tagging.providers = vec!["catalog".to_string()];
            },
            MockGenerator::default(),
            vec![catalog],
        );
        let source = h.write(
            "incoming/A.flac",
            &[
                (tags::ARTIST, "the band (live)"),
                (tags::ALBUM, "live!"),
                (tags::ACOUSTID_FINGERPRINT, F1),
                (tags::ACOUSTID_FINGERPRINT_DURATION, "120"),
            ],
            "audio",
        );

        let (ctx, outcomes) = run(&h, &source).await;

        assert_eq!(&ran(&outcomes)[..3], ["parse-incoming", "tag-catalog", "retry-cleared"]);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
        assert_eq!(ctx.depth, 0);
        assert!(ctx.is_identified());
        assert!(h.path("library/The Band/Live/A.flac").exists());
    }

    #[tokio::test]
    async fn test_retry_with_cleared_tags_restores_on_failure() {
        let catalog = Catalog::new("catalog", Mode::Never, &[]);
        let h = Harness::with(
            |c| {
                c.tagging.enabled = true;
                c.tagging.providers = vec!["catalog".to_string()];
                c.processing.dry_run = true;
            },
            MockGenerator::default(),
            vec![catalog],
        );
        let source = h.write("incoming/A.flac", &track(F1), "audio");

        let (ctx, outcomes) = run(&h, &source).await;

        assert!(!outcomes[2].success);
        let item = ctx.item().unwrap();
        assert_eq!(item.artist(), "The Band");
        assert_eq!(item.album(), "Live");
        assert_eq!(item.title(), "Song");
        assert_eq!(ctx.album_dir, Some(h.path("library/The Band/Live")));
    }

    #[tokio::test]
    async fn test_simplified_artist_rewrites_tags() {
        let h = Harness::with(|c| c.artist.simplify = true, MockGenerator::default(), Vec::new());
        let source = h.write(
            "incoming/A.flac",
            &[
                (tags::ARTIST, "Someone"),
                (tags::ALBUMARTIST, "The Band feat. Guest"),
                (tags::ALBUM, "Live"),
                (tags::ACOUSTID_FINGERPRINT, F1),
                (tags::ACOUSTID_FINGERPRINT_DURATION, "120"),
            ],
            "audio",
        );

        let (ctx, _) = run(&h, &source).await;

        assert_eq!(ctx.simplified_artist.as_deref(), Some("The Band"));
        let saved = std::fs::read_to_string(h.path("library/The Band/Live/A.flac")).unwrap();
        assert!(saved.contains("ALBUMARTIST=The Band\n"));
        assert!(saved.contains("ARTIST=Someone\n"));
    }

    #[test]
    fn test_provider_rules_follow_configured_order() {
        let h = Harness::with(
            |c| c.tagging.providers = vec!["b".to_string(), "missing".to_string(), "a".to_string()],
            MockGenerator::default(),
            vec![Catalog::new("a", Mode::Never, &[]), Catalog::new("b", Mode::Never, &[])],
        );
        let engine = pipeline(&h.services, &h.config);
        let names: Vec<&str> = engine.rules().iter().map(|r| r.name()).collect();
        assert_eq!(&names[..4], ["parse-incoming", "tag-b", "tag-a", "retry-cleared"]);
    }
}
