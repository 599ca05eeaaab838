use crate::context::{ProcessingContext, Services};
use crate::counters::Counter;
use crate::engine::{Continuation, Outcome, Rule};
use crate::error::{ErrorKind, Result};
use crate::organize;
use crate::resolve::Resolution;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use shelver_media::{MediaItem, split_artist, tags};
use shelver_storage::error::ErrorKind as StorageErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Make sure the volume holding the album directory can take the incoming
/// file, with `processing.min_free_space` to spare.
pub struct CheckDiskSpace;

#[async_trait]
impl Rule<ProcessingContext> for CheckDiskSpace {
    fn name(&self) -> &str {
        "check-disk-space"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.album_dir.is_some() && ctx.resolution.as_ref().is_some_and(Resolution::writes)
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let album_dir = ctx.album_dir.as_ref().ok_or_raise(|| ErrorKind::Rule(self.name().to_string()))?;
        let required = ctx.source.size.saturating_add(ctx.config.processing.min_free_space);
        let available = match ctx.services.storage.ensure_space(album_dir, required).await {
            Ok(available) => available,
            Err(e) => {
                ctx.services.counters.incr(Counter::Errors);
                let message = match &*e {
                    kind @ StorageErrorKind::InsufficientSpace { .. } => kind.to_string(),
                    kind => format!("could not determine free disk space: {kind}"),
                };
                return Ok(Outcome::failure(message));
            },
        };
        Ok(Outcome::success(format!("{available} bytes available")))
    }
}

/// Carry out the decided resolution.
pub struct Apply;

#[async_trait]
impl Rule<ProcessingContext> for Apply {
    fn name(&self) -> &str {
        "apply"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.resolution.is_some() && !ctx.config.processing.dry_run
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let services = Arc::clone(&ctx.services);
        let source = ctx.source.path.clone();
        let resolution = ctx.resolution.clone().ok_or_raise(|| ErrorKind::Rule(self.name().to_string()))?;

        let (target, remove) = match resolution {
            Resolution::MoveAsNew { target } => (free_target(&services, &target, &source).await?, Vec::new()),
            Resolution::Overwrite { target, remove } => {
                // Only a similar file may be overwritten; anything else at the
                // target path is kept and the incoming file gets a new name.
                let similar = ctx.similarity.as_ref().is_some_and(|s| s.contains(&target));
                match similar {
                    true => (target, remove),
                    false => (free_target(&services, &target, &source).await?, remove),
                }
            },
            Resolution::DeleteIncoming { reason } => {
                return match organize::remove(&services, &source, &reason).await {
                    Ok(()) => Ok(Outcome::success(format!("deleted incoming file: {reason}"))),
                    Err(e) => {
                        services.counters.incr(Counter::Errors);
                        Ok(Outcome::failure("could not delete incoming file").error(e.to_string()))
                    },
                };
            },
            Resolution::KeptDuplicate { reason } => {
                services.counters.incr(Counter::Kept);
                return Ok(Outcome::success("kept duplicate in place")
                    .warn(format!("{} duplicates a library file: {reason}", source.display())));
            },
            Resolution::NoOp { reason } => {
                services.counters.incr(Counter::Skipped);
                return Ok(Outcome::success(format!("left as is: {reason}")));
            },
        };
        self.write(ctx, &services, &source, &target, &remove).await
    }
}

impl Apply {
    async fn write(
        &self,
        ctx: &mut ProcessingContext,
        services: &Services,
        source: &Path,
        target: &Path,
        remove: &[PathBuf],
    ) -> Result<Outcome> {
        let config = Arc::clone(&ctx.config);
        let simplified = ctx.simplified_artist.clone();
        let item = ctx.item_mut()?;
        let mut outcome = Outcome::success(format!("placed at {}", target.display()));

        if let Some(name) = &simplified {
            simplify_artist_tags(item, name);
        }
        if let Err(e) = item.ensure_fingerprint(services.fingerprinter.as_ref(), config.processing.fingerprint_timeout()).await
        {
            outcome = outcome.warn(format!("saving without a fingerprint: {e}"));
        }

        if let Err(e) = organize::place(services, item, source, target, config.processing.parse_timeout()).await {
            services.counters.incr(Counter::Errors);
            return Ok(Outcome::failure(format!("could not write {}", target.display())).error(e.to_string()));
        }
        services.counters.incr(Counter::Moved);

        for path in remove {
            if let Err(e) = organize::remove(services, path, "replaced by a better copy").await {
                services.counters.incr(Counter::Errors);
                outcome = outcome.error(format!("could not remove {}: {e}", path.display()));
            } else {
                outcome = outcome.info(format!("removed {}", path.display()));
            }
        }

        if config.artwork.dump
            && let Some(album_dir) = target.parent()
        {
            match organize::dump_artwork(services, item, album_dir, &config.artwork.file_name).await {
                Ok(Some(path)) => outcome = outcome.info(format!("saved artwork to {}", path.display())),
                Ok(None) => {},
                Err(e) => outcome = outcome.warn(format!("could not save artwork: {e}")),
            }
        }
        Ok(outcome)
    }
}

/// Replace multi-artist credits with the simplified directory artist.
fn simplify_artist_tags(item: &mut MediaItem, name: &str) {
    for tag in [tags::ARTIST, tags::ALBUMARTIST] {
        let rewrite = item.get(tag).is_some_and(|value| {
            let parts = split_artist(value);
            parts.len() > 1 && parts[0].eq_ignore_ascii_case(name)
        });
        if rewrite {
            item.set(tag, name);
        }
    }
}

/// `target`, or `target` with a " (n)" suffix if something else is already
/// there.
async fn free_target(services: &Services, target: &Path, source: &Path) -> Result<PathBuf> {
    let exists = |path: PathBuf| async move {
        let taken = services.storage.exists(&path).await.or_raise(|| ErrorKind::Organize)?;
        Ok::<_, crate::error::Error>((path, taken))
    };
    let (path, taken) = exists(target.to_path_buf()).await?;
    if !taken || path == source {
        return Ok(path);
    }
    let stem = target.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let extension = target.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    for n in 1..=999 {
        let (path, taken) = exists(target.with_file_name(format!("{stem} ({n}){extension}"))).await?;
        if !taken {
            tracing::info!(target = %target.display(), path = %path.display(), "Target taken, using a new name");
            return Ok(path);
        }
    }
    exn::bail!(ErrorKind::Rule(format!("no free file name for {}", target.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_artist_tags() {
        let mut item = MediaItem::new("/a.flac")
            .with_tag(tags::ARTIST, "Alpha feat. Beta")
            .with_tag(tags::ALBUMARTIST, "Alpha & Gamma");
        simplify_artist_tags(&mut item, "Alpha");
        assert_eq!(item.artist(), "Alpha");
        assert_eq!(item.album_artist(), "Alpha");
    }

    #[test]
    fn test_simplify_leaves_other_credits() {
        let mut item = MediaItem::new("/a.flac").with_tag(tags::ARTIST, "Delta & Echo").with_tag(tags::ALBUMARTIST, "Alpha");
        simplify_artist_tags(&mut item, "Alpha");
        assert_eq!(item.artist(), "Delta & Echo");
        assert_eq!(item.album_artist(), "Alpha");
    }
}
