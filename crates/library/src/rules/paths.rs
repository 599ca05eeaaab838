use crate::context::ProcessingContext;
use crate::counters::Counter;
use crate::engine::{Continuation, Outcome, Rule};
use crate::error::{ErrorKind, Result};
use crate::template::PathParams;
use async_trait::async_trait;
use exn::OptionExt;
use shelver_media::split_artist;

/// Work out the artist and album directories inside the library.
///
/// The directory artist is the album artist when present, else the track
/// artist. With `artist.simplify` a multi-artist credit is cut down to its
/// first name.
pub struct ResolveTargetPaths;

#[async_trait]
impl Rule<ProcessingContext> for ResolveTargetPaths {
    fn name(&self) -> &str {
        "resolve-target-paths"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.is_parsed()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let root = ctx
            .config
            .library
            .target
            .clone()
            .ok_or_raise(|| ErrorKind::Rule("library target directory is not configured".to_string()))?;
        let services = &ctx.services;
        let item = ctx.incoming.as_ref().ok_or_raise(|| ErrorKind::Rule(self.name().to_string()))?;

        let artist = match item.album_artist() {
            "" => item.artist(),
            album_artist => album_artist,
        };
        let simplified = match split_artist(artist).as_slice() {
            [first, _, ..] if ctx.config.artist.simplify => Some(first.to_string()),
            _ => None,
        };
        let params = PathParams::from_item(item, simplified.as_deref().unwrap_or(artist));

        let dirs = services
            .artist_template
            .generate_under(&root, &params)
            .and_then(|artist_dir| Ok((services.album_template.generate_under(&artist_dir, &params)?, artist_dir)));
        let (album_dir, artist_dir) = match dirs {
            Ok(dirs) => dirs,
            Err(e) => {
                services.counters.incr(Counter::Skipped);
                return Ok(Outcome::failure("could not build target directory from tags").error(e.to_string()));
            },
        };

        let mut outcome = Outcome::success(format!("target album directory is {}", album_dir.display()));
        if let Some(name) = &simplified {
            outcome = outcome.info(format!("simplified artist `{artist}` to `{name}`"));
        }
        ctx.simplified_artist = simplified;
        ctx.artist_dir = Some(artist_dir);
        ctx.album_dir = Some(album_dir);
        Ok(outcome)
    }
}
