use crate::context::ProcessingContext;
use crate::counters::Counter;
use crate::engine::{Continuation, Outcome, Rule, RuleEngine};
use crate::error::Result;
use crate::provider::{MetadataProvider, with_retry};
use async_trait::async_trait;
use shelver_media::tags;
use std::sync::Arc;

/// Tags that are cleared before asking providers a second time.
const IDENTIFYING_TAGS: [&str; 5] = [tags::ARTIST, tags::ALBUMARTIST, tags::ALBUM, tags::TITLE, tags::ACOUSTID_ID];

/// Look the incoming item up with one metadata provider and apply the best
/// match.
pub struct ProviderRule {
    name: String,
    provider: Arc<dyn MetadataProvider>,
}

impl ProviderRule {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { name: format!("tag-{}", provider.name()), provider }
    }
}

#[async_trait]
impl Rule<ProcessingContext> for ProviderRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn continuation(&self) -> Continuation {
        Continuation::Continue
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.config.tagging.enabled && ctx.is_parsed() && !ctx.is_identified()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let provider = self.provider.as_ref();
        let retry = ctx.config.tagging.retry.clone();
        let overwrite = ctx.config.tagging.overwrite;
        let found = {
            let item = ctx.item()?;
            with_retry(&self.name, &retry, || provider.find_candidates(item)).await
        };
        ctx.identified.insert(provider.name().to_string(), false);

        let candidates = match found {
            Ok(candidates) => candidates,
            Err(e) => return Ok(Outcome::failure(format!("no match from {}", provider.name())).warn(e.to_string())),
        };
        let Some(best) = candidates.into_iter().max_by(|a, b| a.score.total_cmp(&b.score)) else {
            return Ok(Outcome::failure(format!("no match from {}", provider.name())));
        };
        if !provider.apply_tags(&best, ctx.item_mut()?, &overwrite) {
            return Ok(Outcome::failure(format!("match from {} had nothing to apply", provider.name())));
        }
        ctx.identified.insert(provider.name().to_string(), true);
        Ok(Outcome::success(format!("identified by {} (score {:.2})", provider.name(), best.score)))
    }
}

/// Clear the identifying tags and run the provider rules once more.
///
/// Runs only at the top level; the nested run happens at depth 1 so this rule
/// never applies to itself.
pub struct RetryCleared {
    providers: RuleEngine<ProcessingContext>,
}

impl RetryCleared {
    pub fn new(providers: RuleEngine<ProcessingContext>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Rule<ProcessingContext> for RetryCleared {
    fn name(&self) -> &str {
        "retry-cleared"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Continue
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        let tagging = &ctx.config.tagging;
        ctx.depth == 0
            && tagging.enabled
            && tagging.retry_cleared
            && ctx.is_parsed()
            && !ctx.is_identified()
            && !self.providers.rules().is_empty()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let item = ctx.item_mut()?;
        let snapshot: Vec<(&str, Option<String>)> = IDENTIFYING_TAGS.iter().map(|name| (*name, item.remove(name))).collect();

        ctx.depth += 1;
        let result = self.providers.run(ctx).await;
        ctx.depth -= 1;

        if ctx.is_identified() {
            let attempts = result?.len();
            return Ok(Outcome::success("identified after clearing tags").info(format!("{attempts} provider lookups")));
        }
        let item = ctx.item_mut()?;
        for (name, value) in snapshot {
            match value {
                Some(value) => item.set(name, value),
                None => _ = item.remove(name),
            }
        }
        let attempts = result?.len();
        Ok(Outcome::failure("not identified after clearing tags").info(format!("{attempts} provider lookups, tags restored")))
    }
}

/// The incoming item needs an artist (or album artist) and an album to be
/// placed anywhere.
pub struct RequireTags;

#[async_trait]
impl Rule<ProcessingContext> for RequireTags {
    fn name(&self) -> &str {
        "require-tags"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.is_parsed()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let item = ctx.item()?;
        let mut missing = Vec::new();
        if item.artist().is_empty() && item.album_artist().is_empty() {
            missing.push("artist");
        }
        if item.album().is_empty() {
            missing.push("album");
        }
        if missing.is_empty() {
            return Ok(Outcome::success("required tags present"));
        }
        ctx.services.counters.incr(Counter::Skipped);
        Ok(Outcome::failure(format!("missing required tags: {}", missing.join(", "))))
    }
}
