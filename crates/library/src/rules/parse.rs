use crate::context::ProcessingContext;
use crate::counters::Counter;
use crate::engine::{Continuation, Outcome, Rule};
use crate::error::Result;
use async_trait::async_trait;
use shelver_media::parse_with_timeout;
use std::sync::Arc;

/// Parse the incoming file, repairing it first if parsing fails and a
/// repairer is available.
pub struct ParseIncoming;

#[async_trait]
impl Rule<ProcessingContext> for ParseIncoming {
    fn name(&self) -> &str {
        "parse-incoming"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        !ctx.is_parsed()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let services = Arc::clone(&ctx.services);
        let path = ctx.source.path.clone();
        let timeout = ctx.config.processing.parse_timeout();

        let first = match parse_with_timeout(&services.media, &path, timeout).await {
            Ok(item) => {
                ctx.incoming = Some(item);
                return Ok(Outcome::success("parsed incoming file"));
            },
            Err(e) => e.to_string(),
        };

        let repairer = services.repairer.as_ref().filter(|_| ctx.config.repair.enabled);
        let Some(repairer) = repairer else {
            services.counters.incr(Counter::Skipped);
            return Ok(Outcome::failure("could not parse incoming file").error(first));
        };

        let outcome = Outcome::failure("could not parse incoming file").warn(first);
        match repairer.repair(&path).await {
            Ok(true) => {},
            Ok(false) => {
                services.counters.incr(Counter::Skipped);
                return Ok(outcome.error(format!("{} could not repair the file", repairer.name())));
            },
            Err(e) => {
                services.counters.incr(Counter::Skipped);
                return Ok(outcome.error(format!("{} failed: {e}", repairer.name())));
            },
        }
        services.cache.invalidate(&path);

        match parse_with_timeout(&services.media, &path, timeout).await {
            Ok(item) => {
                ctx.incoming = Some(item);
                Ok(Outcome::success("parsed incoming file after repair").info(format!("repaired by {}", repairer.name())))
            },
            Err(e) => {
                services.counters.incr(Counter::Skipped);
                Ok(outcome.error(format!("still unparseable after repair: {e}")))
            },
        }
    }
}
