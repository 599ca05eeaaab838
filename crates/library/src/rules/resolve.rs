use crate::context::ProcessingContext;
use crate::engine::{Continuation, Outcome, Rule};
use crate::error::{ErrorKind, Result};
use crate::resolve::{Resolution, ResolutionPolicy};
use crate::scan::SimilarCandidate;
use async_trait::async_trait;
use exn::OptionExt;

/// Shared body of the resolution rules: run `decide` and store its answer.
fn resolve(
    rule: &str,
    ctx: &mut ProcessingContext,
    decide: impl FnOnce(&ResolutionPolicy<'_>, &std::path::Path, &[SimilarCandidate]) -> Resolution,
) -> Result<Outcome> {
    let target = ctx.target_path().ok_or_raise(|| ErrorKind::Rule(rule.to_string()))?;
    let candidates = ctx.similarity.as_ref().map(|s| s.candidates.as_slice()).unwrap_or_default();
    let resolution = decide(&ResolutionPolicy::new(&ctx.config), &target, candidates);
    let outcome = Outcome::success(format!("decided to {resolution}"));
    ctx.resolution = Some(resolution);
    Ok(outcome)
}

fn candidate_count(ctx: &ProcessingContext) -> Option<usize> {
    match ctx.resolution {
        Some(_) => None,
        None => ctx.similarity.as_ref().map(|s| s.candidates.len()),
    }
}

/// Nothing similar in the library: the incoming file is new.
pub struct ResolveNone;

#[async_trait]
impl Rule<ProcessingContext> for ResolveNone {
    fn name(&self) -> &str {
        "resolve-none"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        candidate_count(ctx) == Some(0)
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        resolve(self.name(), ctx, |policy, target, _| policy.none(target))
    }
}

/// Exactly one similar file: keep whichever is better.
pub struct ResolveSingle;

#[async_trait]
impl Rule<ProcessingContext> for ResolveSingle {
    fn name(&self) -> &str {
        "resolve-single"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        candidate_count(ctx) == Some(1)
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let incoming = ctx.source.clone();
        resolve(self.name(), ctx, |policy, target, candidates| policy.resolve(&incoming, target, candidates))
    }
}

/// Several similar files already in the library.
pub struct ResolveMultiple;

#[async_trait]
impl Rule<ProcessingContext> for ResolveMultiple {
    fn name(&self) -> &str {
        "resolve-multiple"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        candidate_count(ctx).is_some_and(|n| n > 1)
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let incoming = ctx.source.clone();
        resolve(self.name(), ctx, |policy, target, candidates| policy.multiple(&incoming, target, candidates))
    }
}

/// Stops the pipeline once a decision exists, reporting what would happen.
pub struct DryRun;

#[async_trait]
impl Rule<ProcessingContext> for DryRun {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.config.processing.dry_run && ctx.resolution.is_some()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let resolution = ctx.resolution.as_ref().ok_or_raise(|| ErrorKind::Rule(self.name().to_string()))?;
        let message = format!("dry run: would {resolution}");
        Ok(Outcome::failure(message.clone()).info(format!("{}: {message}", ctx.source.path.display())))
    }
}
