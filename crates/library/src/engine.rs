//! Ordered rule pipeline with stop/continue semantics.
//!
//! A [`RuleEngine`] runs each [`Rule`] in turn against a mutable context:
//!
//! - A rule whose [`applies`](Rule::applies) predicate is false is skipped
//!   and leaves no [`Outcome`].
//! - A failed outcome from a [`Continuation::Stop`] rule ends the run.
//! - Every other outcome, successful or not, moves on to the next rule.
//!
//! Predicates see the context as left by earlier rules in the same run.
//! Outcomes are emitted to `tracing` once the run is over, in order.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// What happens to the rest of the pipeline when a rule fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Stop,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

/// The result of executing one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Name of the rule that produced this outcome. Filled in by the engine.
    pub rule: String,
    pub success: bool,
    pub message: String,
    pub logs: Vec<LogLine>,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self { rule: String::new(), success: true, message: message.into(), logs: Vec::new() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { rule: String::new(), success: false, message: message.into(), logs: Vec::new() }
    }

    pub fn log(mut self, level: Level, message: impl Into<String>) -> Self {
        self.logs.push(LogLine { level, message: message.into() });
        self
    }

    pub fn info(self, message: impl Into<String>) -> Self {
        self.log(Level::Info, message)
    }

    pub fn warn(self, message: impl Into<String>) -> Self {
        self.log(Level::Warn, message)
    }

    pub fn error(self, message: impl Into<String>) -> Self {
        self.log(Level::Error, message)
    }

    fn emit(&self) {
        let (rule, success, message) = (&self.rule, self.success, &self.message);
        if success {
            tracing::info!(%rule, success, "{message}");
        } else {
            tracing::warn!(%rule, success, "{message}");
        }
        for line in &self.logs {
            let text = &line.message;
            match line.level {
                Level::Info => tracing::info!(%rule, success, "{text}"),
                Level::Warn => tracing::warn!(%rule, success, "{text}"),
                Level::Error => tracing::error!(%rule, success, "{text}"),
            }
        }
    }
}

/// One step of a pipeline over a context of type `C`.
///
/// Recoverable problems are reported as a failed [`Outcome`]. Returning
/// `Err` means the context is in a state no later rule can work with, and
/// the error propagates out of [`RuleEngine::run`].
#[async_trait]
pub trait Rule<C: Send>: Send + Sync {
    fn name(&self) -> &str;

    fn continuation(&self) -> Continuation;

    fn applies(&self, ctx: &C) -> bool;

    async fn execute(&self, ctx: &mut C) -> Result<Outcome>;
}

pub type RuleHandle<C> = Arc<dyn Rule<C>>;

pub struct RuleEngine<C> {
    rules: Vec<RuleHandle<C>>,
}

impl<C> Clone for RuleEngine<C> {
    fn clone(&self) -> Self {
        Self { rules: self.rules.clone() }
    }
}

impl<C: Send> RuleEngine<C> {
    pub fn new(rules: Vec<RuleHandle<C>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RuleHandle<C>] {
        &self.rules
    }

    /// Run every applicable rule against `ctx`, returning their outcomes.
    pub async fn run(&self, ctx: &mut C) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        let result = self.run_inner(ctx, &mut outcomes).await;
        for outcome in &outcomes {
            outcome.emit();
        }
        result.map(|()| outcomes)
    }

    async fn run_inner(&self, ctx: &mut C, outcomes: &mut Vec<Outcome>) -> Result<()> {
        for rule in &self.rules {
            if !rule.applies(ctx) {
                tracing::trace!(rule = rule.name(), "Skipping rule");
                continue;
            }
            let mut outcome = rule.execute(ctx).await?;
            outcome.rule = rule.name().to_string();
            let stop = !outcome.success && rule.continuation() == Continuation::Stop;
            outcomes.push(outcome);
            if stop {
                tracing::debug!(rule = rule.name(), "Rule failed, stopping pipeline");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::ops::Deref;

    #[derive(Default)]
    struct Trace {
        ran: Vec<&'static str>,
        flag: bool,
    }

    struct Probe {
        name: &'static str,
        continuation: Continuation,
        succeed: bool,
        needs_flag: bool,
        sets_flag: bool,
    }

    impl Probe {
        fn new(name: &'static str, continuation: Continuation, succeed: bool) -> RuleHandle<Trace> {
            Arc::new(Self { name, continuation, succeed, needs_flag: false, sets_flag: false })
        }

        fn flagged(name: &'static str, needs_flag: bool, sets_flag: bool) -> RuleHandle<Trace> {
            Arc::new(Self { name, continuation: Continuation::Stop, succeed: true, needs_flag, sets_flag })
        }
    }

    #[async_trait]
    impl Rule<Trace> for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn continuation(&self) -> Continuation {
            self.continuation
        }

        fn applies(&self, ctx: &Trace) -> bool {
            !self.needs_flag || ctx.flag
        }

        async fn execute(&self, ctx: &mut Trace) -> Result<Outcome> {
            ctx.ran.push(self.name);
            if self.sets_flag {
                ctx.flag = true;
            }
            Ok(if self.succeed { Outcome::success("ok") } else { Outcome::failure("nope") })
        }
    }

    struct Broken;

    #[async_trait]
    impl Rule<Trace> for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn continuation(&self) -> Continuation {
            Continuation::Continue
        }

        fn applies(&self, _ctx: &Trace) -> bool {
            true
        }

        async fn execute(&self, _ctx: &mut Trace) -> Result<Outcome> {
            exn::bail!(ErrorKind::Rule("broken".to_string()))
        }
    }

    #[rstest]
    #[case(Continuation::Stop, &["a"])]
    #[case(Continuation::Continue, &["a", "b", "c"])]
    #[tokio::test]
    async fn test_failure_continuation(#[case] continuation: Continuation, #[case] expected: &[&str]) {
        let engine: RuleEngine<Trace> = RuleEngine::new(vec![
            Probe::new("a", continuation, false),
            Probe::new("b", Continuation::Stop, true),
            Probe::new("c", Continuation::Stop, true),
        ]);
        let mut ctx = Trace::default();
        let outcomes = engine.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.ran, expected);
        let names: Vec<_> = outcomes.iter().map(|o| o.rule.as_str()).collect();
        assert_eq!(names, expected);
        assert!(!outcomes[0].success);
    }

    #[tokio::test]
    async fn test_successful_stop_rule_continues() {
        let engine: RuleEngine<Trace> = RuleEngine::new(vec![
            Probe::new("a", Continuation::Stop, true),
            Probe::new("b", Continuation::Stop, true),
        ]);
        let mut ctx = Trace::default();
        assert_eq!(engine.run(&mut ctx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_inapplicable_rules_leave_no_outcome() {
        let engine: RuleEngine<Trace> =
            RuleEngine::new(vec![Probe::flagged("gated", true, false), Probe::new("b", Continuation::Stop, true)]);
        let mut ctx = Trace::default();
        let outcomes = engine.run(&mut ctx).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule, "b");
    }

    #[tokio::test]
    async fn test_predicates_see_earlier_mutations() {
        let engine: RuleEngine<Trace> =
            RuleEngine::new(vec![Probe::flagged("setter", false, true), Probe::flagged("gated", true, false)]);
        let mut ctx = Trace::default();
        engine.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.ran, ["setter", "gated"]);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let engine: RuleEngine<Trace> = RuleEngine::new(vec![
            Probe::new("a", Continuation::Continue, true),
            Arc::new(Broken) as RuleHandle<Trace>,
            Probe::new("c", Continuation::Continue, true),
        ]);
        let mut ctx = Trace::default();
        let err = engine.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Rule(_)));
        assert_eq!(ctx.ran, ["a"]);
    }

    #[tokio::test]
    async fn test_nested_engine() {
        struct Nested(RuleEngine<Trace>);

        #[async_trait]
        impl Rule<Trace> for Nested {
            fn name(&self) -> &str {
                "nested"
            }

            fn continuation(&self) -> Continuation {
                Continuation::Continue
            }

            fn applies(&self, _ctx: &Trace) -> bool {
                true
            }

            async fn execute(&self, ctx: &mut Trace) -> Result<Outcome> {
                let outcomes = self.0.run(ctx).await?;
                Ok(Outcome::success(format!("{} inner outcomes", outcomes.len())))
            }
        }

        let inner = RuleEngine::new(vec![Probe::new("inner", Continuation::Stop, true)]);
        let nested: RuleHandle<Trace> = Arc::new(Nested(inner));
        let engine = RuleEngine::new(vec![nested]);
        let mut ctx = Trace::default();
        let outcomes = engine.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.ran, ["inner"]);
        assert_eq!(outcomes[0].message, "1 inner outcomes");
    }
}
