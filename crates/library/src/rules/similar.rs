use crate::context::ProcessingContext;
use crate::counters::Counter;
use crate::engine::{Continuation, Outcome, Rule};
use crate::error::{ErrorKind, Result};
use crate::scan::{ScanOptions, SimilarityScanner};
use async_trait::async_trait;
use exn::OptionExt;
use std::sync::Arc;

/// Look for copies of the incoming track in the album directory and the
/// configured extra directories.
pub struct ScanSimilar;

#[async_trait]
impl Rule<ProcessingContext> for ScanSimilar {
    fn name(&self) -> &str {
        "scan-similar"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Stop
    }

    fn applies(&self, ctx: &ProcessingContext) -> bool {
        ctx.is_parsed() && ctx.album_dir.is_some() && ctx.similarity.is_none()
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<Outcome> {
        let services = Arc::clone(&ctx.services);
        let config = Arc::clone(&ctx.config);
        let album_dir = ctx.album_dir.clone().ok_or_raise(|| ErrorKind::Rule(self.name().to_string()))?;
        let scanner = SimilarityScanner::new(
            &services.storage,
            &services.cache,
            services.fingerprinter.as_ref(),
            ScanOptions::from_config(&config),
        );

        let result = match scanner.scan(ctx.item_mut()?, &album_dir, &config.library.extra_scan_dirs).await {
            Ok(result) => result,
            Err(e) => {
                services.counters.incr(Counter::Errors);
                return Ok(Outcome::failure("similarity scan failed").error(e.to_string()));
            },
        };

        let found = result.candidates.len();
        let had_errors = result.had_errors;
        ctx.similarity = Some(result);
        if had_errors && !config.duplicates.tolerate_scan_errors {
            services.counters.incr(Counter::Errors);
            return Ok(Outcome::failure("similarity scan was incomplete").error(format!(
                "some files in {} could not be compared; refusing to act on partial results",
                album_dir.display()
            )));
        }
        let mut outcome = Outcome::success(format!("found {found} similar files"));
        if had_errors {
            outcome = outcome.warn("some files could not be compared; continuing anyway");
        }
        Ok(outcome)
    }
}
