//! Reconciling incoming media files with an organized library.
//!
//! Each incoming file runs through a [`RuleEngine`] pipeline (see
//! [`rules::pipeline`]) that parses it, optionally identifies it with
//! metadata providers, works out where it belongs, looks for copies already
//! in the library and then moves, replaces or discards it. [`process`]
//! drives the pipeline over a whole source tree.

pub mod context;
pub mod counters;
pub mod engine;
pub mod error;
pub mod organize;
mod process;
pub mod provider;
pub mod resolve;
pub mod rules;
pub mod scan;
mod template;

pub use crate::context::{ProcessingContext, Services};
pub use crate::counters::{Counter, CounterSnapshot, Counters};
pub use crate::engine::{Continuation, Outcome, Rule, RuleEngine, RuleHandle};
pub use crate::process::{FileReport, ProcessEvent, process};
pub use crate::resolve::{Resolution, ResolutionPolicy};
pub use crate::scan::{SimilarCandidate, SimilarityResult, SimilarityScanner};
pub use crate::template::{PathGenerator, PathParams};
