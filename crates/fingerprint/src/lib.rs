//! Acoustic fingerprints: decoding, generation and comparison.
//!
//! Fingerprints arrive as opaque strings (either comma-separated integers or
//! Chromaprint's compressed base64 form) and are compared as sequences of
//! `u32` using a bounded dynamic-time-warping alignment, see [`similarity`].

mod decode;
pub mod error;
mod generator;
#[cfg(feature = "mock")]
mod mock;
mod similarity;

pub use crate::decode::decode;
pub use crate::generator::{Fingerprint, FingerprintGenerator, FpcalcGenerator, generate_with_timeout};
#[cfg(feature = "mock")]
pub use crate::mock::MockGenerator;
pub use crate::similarity::{ACCEPT_THRESHOLD, DEFAULT_THRESHOLD, similarity};
use std::sync::Arc;

pub type GeneratorHandle = Arc<dyn FingerprintGenerator>;
