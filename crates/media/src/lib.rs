//! Media items and the parsers that produce them.
//!
//! A [`MediaItem`] is a snapshot of one audio file's tags, technical
//! properties and fingerprint. Tags live in an ordered, case-insensitive
//! name/value map addressed by canonical names (see [`tags`]), with typed
//! accessors layered on top. Parsing and saving are delegated to a
//! [`MediaBackend`], selected at runtime.

mod backend;
pub mod error;
mod item;
#[cfg(feature = "lofty")]
mod lofty;
#[cfg(feature = "mock")]
mod mock;
pub mod tags;

pub use crate::backend::{MediaBackend, MediaHandle, parse_with_timeout, save_with_timeout};
pub use crate::item::{Artwork, MediaItem, split_artist};
#[cfg(feature = "lofty")]
pub use crate::lofty::LoftyBackend;
#[cfg(feature = "mock")]
pub use crate::mock::MockMediaBackend;
