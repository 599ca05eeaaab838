//! Filesystem mutations on the library.
//!
//! Every function here that moves, overwrites or deletes a file also
//! invalidates the [`ParseCache`](shelver_cache::ParseCache) entry for each
//! path it touched, and bumps the matching run counter.
//!
//! Placing a file never writes to its destination directly. The incoming
//! bytes are copied to a hidden temporary sibling (see [`temp_path`]), tags
//! are saved into that copy, and the copy is checked before being renamed
//! over the destination. A failure at any step before the rename removes the
//! temporary file and leaves the incoming file untouched.

pub mod error;
mod file;

pub use self::file::{dump_artwork, ensure_dir, place, remove, temp_path};
