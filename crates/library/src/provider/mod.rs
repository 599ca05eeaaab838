//! Seams for external metadata lookups and file repair.
//!
//! Concrete network-backed providers plug in here. The library only needs
//! to find candidate matches for an item and apply one of them; every call
//! out goes through [`with_retry`].

pub mod error;
mod retry;

pub use self::retry::with_retry;
use crate::provider::error::Result;
use async_trait::async_trait;
use shelver_config::Overwrite;
use shelver_media::{MediaItem, tags};
use std::path::Path;

/// A possible identification of a track, as proposed by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub provider: String,
    /// Provider-specific confidence; higher is better.
    pub score: f64,
    /// Canonical tag names and the values the provider suggests.
    pub tags: Vec<(String, String)>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Look up possible identifications for `item`.
    async fn find_candidates(&self, item: &MediaItem) -> Result<Vec<CandidateMatch>>;

    /// Copy `candidate`'s tags into `item`.
    ///
    /// Tags already present on the item are only replaced when the matching
    /// `overwrite` flag is set. Returns `false` if the candidate carried
    /// nothing to apply.
    fn apply_tags(&self, candidate: &CandidateMatch, item: &mut MediaItem, overwrite: &Overwrite) -> bool {
        for (name, value) in &candidate.tags {
            let may_overwrite = match name.to_ascii_uppercase().as_str() {
                tags::ARTIST | tags::ARTISTSORT | tags::ALBUMARTIST => overwrite.artist,
                tags::ALBUM => overwrite.album,
                tags::TITLE => overwrite.title,
                tags::TRACKNUMBER | tags::TRACKTOTAL | tags::DISCNUMBER | tags::DISCTOTAL => overwrite.track_numbers,
                _ => true,
            };
            if may_overwrite || item.get(name).is_none() {
                item.set(name, value.clone());
            }
        }
        !candidate.tags.is_empty()
    }
}

/// Re-encodes or otherwise fixes files the media backend can't parse.
#[async_trait]
pub trait Repairer: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt to repair `path` in place. Returns `true` if anything changed.
    async fn repair(&self, path: &Path) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static;

    #[async_trait]
    impl MetadataProvider for Static {
        fn name(&self) -> &str {
            "static"
        }

        async fn find_candidates(&self, _item: &MediaItem) -> Result<Vec<CandidateMatch>> {
            Ok(Vec::new())
        }
    }

    fn candidate() -> CandidateMatch {
        CandidateMatch {
            provider: "static".to_string(),
            score: 1.0,
            tags: vec![
                (tags::ARTIST.to_string(), "Provider Artist".to_string()),
                (tags::TITLE.to_string(), "Provider Title".to_string()),
                (tags::ACOUSTID_ID.to_string(), "abc".to_string()),
            ],
        }
    }

    #[test]
    fn test_apply_respects_overwrite_flags() {
        let mut item = MediaItem::new("/a.flac").with_tag(tags::ARTIST, "Mine");
        assert!(Static.apply_tags(&candidate(), &mut item, &Overwrite::default()));
        assert_eq!(item.artist(), "Mine");
        assert_eq!(item.title(), "Provider Title");
        assert_eq!(item.acoustic_id(), Some("abc"));

        let overwrite = Overwrite { artist: true, ..Overwrite::default() };
        Static.apply_tags(&candidate(), &mut item, &overwrite);
        assert_eq!(item.artist(), "Provider Artist");
    }

    #[test]
    fn test_apply_empty_candidate() {
        let empty = CandidateMatch { provider: "static".to_string(), score: 0.0, tags: Vec::new() };
        assert!(!Static.apply_tags(&empty, &mut MediaItem::new("/a.flac"), &Overwrite::default()));
    }
}
