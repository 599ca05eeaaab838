//! Tag access through [`lofty`].

use crate::backend::MediaBackend;
use crate::error::{ErrorKind, Result};
use crate::item::{Artwork, MediaItem};
use crate::tags;
use exn::{OptionExt, ResultExt};
use lofty::config::WriteOptions;
use lofty::file::TaggedFile;
use lofty::picture::MimeType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::path::Path;
use tracing::instrument;

/// Reads and writes ID3v2, Vorbis comments, APE and MP4 atoms.
///
/// AcoustID fields have no native key in most formats and are stored as
/// free-form keys, which round-trip reliably in Vorbis comments and APE
/// tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyBackend;

fn item_key(name: &str) -> Option<ItemKey> {
    let key = match name.to_ascii_uppercase().as_str() {
        tags::ARTIST => ItemKey::TrackArtist,
        tags::ARTISTSORT => ItemKey::TrackArtistSortOrder,
        tags::TITLE => ItemKey::TrackTitle,
        tags::ALBUM => ItemKey::AlbumTitle,
        tags::ALBUMARTIST => ItemKey::AlbumArtist,
        tags::TRACKNUMBER => ItemKey::TrackNumber,
        tags::TRACKTOTAL => ItemKey::TrackTotal,
        tags::DISCNUMBER => ItemKey::DiscNumber,
        tags::DISCTOTAL => ItemKey::DiscTotal,
        other @ (tags::ACOUSTID_ID | tags::ACOUSTID_FINGERPRINT | tags::ACOUSTID_FINGERPRINT_DURATION) => {
            ItemKey::Unknown(other.to_string())
        },
        _ => return None,
    };
    Some(key)
}

fn extension(mime: Option<&MimeType>) -> &'static str {
    match mime {
        Some(MimeType::Png) => "png",
        Some(MimeType::Gif) => "gif",
        Some(MimeType::Bmp) => "bmp",
        Some(MimeType::Tiff) => "tiff",
        _ => "jpg",
    }
}

/// Open by content rather than extension; tags are saved into temporary
/// files whose names don't end in a media extension.
fn open(path: &Path) -> lofty::error::Result<TaggedFile> {
    Ok(Probe::open(path)?.guess_file_type()?.read()?)
}

fn read_tags(item: &mut MediaItem, tag: &Tag) {
    for name in tags::ALL {
        if let Some(value) = item_key(name).and_then(|key| tag.get_string(&key).map(str::to_string)) {
            item.set(name, value);
        }
    }
    // Some formats only expose numbers through the accessors.
    if item.get(tags::TRACKNUMBER).is_none()
        && let Some(track) = tag.track()
    {
        item.set(tags::TRACKNUMBER, track.to_string());
    }
    if item.get(tags::DISCNUMBER).is_none()
        && let Some(disc) = tag.disk()
    {
        item.set(tags::DISCNUMBER, disc.to_string());
    }
    if let Some(picture) = tag.pictures().first() {
        item.set_artwork(Some(Artwork {
            data: picture.data().to_vec(),
            extension: extension(picture.mime_type()).to_string(),
        }));
    }
}

impl MediaBackend for LoftyBackend {
    fn name(&self) -> &str {
        "lofty"
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<MediaItem> {
        let tagged_file = open(path).or_raise(|| ErrorKind::Parse(path.to_path_buf()))?;
        let properties = tagged_file.properties();
        let mut item = MediaItem::new(path)
            .with_duration(properties.duration().as_secs())
            .with_bit_rate(properties.audio_bitrate().map(f64::from).unwrap_or_default());
        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            read_tags(&mut item, tag);
        }
        Ok(item)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn save(&self, item: &MediaItem, path: &Path) -> Result<()> {
        let mut tagged_file = open(path).or_raise(|| ErrorKind::Save(path.to_path_buf()))?;
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file.tag_mut(tag_type).ok_or_raise(|| ErrorKind::Save(path.to_path_buf()))?;
        for (name, value) in item.tags() {
            if let Some(key) = item_key(name) {
                if value.is_empty() {
                    tag.retain(|existing| existing.key() != &key);
                } else {
                    tag.insert_text(key, value.to_string());
                }
            }
        }
        tagged_file
            .save_to_path(path, WriteOptions::default())
            .or_raise(|| ErrorKind::Save(path.to_path_buf()))?;
        tracing::debug!("Saved tags");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    #[rstest]
    #[case("artist", Some(ItemKey::TrackArtist))]
    #[case("ALBUMARTIST", Some(ItemKey::AlbumArtist))]
    #[case("acoustid_id", Some(ItemKey::Unknown("ACOUSTID_ID".to_string())))]
    #[case("COMMENT", None)]
    fn test_item_key(#[case] name: &str, #[case] expected: Option<ItemKey>) {
        assert_eq!(item_key(name), expected);
    }

    #[test]
    fn test_every_canonical_name_is_mapped() {
        assert!(tags::ALL.iter().all(|name| item_key(name).is_some()));
    }

    #[test]
    fn test_parse_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = LoftyBackend.parse(&path).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Parse(_)));
    }

    #[test]
    fn test_parse_missing_file() {
        let err = LoftyBackend.parse(Path::new("/nonexistent/file.flac")).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Parse(_)));
    }
}
