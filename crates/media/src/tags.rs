//! Canonical tag names.
//!
//! Names follow Vorbis comment conventions; backends map them onto their
//! own key spaces.

pub const ARTIST: &str = "ARTIST";
pub const ARTISTSORT: &str = "ARTISTSORT";
pub const TITLE: &str = "TITLE";
pub const ALBUM: &str = "ALBUM";
pub const ALBUMARTIST: &str = "ALBUMARTIST";
pub const TRACKNUMBER: &str = "TRACKNUMBER";
pub const TRACKTOTAL: &str = "TRACKTOTAL";
pub const DISCNUMBER: &str = "DISCNUMBER";
pub const DISCTOTAL: &str = "DISCTOTAL";
pub const ACOUSTID_ID: &str = "ACOUSTID_ID";
pub const ACOUSTID_FINGERPRINT: &str = "ACOUSTID_FINGERPRINT";
pub const ACOUSTID_FINGERPRINT_DURATION: &str = "ACOUSTID_FINGERPRINT_DURATION";

/// Every canonical name, in the order backends write them.
pub const ALL: [&str; 12] = [
    ARTIST,
    ARTISTSORT,
    TITLE,
    ALBUM,
    ALBUMARTIST,
    TRACKNUMBER,
    TRACKTOTAL,
    DISCNUMBER,
    DISCTOTAL,
    ACOUSTID_ID,
    ACOUSTID_FINGERPRINT,
    ACOUSTID_FINGERPRINT_DURATION,
];
