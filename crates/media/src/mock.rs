//! Plain-text media backend for testing.

use crate::backend::MediaBackend;
use crate::error::{ErrorKind, Result};
use crate::item::{Artwork, MediaItem};
use exn::ResultExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const DURATION: &str = "~duration";
const BIT_RATE: &str = "~bitrate";
const ARTWORK: &str = "~artwork";
const CORRUPT: &str = "CORRUPT";

/// Treats files as `KEY=VALUE` lines.
///
/// Lines whose key is all uppercase ASCII, digits or underscores are tags;
/// `~duration`, `~bitrate` and `~artwork` (as `ext:data`) carry properties.
/// Any other line is opaque payload standing in for audio data and is
/// preserved on save. A file starting with `CORRUPT` fails to parse.
#[derive(Debug, Default)]
pub struct MockMediaBackend {
    parses: AtomicUsize,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

fn is_tag_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

fn is_metadata_line(line: &str) -> bool {
    line.split_once('=')
        .is_some_and(|(key, _)| is_tag_key(key) || matches!(key, DURATION | BIT_RATE | ARTWORK))
}

impl MockMediaBackend {
    /// Number of times [`parse`](MediaBackend::parse) was called.
    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Render `item` and `payload` in the format this backend reads.
    pub fn encode(item: &MediaItem, payload: &str) -> String {
        let mut out = String::new();
        for (name, value) in item.tags() {
            out.push_str(&format!("{}={value}\n", name.to_ascii_uppercase()));
        }
        out.push_str(&format!("{DURATION}={}\n{BIT_RATE}={}\n", item.duration(), item.bit_rate()));
        if let Some(artwork) = item.artwork() {
            out.push_str(&format!("{ARTWORK}={}:{}\n", artwork.extension, String::from_utf8_lossy(&artwork.data)));
        }
        for line in payload.lines() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl MediaBackend for MockMediaBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn parse(&self, path: &Path) -> Result<MediaItem> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        let contents = std::fs::read_to_string(path).or_raise(|| ErrorKind::Parse(path.to_path_buf()))?;
        if contents.starts_with(CORRUPT) {
            exn::bail!(ErrorKind::Parse(path.to_path_buf()));
        }
        let mut item = MediaItem::new(path);
        for (key, value) in contents.lines().filter(|l| is_metadata_line(l)).filter_map(|l| l.split_once('=')) {
            match key {
                DURATION => item = item.with_duration(value.parse().unwrap_or_default()),
                BIT_RATE => item = item.with_bit_rate(value.parse().unwrap_or_default()),
                ARTWORK => {
                    let (extension, data) = value.split_once(':').unwrap_or(("jpg", value));
                    item.set_artwork(Some(Artwork { data: data.as_bytes().to_vec(), extension: extension.to_string() }));
                },
                name => item.set(name, value),
            }
        }
        Ok(item)
    }

    fn save(&self, item: &MediaItem, path: &Path) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Save(path.to_path_buf()));
        }
        let existing = std::fs::read_to_string(path).or_raise(|| ErrorKind::Save(path.to_path_buf()))?;
        let payload: Vec<&str> = existing.lines().filter(|l| !is_metadata_line(l)).collect();
        let rendered = Self::encode(item, &payload.join("\n"));
        std::fs::write(path, rendered).or_raise(|| ErrorKind::Save(path.to_path_buf()))?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
