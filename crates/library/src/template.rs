//! Path templating for target directories.
//!
//! Converts a [`MediaItem`]'s tags into relative directory paths using
//! user-configured [upon] templates. The template syntax follows upon's
//! Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`),
//! extended with library-specific formatters and functions:
//!
//! - **`sanitize`**: Replaces characters that are unsafe in file names
//!   (`/ \ : * ? " < > |` and control characters) with `_`, and trims
//!   leading dots and trailing dots or spaces.
//! - **`slug`**: Converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`**: Truncates strings to a maximum byte length at a character
//!   boundary, usable as either `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable       | Type           | Description                                    |
//! |----------------|----------------|------------------------------------------------|
//! | `artist`       | `String`       | Directory artist (album artist, else artist)   |
//! | `album_artist` | `String`       | `ALBUMARTIST` tag                              |
//! | `track_artist` | `String`       | `ARTIST` tag                                   |
//! | `album`        | `String`       | `ALBUM` tag                                    |
//! | `title`        | `String`       | `TITLE` tag                                    |
//! | `track`        | `Option<u32>`  | Track number                                   |
//! | `disc`         | `Option<u32>`  | Disc number                                    |
//!
//! # Example
//!
//! ```
//! use shelver_library::{PathGenerator, PathParams};
//! use shelver_media::{MediaItem, tags};
//!
//! let item = MediaItem::new("/incoming/a.flac").with_tag(tags::ARTIST, "AC/DC").with_tag(tags::ALBUM, "Back in Black");
//! let generator: PathGenerator = "{{ artist|sanitize }}/{{ album|slug }}".parse().unwrap();
//! let path = generator.generate(&PathParams::from_item(&item, item.artist())).unwrap();
//! assert_eq!(path.to_str(), Some("AC_DC/back-in-black"));
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use shelver_media::MediaItem;
use shelver_storage::validate_path;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::instrument;
use upon::{Engine, Template};

/// Values exposed to a template.
#[derive(Debug, Clone, Default)]
pub struct PathParams<'a> {
    pub artist: &'a str,
    pub album_artist: &'a str,
    pub track_artist: &'a str,
    pub album: &'a str,
    pub title: &'a str,
    pub track: Option<u32>,
    pub disc: Option<u32>,
}

impl<'a> PathParams<'a> {
    /// Parameters for `item`, with `artist` as the directory artist.
    pub fn from_item(item: &'a MediaItem, artist: &'a str) -> Self {
        Self {
            artist,
            album_artist: item.album_artist(),
            track_artist: item.artist(),
            album: item.album(),
            title: item.title(),
            track: item.track_number(),
            disc: item.disc_number(),
        }
    }
}

/// Generates deterministic relative paths from tag values and a
/// user-defined template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time. The
/// compiled template is reusable across many [`generate`](Self::generate) calls.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}

impl FromStr for PathGenerator {
    type Err = Error;

    /// Compiles the given template string into a reusable [`PathGenerator`].
    ///
    /// Registers the `sanitize` and `slug` formatters and the `truncate`
    /// function before compiling. Returns [`ErrorKind::Template`] if the
    /// template syntax is invalid.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        // Compile the template early so we can fail-fast in construction.
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}

impl PathGenerator {
    /// Renders the template, returning a normalized relative path.
    ///
    /// Empty segments are dropped. A result that is empty or contains `.` or
    /// `..` segments is rejected.
    #[instrument(skip_all, fields(artist = params.artist, album = params.album))]
    pub fn generate(&self, params: &PathParams<'_>) -> Result<PathBuf> {
        let rendered = self
            .template
            .render(&self.engine, Self::parameters(params))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(&rendered)
    }

    /// Renders the template and joins the result onto `root`.
    ///
    /// The joined path is validated by [`shelver_storage::validate_path`] and
    /// must stay inside `root`.
    pub fn generate_under(&self, root: &Path, params: &PathParams<'_>) -> Result<PathBuf> {
        let joined = validate_path(root.join(self.generate(params)?)).or_raise(|| ErrorKind::Template)?;
        if !joined.starts_with(root) {
            exn::bail!(ErrorKind::Template);
        }
        Ok(joined)
    }

    fn normalize(rendered: &str) -> Result<PathBuf> {
        let segments: Vec<&str> = rendered.split('/').map(str::trim).filter(|s| !s.is_empty()).collect();
        let path: PathBuf = segments.iter().collect();
        let mut components = path.components().peekable();
        components.peek().ok_or_raise(|| ErrorKind::Template)?;
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            exn::bail!(ErrorKind::Template);
        }
        Ok(path)
    }

    fn parameters(params: &PathParams<'_>) -> upon::Value {
        upon::value! {
            artist: params.artist,
            album_artist: params.album_artist,
            track_artist: params.track_artist,
            album: params.album,
            title: params.title,
            track: params.track,
            disc: params.disc,
        }
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    const UNSAFE: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    fn sanitize(s: &str) -> String {
        let replaced: String = s.chars().map(|c| if UNSAFE.contains(&c) || c.is_control() { '_' } else { c }).collect();
        replaced.trim().trim_start_matches('.').trim_end_matches(['.', ' ']).to_string()
    }

    /// Custom formatter that makes a string safe to use as a single path segment.
    fn sanitize_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", sanitize(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Custom formatter that converts strings to URL-safe slugs.
    ///
    /// Strips quotation marks before slugifying to avoid awkward slug output
    /// like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Truncates a string to a maximum byte length at a character boundary.
    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    /// Registers the formatters and functions on the given engine.
    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("sanitize", sanitize_formatter);
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }

    #[cfg(test)]
    mod tests {
        use super::sanitize;
        use rstest::rstest;

        #[rstest]
        #[case("AC/DC", "AC_DC")]
        #[case("What?: A <Question>", "What__ A _Question_")]
        #[case("  ..hidden ", "hidden")]
        #[case("Trailing... ", "Trailing")]
        #[case("..", "")]
        #[case("Björk", "Björk")]
        fn test_sanitize(#[case] input: &str, #[case] expected: &str) {
            assert_eq!(sanitize(input), expected);
        }
    }
}
