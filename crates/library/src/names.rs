//! Track display names.
//!
//! A slot with a single track names it after the content itself. Multi-track
//! slots render an [upon] template per track: one for audiobooks (chapters)
//! and one for everything else (tracks).
//!
//! # Template Variables
//!
//! | Variable | Type     | Description                                  |
//! |----------|----------|----------------------------------------------|
//! | `name`   | `String` | Content name                                 |
//! | `kind`   | `String` | Content type (`audiobook`, `album`, ...)     |
//! | `number` | `u64`    | One-based track number                       |
//! | `total`  | `u64`    | Number of tracks in the slot                 |
//! | `index`  | `String` | Zero-padded track index, same as the file stem |
//!
//! # Example
//!
//! ```
//! use slotkeeper_database::ContentType;
//! use slotkeeper_library::TrackNamer;
//!
//! let namer = TrackNamer::new("{{ name }} - Chapter {{ number }}", "{{ name }} - Track {{ number }}").unwrap();
//! assert_eq!(namer.name("Dune", ContentType::Audiobook, 2, 12, "002").unwrap(), "Dune - Chapter 2");
//! assert_eq!(namer.name("Dune", ContentType::Audiobook, 1, 1, "001").unwrap(), "Dune");
//! ```

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use slotkeeper_database::ContentType;
use upon::{Engine, Template};

pub struct TrackNamer {
    engine: Engine<'static>,
    chapter: Template<'static>,
    track: Template<'static>,
}
impl TrackNamer {
    /// Compiles both templates up front so syntax errors surface before any
    /// file is touched.
    pub fn new(chapter: impl Into<String>, track: impl Into<String>) -> Result<Self> {
        let engine = Engine::new();
        let chapter = engine.compile(chapter.into()).or_raise(|| ErrorKind::Template)?;
        let track = engine.compile(track.into()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, chapter, track })
    }

    /// Display name of track `number` (one-based) out of `total`.
    pub fn name(
        &self,
        content: &str,
        content_type: ContentType,
        number: usize,
        total: usize,
        index: &str,
    ) -> Result<String> {
        if total == 1 {
            return Ok(content.to_string());
        }
        let template = match content_type {
            ContentType::Audiobook => &self.chapter,
            _ => &self.track,
        };
        let rendered = template
            .render(
                &self.engine,
                upon::value! {
                    name: content,
                    kind: content_type.to_string(),
                    number: number as u64,
                    total: total as u64,
                    index: index,
                },
            )
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Ok(rendered.trim().to_string())
    }
}
