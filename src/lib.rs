//! Word-timestamped lyric playback.
//!
//! [`parser::parse`] turns a transcript into a [`Song`], a [`PlaybackClock`] moves the
//! playhead, and a [`Session`] resolves the active section and preset every frame and hands
//! them to a presentation driver.

pub mod clock;
pub mod config;
pub mod event;
pub mod parser;
pub mod preset;
pub mod project;
pub mod song;
pub mod stanzas;
pub mod style;

pub use clock::{PlaybackClock, PlayerState, TimeSource};
pub use config::StanzasConfig;
pub use event::ControlEvent;
pub use parser::parse;
pub use preset::{PresetCatalog, StylePreset};
pub use project::Project;
pub use song::{Line, Section, SectionId, SectionType, Song, Word};
pub use stanzas::{
    handler::{PresentationDriver, Stage, StanzasBackend, StanzasHandler},
    Session,
};
pub use style::{active_section, resolve_preset, PresetId, StyleMap};
