use tracing::info;

use crate::{
    clock::PlaybackClock,
    parser,
    song::{Section, SectionId, Song},
    style::{self, PresetId, StyleMap},
};

/// The song being presented and how each of its sections should look.
#[derive(Debug, Clone, Default)]
pub struct Project {
    song: Option<Song>,
    style_map: StyleMap,
}

impl Project {
    pub fn new(style_map: StyleMap) -> Self {
        Self {
            song: None,
            style_map,
        }
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn style_map(&self) -> &StyleMap {
        &self.style_map
    }

    /// Parses `text` and replaces the current song with the result.
    pub fn import_timestamps(&mut self, text: &str, clock: &mut PlaybackClock) -> &Song {
        let song = parser::parse(text);
        info!(
            title = %song.title,
            sections = song.sections.len(),
            duration = song.duration,
            "imported transcript"
        );
        clock.set_duration(song.duration);
        self.song.insert(song)
    }

    pub fn set_global_preset(&mut self, preset: PresetId) {
        self.style_map = self.style_map.with_global(preset);
    }

    pub fn set_section_preset(&mut self, section: SectionId, preset: PresetId) {
        self.style_map = self.style_map.with_section(section, preset);
    }

    pub fn clear_section_preset(&mut self, section: &SectionId) {
        self.style_map = self.style_map.without_section(section);
    }

    pub fn clear(&mut self, clock: &mut PlaybackClock) {
        self.song = None;
        clock.restart();
    }

    pub fn current_section(&self, time: f64) -> Option<&Section> {
        style::active_section_in(self.song.as_ref(), time)
    }

    pub fn active_preset_id(&self, time: f64) -> PresetId {
        style::resolve_preset(&self.style_map, self.current_section(time))
    }
}
