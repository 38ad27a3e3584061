pub mod handler;
pub mod labels;
pub mod plain_backend;
pub mod tui_backend;

use std::{ops::ControlFlow, time::Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    clock::PlaybackClock,
    event::ControlEvent,
    preset::PresetCatalog,
    project::Project,
    song::{SectionId, SectionType},
    style::PresetId,
};

use self::handler::PresentationDriver;

/// Everything one playback needs: the clock, the project it plays and the presets it
/// resolves against. Driven one frame at a time by a backend.
#[derive(Debug)]
pub struct Session {
    clock: PlaybackClock,
    project: Project,
    catalog: PresetCatalog,
    seek_step: f64,
    last_preset: Option<PresetId>,
    last_section: Option<SectionId>,
    needs_reset: bool,
}

/// Display-ready view of the session, also used as template data for labels.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub title: String,
    /// 1-based.
    pub index: Option<usize>,
    pub count: usize,
    pub section_type: Option<SectionType>,
    pub preset: PresetId,
    pub preset_name: &'static str,
    pub elapsed: String,
    pub total: String,
    pub progress: f64,
    pub is_playing: bool,
    pub is_seeking: bool,
}

impl Session {
    pub fn new(
        project: Project,
        clock: PlaybackClock,
        catalog: PresetCatalog,
        seek_step: f64,
    ) -> Self {
        Self {
            clock,
            project,
            catalog,
            seek_step,
            last_preset: None,
            last_section: None,
            needs_reset: false,
        }
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    pub fn seek_step(&self) -> f64 {
        self.seek_step
    }

    /// Runs one frame: advances the clock, resolves section and preset, and hands both to
    /// the driver.
    pub fn frame<D: PresentationDriver + ?Sized>(&mut self, now: Instant, driver: &mut D) {
        if self.clock.is_destroyed() {
            return;
        }
        self.clock.tick(now);
        let time = self.clock.current_time();

        if self.needs_reset {
            driver.reset();
            self.needs_reset = false;
        }

        let preset = self.project.active_preset_id(time);
        if self.last_preset != Some(preset) {
            debug!(%preset, "preset changed");
            driver.set_preset(self.catalog.get(preset));
            self.last_preset = Some(preset);
        }

        let section = self.project.current_section(time);
        let section_id = section.map(|section| &section.id);
        if self.last_section.as_ref() != section_id {
            debug!(section = ?section_id, time, "active section changed");
            self.last_section = section_id.cloned();
        }
        driver.update(now, time, section);
    }

    /// Applies a user command. Breaks when the user asked to quit.
    ///
    /// Moving back into a different section, or restarting, makes the next frame start a
    /// fresh activation. A backwards seek that stays in the active section keeps it.
    pub fn apply(&mut self, event: ControlEvent) -> ControlFlow<()> {
        let before = self.clock.current_time();
        let section_before = self.section_id_at(before);
        match event {
            ControlEvent::TogglePlayback => self.clock.toggle(),
            ControlEvent::Seek { delta } => self.clock.seek_by(delta),
            ControlEvent::ToggleScrub => {
                let seeking = !self.clock.is_seeking();
                self.clock.set_seeking(seeking);
            }
            ControlEvent::Restart => self.clock.restart(),
            ControlEvent::CycleGlobalPreset => {
                let next = self.catalog.cycle_next(self.project.style_map().global);
                info!(preset = %next, "global preset set");
                self.project.set_global_preset(next);
            }
            ControlEvent::CycleSectionPreset => self.cycle_section_preset(),
            ControlEvent::Quit => return ControlFlow::Break(()),
        }
        let after = self.clock.current_time();
        let left_section = after < before && self.section_id_at(after) != section_before;
        if left_section || event == ControlEvent::Restart {
            self.needs_reset = true;
        }
        ControlFlow::Continue(())
    }

    fn section_id_at(&self, time: f64) -> Option<SectionId> {
        self.project
            .current_section(time)
            .map(|section| section.id.clone())
    }

    /// Moves the active section to the next preset, dropping the override once it cycles
    /// back to the global one.
    fn cycle_section_preset(&mut self) {
        let time = self.clock.current_time();
        let Some(section) = self.project.current_section(time) else {
            return;
        };
        let id = section.id.clone();
        let next = self.catalog.cycle_next(self.project.active_preset_id(time));
        if next == self.project.style_map().global {
            self.project.clear_section_preset(&id);
        } else {
            self.project.set_section_preset(id.clone(), next);
        }
        info!(section = %id, preset = %next, "section preset set");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let time = self.clock.current_time();
        let song = self.project.song();
        let section = self.project.current_section(time);
        let preset = self.project.active_preset_id(time);
        SessionSnapshot {
            title: song.map(|song| song.title.clone()).unwrap_or_default(),
            index: section
                .and_then(|section| song.and_then(|song| song.section_index(&section.id)))
                .map(|idx| idx + 1),
            count: song.map(|song| song.sections.len()).unwrap_or(0),
            section_type: section.map(|section| section.section_type),
            preset,
            preset_name: self.catalog.get(preset).name,
            elapsed: self.clock.formatted_time(),
            total: self.clock.formatted_duration(),
            progress: self.clock.progress(),
            is_playing: self.clock.is_playing(),
            is_seeking: self.clock.is_seeking(),
        }
    }

    pub fn destroy(&mut self) {
        self.clock.destroy();
    }
}
