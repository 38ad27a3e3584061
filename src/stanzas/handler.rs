use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::trace;

use crate::{
    config::StanzasConfig,
    preset::StylePreset,
    song::{Line, LineId, Section, SectionId},
};

use super::Session;

/// Receives the playhead every frame and decides what is on screen.
///
/// `update` is called once per frame with the active section, or `None` between sections.
/// `set_preset` is called only when the resolved preset changes. `reset` drops everything
/// immediately, after a seek or restart.
pub trait PresentationDriver {
    fn set_preset(&mut self, preset: &StylePreset);
    fn update(&mut self, now: Instant, current_time: f64, section: Option<&Section>);
    fn reset(&mut self);
}

#[async_trait::async_trait(?Send)]
pub trait StanzasBackend {
    async fn run_backend(
        &mut self,
        session: &mut Session,
        config: Arc<StanzasConfig>,
    ) -> anyhow::Result<()>;
}

pub struct StanzasHandler<T: StanzasBackend> {
    backend: T,
}

impl<T: StanzasBackend> StanzasHandler<T> {
    pub fn new(backend: T) -> Self {
        Self { backend }
    }

    /// Runs the backend to completion and tears the session's clock down afterwards.
    pub async fn run(
        mut self,
        mut session: Session,
        config: Arc<StanzasConfig>,
    ) -> anyhow::Result<Session> {
        let result = self.backend.run_backend(&mut session, config).await;
        session.destroy();
        result.map(|_| session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePhase {
    Entering,
    Shown,
    Exiting,
}

#[derive(Debug, Clone)]
pub struct VisibleLine {
    pub line: Line,
    pub phase: LinePhase,
    pub since: Instant,
}

impl VisibleLine {
    /// How far along the current phase's animation is, from 0 to 1.
    pub fn progress(&self, now: Instant, length: Duration) -> f64 {
        if length.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.since).as_secs_f64();
        (elapsed / length.as_secs_f64()).min(1.0)
    }
}

/// What is currently on screen for one section activation.
///
/// A section change clears the screen first. Lines of the new section only appear once the
/// clear has finished, and each line appears at most once per activation.
#[derive(Debug, Clone)]
pub struct Stage {
    section_id: Option<SectionId>,
    shown: HashSet<LineId>,
    lines: VecDeque<VisibleLine>,
    clearing_until: Option<Instant>,
    clear_transition: Duration,
    transition: Duration,
    max_visible_lines: usize,
}

impl Stage {
    pub fn new(clear_transition: Duration) -> Self {
        Self {
            section_id: None,
            shown: HashSet::new(),
            lines: VecDeque::new(),
            clearing_until: None,
            clear_transition,
            transition: Duration::ZERO,
            max_visible_lines: usize::MAX,
        }
    }

    pub fn set_preset(&mut self, preset: &StylePreset) {
        self.transition = Duration::from_millis(preset.config.transition_duration);
        self.max_visible_lines = preset.config.max_visible_lines.max(1);
    }

    pub fn section_id(&self) -> Option<&SectionId> {
        self.section_id.as_ref()
    }

    pub fn lines(&self) -> impl Iterator<Item = &VisibleLine> {
        self.lines.iter()
    }

    pub fn transition(&self) -> Duration {
        self.transition
    }

    pub fn clear_transition(&self) -> Duration {
        self.clear_transition
    }

    pub fn is_clearing(&self) -> bool {
        self.clearing_until.is_some()
    }

    /// Advances the stage to `now`, returning the lines that became visible.
    pub fn update(
        &mut self,
        now: Instant,
        current_time: f64,
        section: Option<&Section>,
    ) -> Vec<Line> {
        self.settle(now);

        let Some(section) = section else {
            return Vec::new();
        };
        if self.is_clearing() {
            return Vec::new();
        }

        if self.section_id.as_ref() != Some(&section.id) {
            trace!(section = %section.id, "stage switching section");
            self.section_id = Some(section.id.clone());
            self.clear_lines(now, true);
            if self.is_clearing() {
                return Vec::new();
            }
        }

        let mut appeared = Vec::new();
        for line in &section.lines {
            if current_time >= line.start_time && self.shown.insert(line.id.clone()) {
                self.show_line(now, line);
                appeared.push(line.clone());
            }
        }
        appeared
    }

    /// Removes every line. An animated clear lets lines fade for the clear transition and
    /// blocks new lines until it is over.
    pub fn clear_lines(&mut self, now: Instant, animated: bool) {
        if !animated || self.lines.is_empty() || self.clear_transition.is_zero() {
            self.lines.clear();
            self.shown.clear();
            self.clearing_until = None;
            return;
        }
        for visible in self.lines.iter_mut() {
            visible.phase = LinePhase::Exiting;
            visible.since = now;
        }
        self.clearing_until = Some(now + self.clear_transition);
    }

    /// Forgets the active section and everything shown for it.
    pub fn reset(&mut self) {
        self.section_id = None;
        self.shown.clear();
        self.lines.clear();
        self.clearing_until = None;
    }

    fn show_line(&mut self, now: Instant, line: &Line) {
        self.lines.push_back(VisibleLine {
            line: line.clone(),
            phase: LinePhase::Entering,
            since: now,
        });

        let mut live = self
            .lines
            .iter()
            .filter(|visible| visible.phase != LinePhase::Exiting)
            .count();
        for visible in self.lines.iter_mut() {
            if live <= self.max_visible_lines {
                break;
            }
            if visible.phase != LinePhase::Exiting {
                visible.phase = LinePhase::Exiting;
                visible.since = now;
                live -= 1;
            }
        }
        if self.transition.is_zero() {
            self.settle(now);
        }
    }

    fn settle(&mut self, now: Instant) {
        if let Some(until) = self.clearing_until {
            if now >= until {
                self.lines.clear();
                self.shown.clear();
                self.clearing_until = None;
            }
            return;
        }

        let transition = self.transition;
        self.lines.retain(|visible| {
            visible.phase != LinePhase::Exiting || now < visible.since + transition
        });
        for visible in self.lines.iter_mut() {
            if visible.phase == LinePhase::Entering && now >= visible.since + transition {
                visible.phase = LinePhase::Shown;
            }
        }
    }
}
