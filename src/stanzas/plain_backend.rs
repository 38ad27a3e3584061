use std::{
    io::Write,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::{
    clock::format_time,
    config::{GeneralConfiguration, StanzasConfig},
    preset::StylePreset,
    song::{Section, SectionId},
};

use super::{
    handler::{PresentationDriver, Stage, StanzasBackend},
    labels::Labels,
    Session,
};

/// Prints lines to a writer as they appear, with a blank line between sections.
pub struct PlainBackend<W: Write> {
    out: W,
    stage: Stage,
    general: GeneralConfiguration,
    pending: Vec<String>,
    printed_section: Option<SectionId>,
}

impl<W: Write> PlainBackend<W> {
    pub fn new(out: W, general: GeneralConfiguration) -> Self {
        Self {
            out,
            stage: Stage::new(Duration::from_millis(general.clear_transition_ms)),
            general,
            pending: Vec::new(),
            printed_section: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_pending(&mut self) -> anyhow::Result<()> {
        for text in self.pending.drain(..) {
            writeln!(self.out, "{text}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> PresentationDriver for PlainBackend<W> {
    fn set_preset(&mut self, preset: &StylePreset) {
        self.stage.set_preset(preset);
    }

    fn update(&mut self, now: Instant, current_time: f64, section: Option<&Section>) {
        let appeared = self.stage.update(now, current_time, section);
        if appeared.is_empty() {
            return;
        }
        if self.printed_section.is_some()
            && self.printed_section.as_ref() != self.stage.section_id()
        {
            self.pending.push(String::new());
        }
        self.printed_section = self.stage.section_id().cloned();
        for line in appeared {
            self.pending.push(format!(
                "[{}] {}",
                format_time(line.start_time),
                self.general.romanize(&line.text)
            ));
        }
    }

    fn reset(&mut self) {
        self.stage.reset();
        self.printed_section = None;
    }
}

#[async_trait::async_trait(?Send)]
impl<W: Write> StanzasBackend for PlainBackend<W> {
    async fn run_backend(
        &mut self,
        session: &mut Session,
        config: Arc<StanzasConfig>,
    ) -> anyhow::Result<()> {
        let labels = Labels::new(config.general.display.clone());
        if let Some(header) = labels.header(&session.snapshot()) {
            writeln!(self.out, "{header}")?;
            writeln!(self.out)?;
        }

        let mut interval = tokio::time::interval(frame_interval(config.general.frame_rate));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        session.clock_mut().play();
        loop {
            interval.tick().await;
            session.frame(Instant::now(), self);
            self.flush_pending()?;
            if !session.clock().is_playing() {
                break;
            }
        }
        info!(elapsed = session.clock().current_time(), "plain playback finished");
        Ok(())
    }
}

pub(crate) fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64)
}
