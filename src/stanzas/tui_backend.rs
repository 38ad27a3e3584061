use std::{
    io::Stdout,
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{block::Title, Block, Borders, Gauge, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{
    config::{GeneralConfiguration, StanzasConfig, ThemeConfiguration},
    event::ControlEvent,
    preset::{EnterAnimation, ExitAnimation, PresetConfig, StylePreset},
    song::Section,
};

use super::{
    handler::{LinePhase, PresentationDriver, Stage, StanzasBackend, VisibleLine},
    labels::Labels,
    plain_backend::frame_interval,
    Session, SessionSnapshot,
};

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Full screen driver: one section at a time, centred, styled by the active preset.
pub struct TerminalUiBackend {
    stage: Stage,
    preset: Option<StylePreset>,
    general: GeneralConfiguration,
}

impl TerminalUiBackend {
    pub fn new(general: GeneralConfiguration) -> Self {
        Self {
            stage: Stage::new(Duration::from_millis(general.clear_transition_ms)),
            preset: None,
            general,
        }
    }
}

impl PresentationDriver for TerminalUiBackend {
    fn set_preset(&mut self, preset: &StylePreset) {
        self.stage.set_preset(preset);
        self.preset = Some(preset.clone());
    }

    fn update(&mut self, now: Instant, current_time: f64, section: Option<&Section>) {
        for line in self.stage.update(now, current_time, section) {
            debug!(line = %line.id, start = line.start_time, "showing line");
        }
    }

    fn reset(&mut self) {
        self.stage.reset();
    }
}

#[async_trait::async_trait(?Send)]
impl StanzasBackend for TerminalUiBackend {
    async fn run_backend(
        &mut self,
        session: &mut Session,
        config: Arc<StanzasConfig>,
    ) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;

        let result = self.tui_loop(session, &config, &mut terminal).await;

        restore_terminal(&mut terminal)?;
        result
    }
}

impl TerminalUiBackend {
    async fn tui_loop(
        &mut self,
        session: &mut Session,
        config: &StanzasConfig,
        terminal: &mut Term,
    ) -> anyhow::Result<()> {
        let labels = Labels::new(config.general.display.clone());
        let input = spawn_input_reader(session.seek_step());
        let mut interval = tokio::time::interval(frame_interval(config.general.frame_rate));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            for event in input.try_iter() {
                if session.apply(event).is_break() {
                    return Ok(());
                }
            }

            let now = Instant::now();
            session.frame(now, self);
            let snapshot = session.snapshot();
            terminal.draw(|frame| self.handle_ui(frame, now, &snapshot, &labels, &config.theme))?;
        }
    }

    fn handle_ui<B: Backend>(
        &self,
        f: &mut Frame<B>,
        now: Instant,
        snapshot: &SessionSnapshot,
        labels: &Labels,
        theme: &ThemeConfiguration,
    ) {
        let size = f.size();
        let background = self
            .preset
            .as_ref()
            .map(|preset| preset.config.background.0)
            .unwrap_or(Color::Reset);

        let vertical_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)].as_ref())
            .split(size);

        let title_style = Style::default().fg(theme.borders.border_text_color.0);
        let mut lyrics_block = Block::default()
            .borders(Borders::ALL)
            .border_type(theme.borders.border_style.0)
            .border_style(Style::default().fg(theme.borders.border_color.0))
            .style(Style::default().bg(background));
        if let Some(header) = labels.header(snapshot) {
            lyrics_block = lyrics_block.title(
                Title::from(Span::styled(header, title_style)).alignment(Alignment::Left),
            );
        }
        if let Some(section) = labels.section(snapshot) {
            lyrics_block = lyrics_block.title(
                Title::from(Span::styled(section, title_style)).alignment(Alignment::Right),
            );
        }
        if snapshot.is_seeking {
            lyrics_block = lyrics_block.title(
                Title::from(Span::styled("scrubbing", title_style)).alignment(Alignment::Center),
            );
        }

        let inner = lyrics_block.inner(vertical_layout[0]);
        f.render_widget(lyrics_block, vertical_layout[0]);

        if let Some(preset) = &self.preset {
            let text = self.lyric_lines(&preset.config, now, inner.height);
            let lyrics = Paragraph::new(text)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: false });
            f.render_widget(lyrics, inner);
        }

        let label = labels.progress(snapshot);
        let mut progress = Gauge::default()
            .gauge_style(Style::default().fg(theme.progress_bar.color.0))
            .ratio(snapshot.progress.clamp(0.0, 1.0));
        progress = if theme.progress_bar.is_percentage {
            progress.label(format!("{:.0}%", snapshot.progress.clamp(0.0, 1.0) * 100.0))
        } else {
            progress.label(label)
        };
        f.render_widget(progress, vertical_layout[1]);
    }

    /// The stage's lines, one blank row apart and centred vertically in `height` rows.
    fn lyric_lines(&self, config: &PresetConfig, now: Instant, height: u16) -> Vec<Line<'static>> {
        let visible = self.stage.lines().collect::<Vec<_>>();
        let rows = (visible.len() * 2).saturating_sub(1);
        let top = (height as usize).saturating_sub(rows) / 2;

        let mut text = vec![Line::default(); top];
        for (idx, each) in visible.into_iter().enumerate() {
            if idx > 0 {
                text.push(Line::default());
            }
            let length = if self.stage.is_clearing() {
                self.stage.clear_transition()
            } else {
                self.stage.transition()
            };
            let (content, style) =
                animate(each, config, &self.general.romanize(&each.line.text), now, length);
            text.push(Line::from(Span::styled(content, style)));
        }
        text
    }
}

/// Text and style of a line at `now`, according to its phase and the preset's animations.
pub fn animate(
    visible: &VisibleLine,
    config: &PresetConfig,
    text: &str,
    now: Instant,
    length: Duration,
) -> (String, Style) {
    let base = config.text_style();
    let progress = visible.progress(now, length);
    let early = progress < 0.5;

    match visible.phase {
        LinePhase::Shown => (config.transform_text(text), base),
        LinePhase::Entering => match config.enter {
            EnterAnimation::FadeIn | EnterAnimation::FadeUp if early => {
                (config.transform_text(text), base.add_modifier(Modifier::DIM))
            }
            EnterAnimation::SlideLeft => {
                let offset = ((1.0 - progress) * 8.0).round() as usize;
                let mut content = config.transform_text(text);
                content.push_str(&" ".repeat(offset * 2));
                (content, base)
            }
            EnterAnimation::ScaleIn if early => {
                let compact = PresetConfig {
                    letter_spacing: 0,
                    ..config.clone()
                };
                (compact.transform_text(text), base.add_modifier(Modifier::DIM))
            }
            EnterAnimation::Slam if early => (
                config.transform_text(text),
                base.add_modifier(Modifier::BOLD | Modifier::REVERSED),
            ),
            _ => (config.transform_text(text), base),
        },
        LinePhase::Exiting => {
            let content = config.transform_text(text);
            let faded = base.add_modifier(Modifier::DIM);
            match config.exit {
                ExitAnimation::FadeOut | ExitAnimation::FadeUpOut => (content, faded),
                ExitAnimation::Dissolve => {
                    let cutoff = (progress * 10.0) as usize;
                    let dissolved = content
                        .chars()
                        .enumerate()
                        .map(|(idx, ch)| if (idx * 7) % 10 < cutoff { ' ' } else { ch })
                        .collect();
                    (dissolved, faded)
                }
            }
        }
    }
}

pub fn map_key(key: KeyEvent, seek_step: f64) -> Option<ControlEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ControlEvent::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(ControlEvent::Quit),
        KeyCode::Char(' ') => Some(ControlEvent::TogglePlayback),
        KeyCode::Left => Some(ControlEvent::Seek { delta: -seek_step }),
        KeyCode::Right => Some(ControlEvent::Seek { delta: seek_step }),
        KeyCode::Char('s') => Some(ControlEvent::ToggleScrub),
        KeyCode::Char('r') => Some(ControlEvent::Restart),
        KeyCode::Char('g') => Some(ControlEvent::CycleGlobalPreset),
        KeyCode::Char('p') => Some(ControlEvent::CycleSectionPreset),
        _ => None,
    }
}

/// Reads terminal events on a blocking thread until the receiver is dropped.
fn spawn_input_reader(seek_step: f64) -> flume::Receiver<ControlEvent> {
    let (tx, rx) = flume::unbounded();
    tokio::task::spawn_blocking(move || {
        while !tx.is_disconnected() {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("failed to poll terminal events: {e}");
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(control) = map_key(key, seek_step) {
                        if tx.send(control).is_err() {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("failed to read terminal event: {e}");
                    break;
                }
            }
        }
    });
    rx
}

fn setup_terminal() -> anyhow::Result<Term> {
    let mut stdout = std::io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen,)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Term) -> anyhow::Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor().map_err(anyhow::Error::from)
}
