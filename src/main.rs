use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use stanzas::{
    clock::format_time,
    stanzas::{plain_backend::PlainBackend, tui_backend::TerminalUiBackend},
    PlaybackClock, PresetCatalog, PresetId, Project, Session, Song, StanzasConfig,
    StanzasHandler, StyleMap,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play word-timestamped lyric transcripts", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.config/stanzas/config.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a transcript in the terminal.
    Play {
        /// Timestamped transcript to play.
        transcript: PathBuf,
        /// JSON style map to load, and to save preset changes back to.
        #[arg(short, long)]
        style_map: Option<PathBuf>,
        /// Global preset, overriding the configured default.
        #[arg(short, long)]
        preset: Option<PresetId>,
        /// Start position in seconds.
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Print lines as they appear instead of drawing a full screen UI.
        #[arg(long)]
        plain: bool,
    },
    /// Show how a transcript was parsed.
    Inspect {
        transcript: PathBuf,
        /// Print the parsed song as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List available presets.
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = Arc::new(StanzasConfig::load(cli.config.as_deref()).await?);

    match cli.command {
        Commands::Play {
            transcript,
            style_map,
            preset,
            start,
            plain,
        } => run_play(config, &transcript, style_map.as_deref(), preset, start, plain).await,
        Commands::Inspect { transcript, json } => run_inspect(&transcript, json).await,
        Commands::Presets => {
            list_presets(&config);
            Ok(())
        }
    }
}

async fn run_play(
    config: Arc<StanzasConfig>,
    transcript: &Path,
    style_map_path: Option<&Path>,
    preset: Option<PresetId>,
    start: f64,
    plain: bool,
) -> anyhow::Result<()> {
    let text = read_transcript(transcript).await?;

    let mut style_map = match style_map_path {
        Some(path) if path.exists() => StyleMap::load(path).await?,
        _ => StyleMap::new(config.general.default_preset),
    };
    if let Some(preset) = preset {
        style_map = style_map.with_global(preset);
    }

    let mut clock = PlaybackClock::new();
    let mut project = Project::new(style_map);
    let song = project.import_timestamps(&text, &mut clock);
    if song.is_empty() {
        anyhow::bail!("{} has no timestamped lines", transcript.display());
    }
    clock.seek_to(start);

    let catalog = PresetCatalog::builtin().with_overrides(&config.presets);
    let session = Session::new(project, clock, catalog, config.general.seek_step);

    let session = if plain {
        let backend = PlainBackend::new(std::io::stdout(), config.general.clone());
        StanzasHandler::new(backend).run(session, config).await?
    } else {
        let backend = TerminalUiBackend::new(config.general.clone());
        StanzasHandler::new(backend).run(session, config).await?
    };

    if let Some(path) = style_map_path {
        session.project().style_map().save(path).await?;
    }
    Ok(())
}

async fn run_inspect(transcript: &Path, json: bool) -> anyhow::Result<()> {
    let song = stanzas::parse(&read_transcript(transcript).await?);
    if json {
        println!("{}", serde_json::to_string_pretty(&song)?);
    } else {
        print!("{}", describe(&song));
    }
    Ok(())
}

fn describe(song: &Song) -> String {
    let mut out = format!(
        "{} ({}, {} sections, {} lines)\n",
        if song.title.is_empty() { "Untitled" } else { song.title.as_str() },
        format_time(song.duration),
        song.sections.len(),
        song.line_count()
    );
    for (idx, section) in song.sections.iter().enumerate() {
        out.push_str(&format!(
            "\n#{} {} {:.3}-{:.3}\n",
            idx + 1,
            section.section_type,
            section.start_time,
            section.end_time
        ));
        for line in &section.lines {
            out.push_str(&format!("  [{:.3}] {}\n", line.start_time, line.text));
        }
    }
    out
}

fn list_presets(config: &StanzasConfig) {
    let catalog = PresetCatalog::builtin().with_overrides(&config.presets);
    for preset in catalog.list() {
        let marker = if preset.id == config.general.default_preset {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<18} {:<18} {} (up to {} lines)",
            preset.id.as_str(),
            preset.name,
            preset.description,
            preset.config.max_visible_lines
        );
    }
}

async fn read_transcript(path: &Path) -> anyhow::Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading transcript {}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "read transcript");
    Ok(text)
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        // stderr shares the terminal with the UI, so keep it quiet unless asked
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter("warn"))
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
