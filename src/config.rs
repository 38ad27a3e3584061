use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use home::home_dir;
use ratatui::{style::Color, widgets::BorderType};
use serde::{
    de::{DeserializeOwned, Visitor},
    Deserialize,
};
use tracing::{debug, info};

use crate::{preset::PresetConfig, style::PresetId};

/// Shipped configuration, used when the user has none.
pub const DEFAULT_CONFIG: &str = include_str!("../assets/config.toml");

#[derive(Debug, Clone)]
pub struct StanzasConfig {
    pub general: GeneralConfiguration,
    pub theme: ThemeConfiguration,
    pub presets: HashMap<PresetId, PresetConfig>,
}

impl StanzasConfig {
    /// Parses a config, resolving `include` links relative to `base_dir`.
    pub async fn read_from_str(str: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let unresolved = toml::from_str::<StanzasConfigUnresolved>(str)?;
        let general = unresolved.general.resolve(base_dir).await?;
        let theme = unresolved.theme.resolve(base_dir).await?;
        let presets = match unresolved.presets {
            Some(presets) => presets.resolve(base_dir).await?,
            None => HashMap::new(),
        };
        Ok(Self {
            general,
            theme,
            presets,
        })
    }

    /// Loads `path`, or the user config file, or the shipped defaults, in that order.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => config_dir()
                .map(|dir| dir.join("config.toml"))
                .filter(|path| path.exists()),
        };
        let Some(path) = path else {
            debug!("no config file found, using defaults");
            return Self::bundled();
        };

        let str = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let config = Self::read_from_str(&str, base_dir)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// The shipped defaults, without touching the filesystem.
    pub fn bundled() -> anyhow::Result<Self> {
        let unresolved = toml::from_str::<StanzasConfigUnresolved>(DEFAULT_CONFIG)?;
        let (Some(general), Some(theme)) =
            (unresolved.general.explicit(), unresolved.theme.explicit())
        else {
            anyhow::bail!("bundled config must not use includes");
        };
        Ok(Self {
            general,
            theme,
            presets: HashMap::new(),
        })
    }
}

/// `$HOME/.config/stanzas`.
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config").join("stanzas"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfiguration {
    pub frame_rate: u32,
    pub seek_step: f64,
    pub clear_transition_ms: u64,
    pub default_preset: PresetId,
    pub romanize_unicode: bool,
    pub romanize_exclude: Vec<String>,
    pub display: DisplayConfig,
}

impl GeneralConfiguration {
    /// Transliterates `text` to ASCII when enabled, leaving excluded words alone.
    pub fn romanize(&self, text: &str) -> String {
        if !self.romanize_unicode {
            return text.to_owned();
        }
        text.split_whitespace()
            .map(|word| {
                if self.romanize_exclude.iter().any(|it| it == word) {
                    word.to_owned()
                } else {
                    deunicode::deunicode(word)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub show_header: bool,
    pub header_format: String,
    pub show_section: bool,
    pub section_format: String,
    pub progress_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeConfiguration {
    pub borders: ThemeBorders,
    pub progress_bar: ThemeProgress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeBorders {
    pub border_color: ThemeColor,
    pub border_text_color: ThemeColor,
    pub border_style: BorderStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeProgress {
    pub color: ThemeColor,
    pub is_percentage: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[repr(transparent)]
pub struct ThemeColor(pub Color);

impl<'de> Deserialize<'de> for ThemeColor {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        de.deserialize_str(ColorVisitor)
    }
}

struct ColorVisitor;

impl<'v> Visitor<'v> for ColorVisitor {
    type Value = ThemeColor;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a string representing a color")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        if let Some(stripped) = v.strip_prefix('#') {
            let color_rgb = u32::from_str_radix(stripped, 16).map_err(|e| {
                serde::de::Error::custom(format!("Invalid hex string for color {e}"))
            })?;
            let r = (color_rgb & 0xFF0000) >> 16;
            let g = (color_rgb & 0x00FF00) >> 8;
            let b = color_rgb & 0x0000FF;
            Ok(ThemeColor(Color::Rgb(r as u8, g as u8, b as u8)))
        } else {
            v.parse::<Color>()
                .map_err(|e| serde::de::Error::custom(format!("Invalid named color format {e}")))
                .map(ThemeColor)
        }
    }
}

#[derive(Debug, Clone)]
#[repr(transparent)]
pub struct BorderStyle(pub BorderType);

impl<'de> Deserialize<'de> for BorderStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(BorderVisitor).map(BorderStyle)
    }
}

struct BorderVisitor;

impl<'v> Visitor<'v> for BorderVisitor {
    type Value = BorderType;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a string representing a border style")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse::<BorderType>()
            .map_err(|e| serde::de::Error::custom(format!("Invalid border style: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StanzasConfigUnresolved {
    general: MaybeLink<GeneralConfiguration>,
    theme: MaybeLink<ThemeConfiguration>,
    #[serde(default)]
    presets: Option<MaybeLink<HashMap<PresetId, PresetConfig>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeLink<V> {
    Explicit(V),
    Link { include: PathBuf },
}

impl<V: DeserializeOwned> MaybeLink<V> {
    async fn resolve(self, base_dir: &Path) -> anyhow::Result<V> {
        match self {
            MaybeLink::Explicit(value) => Ok(value),
            MaybeLink::Link { include } => {
                let path = base_dir.join(include);
                debug!(path = %path.display(), "resolving config include");
                let str = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading config include {}", path.display()))?;
                toml::from_str(&str).map_err(anyhow::Error::from)
            }
        }
    }

    fn explicit(self) -> Option<V> {
        match self {
            MaybeLink::Explicit(value) => Some(value),
            MaybeLink::Link { .. } => None,
        }
    }
}
