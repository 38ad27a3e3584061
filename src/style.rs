//! Style maps and the active section / preset resolver.
//!
//! Both resolver functions are pure. Callers re-run them whenever the playback time,
//! the song or the style map changes instead of caching their results.

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use anyhow::Context;
use serde::{de::Visitor, Deserialize, Serialize};
use tracing::info;

use crate::song::{Section, SectionId, Song};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PresetId {
    CleanSubtitle,
    CinematicMinimal,
    BoldImpact,
    ElegantCeremony,
}

impl PresetId {
    pub const ALL: [PresetId; 4] = [
        PresetId::CleanSubtitle,
        PresetId::CinematicMinimal,
        PresetId::BoldImpact,
        PresetId::ElegantCeremony,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetId::CleanSubtitle => "clean-subtitle",
            PresetId::CinematicMinimal => "cinematic-minimal",
            PresetId::BoldImpact => "bold-impact",
            PresetId::ElegantCeremony => "elegant-ceremony",
        }
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PresetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// Preset ids show up as map keys in config files, so they go through `deserialize_str`.
impl<'de> Deserialize<'de> for PresetId {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        de.deserialize_str(PresetIdVisitor)
    }
}

struct PresetIdVisitor;

impl<'v> Visitor<'v> for PresetIdVisitor {
    type Value = PresetId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a preset id such as `clean-subtitle`")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse::<PresetId>()
            .map_err(|e| serde::de::Error::custom(format!("Invalid preset: {e}")))
    }
}

impl FromStr for PresetId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown preset `{s}`"))
    }
}

/// A default preset plus per-section overrides.
///
/// Never mutated in place: every change produces a new map, so a reader holding the old one
/// keeps a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMap {
    pub global: PresetId,
    #[serde(default)]
    pub sections: HashMap<SectionId, PresetId>,
}

impl Default for StyleMap {
    fn default() -> Self {
        Self::new(PresetId::ElegantCeremony)
    }
}

impl StyleMap {
    pub fn new(global: PresetId) -> Self {
        Self {
            global,
            sections: HashMap::new(),
        }
    }

    pub fn with_global(&self, global: PresetId) -> Self {
        Self {
            global,
            sections: self.sections.clone(),
        }
    }

    pub fn with_section(&self, section: SectionId, preset: PresetId) -> Self {
        let mut sections = self.sections.clone();
        sections.insert(section, preset);
        Self {
            global: self.global,
            sections,
        }
    }

    pub fn without_section(&self, section: &SectionId) -> Self {
        let sections = self
            .sections
            .iter()
            .filter(|(id, _)| *id != section)
            .map(|(id, preset)| (id.clone(), *preset))
            .collect();
        Self {
            global: self.global,
            sections,
        }
    }

    pub fn override_for(&self, section: &SectionId) -> Option<PresetId> {
        self.sections.get(section).copied()
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading style map {}", path.display()))?;
        let map = serde_json::from_str::<StyleMap>(&raw)
            .with_context(|| format!("decoding style map {}", path.display()))?;
        info!(path = %path.display(), overrides = map.sections.len(), "loaded style map");
        Ok(map)
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, raw)
            .await
            .with_context(|| format!("writing style map {}", path.display()))?;
        info!(path = %path.display(), overrides = self.sections.len(), "saved style map");
        Ok(())
    }
}

/// The section whose `[start_time, end_time)` holds `time`, if any.
pub fn active_section(sections: &[Section], time: f64) -> Option<&Section> {
    sections.iter().find(|section| section.contains(time))
}

pub fn active_section_in(song: Option<&Song>, time: f64) -> Option<&Section> {
    song.and_then(|song| active_section(&song.sections, time))
}

/// The active section's override, or the global preset when there is none.
pub fn resolve_preset(style_map: &StyleMap, section: Option<&Section>) -> PresetId {
    section
        .and_then(|section| style_map.override_for(&section.id))
        .unwrap_or(style_map.global)
}
