use std::collections::HashMap;

use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

use crate::{config::ThemeColor, style::PresetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnterAnimation {
    FadeUp,
    FadeIn,
    SlideLeft,
    ScaleIn,
    Slam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitAnimation {
    FadeOut,
    FadeUpOut,
    Dissolve,
}

/// How lines look while a preset is active.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    pub color: ThemeColor,
    pub background: ThemeColor,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub uppercase: bool,
    /// Blank cells inserted between glyphs.
    #[serde(default)]
    pub letter_spacing: u16,
    pub enter: EnterAnimation,
    pub exit: ExitAnimation,
    pub max_visible_lines: usize,
    /// Milliseconds.
    pub transition_duration: u64,
}

impl PresetConfig {
    pub fn text_style(&self) -> Style {
        let mut modifiers = Modifier::empty();
        if self.bold {
            modifiers |= Modifier::BOLD;
        }
        if self.italic {
            modifiers |= Modifier::ITALIC;
        }
        Style::default()
            .fg(self.color.0)
            .bg(self.background.0)
            .add_modifier(modifiers)
    }

    /// Applies case transform and letter spacing to a line of lyrics.
    pub fn transform_text(&self, text: &str) -> String {
        let text = if self.uppercase {
            text.to_uppercase()
        } else {
            text.to_owned()
        };
        if self.letter_spacing == 0 {
            return text;
        }
        let gap = " ".repeat(self.letter_spacing as usize);
        let mut spaced = String::with_capacity(text.len() * (1 + gap.len()));
        for (idx, ch) in text.chars().enumerate() {
            if idx > 0 {
                spaced.push_str(&gap);
            }
            spaced.push(ch);
        }
        spaced
    }
}

#[derive(Debug, Clone)]
pub struct StylePreset {
    pub id: PresetId,
    pub name: &'static str,
    pub description: &'static str,
    pub config: PresetConfig,
}

/// Every preset, addressable by [`PresetId`].
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: [StylePreset; 4],
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        Self {
            presets: [
                StylePreset {
                    id: PresetId::CleanSubtitle,
                    name: "Clean Subtitle",
                    description: "Minimal white text on dark background",
                    config: PresetConfig {
                        color: ThemeColor(Color::White),
                        background: ThemeColor(Color::Rgb(0x12, 0x12, 0x12)),
                        bold: false,
                        italic: false,
                        uppercase: false,
                        letter_spacing: 0,
                        enter: EnterAnimation::FadeIn,
                        exit: ExitAnimation::FadeOut,
                        max_visible_lines: 2,
                        transition_duration: 300,
                    },
                },
                StylePreset {
                    id: PresetId::CinematicMinimal,
                    name: "Cinematic Minimal",
                    description: "Thin uppercase text with dark gradients",
                    config: PresetConfig {
                        color: ThemeColor(Color::White),
                        background: ThemeColor(Color::Rgb(0x05, 0x0d, 0x14)),
                        bold: false,
                        italic: false,
                        uppercase: true,
                        letter_spacing: 1,
                        enter: EnterAnimation::FadeUp,
                        exit: ExitAnimation::FadeOut,
                        max_visible_lines: 3,
                        transition_duration: 1200,
                    },
                },
                StylePreset {
                    id: PresetId::BoldImpact,
                    name: "Bold Impact",
                    description: "Massive text that slams onto screen",
                    config: PresetConfig {
                        color: ThemeColor(Color::White),
                        background: ThemeColor(Color::Black),
                        bold: true,
                        italic: false,
                        uppercase: true,
                        letter_spacing: 1,
                        enter: EnterAnimation::Slam,
                        exit: ExitAnimation::FadeOut,
                        max_visible_lines: 2,
                        transition_duration: 300,
                    },
                },
                StylePreset {
                    id: PresetId::ElegantCeremony,
                    name: "Elegant Ceremony",
                    description: "Gold serif text with ornate dark backgrounds",
                    config: PresetConfig {
                        color: ThemeColor(Color::Rgb(0xd4, 0xaf, 0x37)),
                        background: ThemeColor(Color::Rgb(0x07, 0x14, 0x07)),
                        bold: true,
                        italic: false,
                        uppercase: false,
                        letter_spacing: 0,
                        enter: EnterAnimation::FadeUp,
                        exit: ExitAnimation::FadeUpOut,
                        max_visible_lines: 3,
                        transition_duration: 1200,
                    },
                },
            ],
        }
    }

    /// Replaces the configuration of the given presets, keeping names and descriptions.
    pub fn with_overrides(mut self, overrides: &HashMap<PresetId, PresetConfig>) -> Self {
        for (id, config) in overrides {
            self.presets[*id as usize].config = config.clone();
        }
        self
    }

    pub fn get(&self, id: PresetId) -> &StylePreset {
        &self.presets[id as usize]
    }

    pub fn list(&self) -> &[StylePreset] {
        &self.presets
    }

    /// The preset after `id` in catalog order, wrapping around.
    pub fn cycle_next(&self, id: PresetId) -> PresetId {
        self.presets[(id as usize + 1) % self.presets.len()].id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_resolves_to_its_own_preset() {
        let catalog = PresetCatalog::builtin();
        for id in PresetId::ALL {
            assert_eq!(catalog.get(id).id, id);
        }
        assert_eq!(catalog.list().len(), PresetId::ALL.len());
    }

    #[test]
    fn cycles_in_catalog_order() {
        let catalog = PresetCatalog::builtin();
        assert_eq!(
            catalog.cycle_next(PresetId::CleanSubtitle),
            PresetId::CinematicMinimal
        );
        assert_eq!(
            catalog.cycle_next(PresetId::ElegantCeremony),
            PresetId::CleanSubtitle
        );
    }

    #[test]
    fn builtins_keep_their_line_limits() {
        let catalog = PresetCatalog::builtin();
        let limits = PresetId::ALL
            .map(|id| catalog.get(id).config.max_visible_lines)
            .to_vec();
        assert_eq!(limits, vec![2, 3, 2, 3]);
        assert_eq!(catalog.get(PresetId::BoldImpact).config.enter, EnterAnimation::Slam);
    }

    #[test]
    fn overrides_replace_only_the_config() {
        let overrides = toml::from_str::<HashMap<PresetId, PresetConfig>>(
            r##"
            [bold-impact]
            color = "red"
            background = "#101010"
            enter = "fade-in"
            exit = "dissolve"
            max_visible_lines = 4
            transition_duration = 500
            "##,
        )
        .unwrap();
        let catalog = PresetCatalog::builtin().with_overrides(&overrides);
        let preset = catalog.get(PresetId::BoldImpact);
        assert_eq!(preset.name, "Bold Impact");
        assert_eq!(preset.config.color.0, Color::Red);
        assert_eq!(preset.config.background.0, Color::Rgb(0x10, 0x10, 0x10));
        assert_eq!(preset.config.max_visible_lines, 4);
        assert!(!preset.config.bold);
        assert_eq!(
            catalog.get(PresetId::CleanSubtitle).config.max_visible_lines,
            2
        );
    }

    #[test]
    fn transforms_text_for_display() {
        let catalog = PresetCatalog::builtin();
        let cinematic = &catalog.get(PresetId::CinematicMinimal).config;
        assert_eq!(cinematic.transform_text("hey you"), "H E Y   Y O U");
        let clean = &catalog.get(PresetId::CleanSubtitle).config;
        assert_eq!(clean.transform_text("hey you"), "hey you");
    }

    #[test]
    fn text_style_carries_modifiers() {
        let catalog = PresetCatalog::builtin();
        let style = catalog.get(PresetId::ElegantCeremony).config.text_style();
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(style.fg, Some(Color::Rgb(0xd4, 0xaf, 0x37)));
    }
}
