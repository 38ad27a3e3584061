use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(SongId);
string_id!(
    /// Key used by style maps for per-section overrides.
    SectionId
);
string_id!(LineId);

/// Smallest timed unit of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: LineId,
    /// Word texts joined by a single space.
    pub text: String,
    /// Always the first word's start time.
    pub start_time: f64,
    pub words: Vec<Word>,
}

impl Line {
    /// Builds a line from its words, or `None` when there are no words to build from.
    pub fn from_words(words: Vec<Word>) -> Option<Self> {
        let start_time = words.first()?.start_time;
        let text = words
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self {
            id: LineId::generate(),
            text,
            start_time,
            words,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Intro,
    #[default]
    Verse,
    Chorus,
    Bridge,
    Interlude,
    Outro,
    Finale,
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionType::Intro => "intro",
            SectionType::Verse => "verse",
            SectionType::Chorus => "chorus",
            SectionType::Bridge => "bridge",
            SectionType::Interlude => "interlude",
            SectionType::Outro => "outro",
            SectionType::Finale => "finale",
        };
        f.write_str(name)
    }
}

/// A contiguous span of the song, covering `[start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub lines: Vec<Line>,
}

impl Section {
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub duration: f64,
    pub sections: Vec<Section>,
}

impl Song {
    /// A song with no sections, the result of parsing empty or unusable input.
    pub fn empty() -> Self {
        Self {
            id: SongId::generate(),
            title: String::new(),
            artist: None,
            duration: 0.0,
            sections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.sections.iter().map(|section| section.lines.len()).sum()
    }

    pub fn section_index(&self, id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|section| &section.id == id)
    }
}
