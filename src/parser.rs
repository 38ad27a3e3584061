//! Parser for word-level timestamp transcripts.
//!
//! The input is line oriented:
//!
//! ```text
//! [00:11.162] [Title: Semurni Lebaran 3]
//! [00:11.162] Sembah [00:11.392] berlalu [00:11.776] ramadhan [00:15.083] suci
//! [00:15.776] Berkah [00:16.314] amalan  ← (also: [00:16.900] amal)
//!
//! [00:46.515] Jari [00:47.137] disusun
//! ```
//!
//! Every `[MM:SS.mmm] word` pair becomes a [`Word`], every physical line with at least one
//! such pair becomes a [`Line`], and blank lines split the transcript into [`Section`]s.
//! `[Title: ...]` lines set the song title and `← (...)` annotations are dropped.
//!
//! Parsing never fails. Anything that does not look like a timed word is skipped, so the
//! worst possible outcome is a song without sections.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::song::{Line, Section, SectionId, SectionType, Song, Word};

/// Seconds appended after the last word onset to close the final section.
pub const TAIL_PADDING: f64 = 5.0;

lazy_static! {
    static ref ANNOTATION: Regex = Regex::new(r"\s*←\s*\(.*?\)\s*$").unwrap();
    static ref TITLE: Regex = Regex::new(r"\[Title:\s*(.+?)\]").unwrap();
    static ref TIMED_WORD: Regex = Regex::new(r"\[(\d+:\d+\.\d+)\]\s+(\S+)").unwrap();
    static ref TIMESTAMP: Regex = Regex::new(r"(\d+):(\d+)\.(\d+)").unwrap();
}

/// Converts `MM:SS.mmm` to seconds. Fields are plain integers, so `00:75.000` is 75 seconds
/// and `00:01.5` is 1.005 seconds. Anything unreadable counts as zero.
pub fn parse_timestamp(timestamp: &str) -> f64 {
    let Some(captures) = TIMESTAMP.captures(timestamp) else {
        return 0.0;
    };
    let field = |idx: usize| captures[idx].parse::<u64>().ok();
    match (field(1), field(2), field(3)) {
        (Some(minutes), Some(seconds), Some(millis)) => {
            minutes as f64 * 60.0 + seconds as f64 + millis as f64 / 1000.0
        }
        _ => 0.0,
    }
}

/// Removes a trailing `← (...)` annotation and surrounding whitespace.
pub fn strip_annotation(line: &str) -> &str {
    match ANNOTATION.find(line) {
        Some(found) => line[..found.start()].trim(),
        None => line.trim(),
    }
}

/// Returns the title carried by a `[Title: ...]` marker, if the line has one.
pub fn title_marker(line: &str) -> Option<&str> {
    TITLE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|title| title.as_str().trim())
}

/// Extracts every timed word of a single physical line, left to right.
pub fn timed_words(line: &str) -> Vec<Word> {
    TIMED_WORD
        .captures_iter(line)
        .map(|captures| Word {
            text: captures[2].to_owned(),
            start_time: parse_timestamp(&captures[1]),
        })
        .collect()
}

/// Parses a full transcript into a [`Song`].
pub fn parse(input: &str) -> Song {
    let mut song = Song::empty();
    if input.trim().is_empty() {
        return song;
    }

    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in input.split('\n') {
        let cleaned = strip_annotation(raw);

        if cleaned.is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(title) = title_marker(cleaned) {
            song.title = title.to_owned();
            continue;
        }

        current.push(cleaned);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut last_timestamp = 0.0_f64;

    for group in groups {
        let mut lines = Vec::with_capacity(group.len());
        for text in group {
            let words = timed_words(text);
            for word in &words {
                last_timestamp = last_timestamp.max(word.start_time);
            }
            match Line::from_words(words) {
                Some(line) => lines.push(line),
                None => trace!(line = text, "dropping line without timed words"),
            }
        }

        let Some(first) = lines.first() else {
            continue;
        };
        song.sections.push(Section {
            id: SectionId::generate(),
            section_type: SectionType::Verse,
            label: None,
            start_time: first.start_time,
            end_time: 0.0,
            lines,
        });
    }

    let end = last_timestamp + TAIL_PADDING;
    for idx in 0..song.sections.len() {
        let end_time = match song.sections.get(idx + 1) {
            Some(next) => next.start_time,
            None => end,
        };
        song.sections[idx].end_time = end_time;
    }
    song.duration = end;

    debug!(
        title = %song.title,
        sections = song.sections.len(),
        lines = song.line_count(),
        duration = song.duration,
        "parsed transcript"
    );
    song
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parses_a_single_line() {
        let song =
            parse("[00:11.162] Sembah [00:11.392] berlalu [00:11.776] ramadhan [00:15.083] suci");
        assert_eq!(song.sections.len(), 1);
        assert_eq!(song.sections[0].lines.len(), 1);
        let line = &song.sections[0].lines[0];
        assert_eq!(line.text, "Sembah berlalu ramadhan suci");
        assert_eq!(line.words.len(), 4);
        assert_eq!(
            line.words[0],
            Word {
                text: "Sembah".to_owned(),
                start_time: 11.162
            }
        );
        assert_eq!(line.words[3].text, "suci");
        assert_eq!(line.words[3].start_time, 15.083);
        assert_eq!(line.start_time, 11.162);
    }

    #[test]
    fn consecutive_lines_share_a_section() {
        let song = parse(
            "[00:11.162] Sembah [00:11.392] berlalu [00:11.776] ramadhan [00:15.083] suci\n\
             [00:15.776] Berkah [00:16.314] amalan [00:16.776] meruntun [00:17.315] jiwa",
        );
        assert_eq!(song.sections.len(), 1);
        assert_eq!(song.sections[0].lines.len(), 2);
        assert_eq!(song.sections[0].lines[1].text, "Berkah amalan meruntun jiwa");
    }

    #[test]
    fn blank_lines_split_sections() {
        let song = parse(
            "[00:11.162] Sembah [00:11.392] berlalu\n\
             [00:12.000] lagi\n\
             \n\
             [00:46.515] Jari [00:47.137] disusun",
        );
        assert_eq!(song.sections.len(), 2);
        assert_eq!(song.sections[0].lines.len(), 2);
        assert_eq!(song.sections[1].lines.len(), 1);
    }

    #[test]
    fn repeated_and_leading_blank_lines_never_create_empty_sections() {
        let song = parse("\n\n   \n[00:01.000] a\n\n\n\t\n[00:02.000] b\n\n");
        assert_eq!(song.sections.len(), 2);
        assert!(song.sections.iter().all(|section| !section.lines.is_empty()));
    }

    #[test]
    fn strips_annotations() {
        let song = parse("[02:26.650] Buat [02:27.033] insan  ← (also: [02:30.361] telah)");
        let line = &song.sections[0].lines[0];
        assert_eq!(line.text, "Buat insan");
        assert_eq!(line.words.len(), 2);
    }

    #[test]
    fn annotation_only_line_acts_as_separator() {
        let song = parse("[00:01.000] a\n← (truncated [00:02.000] b)\n[00:03.000] c");
        assert_eq!(song.sections.len(), 2);
        assert_eq!(song.line_count(), 2);
    }

    #[test]
    fn title_lines_are_metadata_only() {
        let song = parse(
            "[00:11.162] [Title: Semurni Lebaran 3]\n\
             [00:11.162] Sembah [00:11.392] berlalu",
        );
        assert_eq!(song.title, "Semurni Lebaran 3");
        assert_eq!(song.sections.len(), 1);
        assert_eq!(song.sections[0].lines.len(), 1);
        assert_eq!(song.sections[0].lines[0].text, "Sembah berlalu");
    }

    #[test]
    fn last_title_wins() {
        let song = parse("[Title: First]\n[00:01.000] a\n[00:00.000] [Title:  Second ]");
        assert_eq!(song.title, "Second");
        assert_eq!(song.line_count(), 1);
    }

    #[test]
    fn lines_without_timed_words_are_dropped() {
        let song = parse("just some text\n[00:01.000] a\n[bad] token");
        assert_eq!(song.sections.len(), 1);
        assert_eq!(song.sections[0].lines.len(), 1);
    }

    #[test]
    fn groups_without_timed_words_are_dropped() {
        let song = parse("no words here\n\n[00:04.000] a\n\nnor here");
        assert_eq!(song.sections.len(), 1);
        assert_eq!(song.sections[0].start_time, 4.0);
        assert!(close(song.duration, 9.0));
    }

    #[test]
    fn empty_and_whitespace_input_yield_an_empty_song() {
        for input in ["", "   ", "\n\n", " \t \n  "] {
            let song = parse(input);
            assert!(song.sections.is_empty());
            assert_eq!(song.title, "");
            assert_eq!(song.duration, 0.0);
        }
    }

    #[test]
    fn input_without_words_still_reports_zero_sections() {
        let song = parse("[Title: Only Title]\nsome prose");
        assert!(song.is_empty());
        assert_eq!(song.title, "Only Title");
    }

    #[test]
    fn computes_section_boundaries() {
        let song = parse(
            "[00:11.162] Sembah [00:15.083] suci\n\
             [00:15.776] Berkah [00:17.315] jiwa\n\
             \n\
             [00:46.515] Jari [00:48.852] dipohon",
        );
        assert_eq!(song.sections[0].start_time, 11.162);
        assert_eq!(song.sections[0].end_time, 46.515);
        assert_eq!(song.sections[1].start_time, 46.515);
        assert!(close(song.sections[1].end_time, 53.852));
        assert!(close(song.duration, 53.852));
    }

    #[test]
    fn final_section_ends_after_the_latest_word_anywhere() {
        // the latest onset sits in the first section
        let song = parse("[00:30.000] late\n\n[00:10.000] early");
        assert_eq!(song.sections.len(), 2);
        assert_eq!(song.sections[0].end_time, 10.0);
        assert!(close(song.sections[1].end_time, 35.0));
        assert!(close(song.duration, 35.0));
    }

    #[test]
    fn adjacent_sections_touch() {
        let song = parse("[00:01.000] a\n\n[00:02.000] b\n\n[00:03.500] c [00:04.000] d");
        for pair in song.sections.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        assert_eq!(song.sections.last().unwrap().end_time, song.duration);
    }

    #[test]
    fn converts_timestamps_to_seconds() {
        assert!(close(parse_timestamp("01:03.542"), 63.542));
        let song = parse("[01:03.542] Buat [01:03.932] insan");
        assert!(close(song.sections[0].lines[0].words[0].start_time, 63.542));
    }

    #[test]
    fn timestamp_fields_are_taken_literally() {
        assert!(close(parse_timestamp("00:75.000"), 75.0));
        assert!(close(parse_timestamp("02:00.5"), 120.005));
        assert_eq!(parse_timestamp("garbage"), 0.0);
        assert_eq!(parse_timestamp("99999999999999999999999:00.000"), 0.0);
    }

    #[test]
    fn word_text_is_one_run_of_non_whitespace() {
        let words = timed_words("[00:01.000] don't, [00:02.000]   (oh) trailing");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "don't,");
        assert_eq!(words[1].text, "(oh)");
    }

    #[test]
    fn timestamp_must_be_followed_by_whitespace() {
        assert!(timed_words("[00:01.000]glued").is_empty());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let song = parse("[00:01.000] a\r\n\r\n[00:02.000] b\r\n");
        assert_eq!(song.sections.len(), 2);
        assert_eq!(song.sections[0].lines[0].text, "a");
    }

    #[test]
    fn every_line_starts_with_its_first_word() {
        let song = parse("[00:01.000] one [00:01.500] two\n[00:03.000] three\n\n[00:05.000] four");
        for line in song.sections.iter().flat_map(|section| &section.lines) {
            assert_eq!(line.start_time, line.words[0].start_time);
            let joined = line
                .words
                .iter()
                .map(|word| word.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            assert_eq!(line.text, joined);
        }
    }
}
