//! WebVTT and SubRip rendering of narration segments.

use super::mixer::TimedNarrationSegment;
use super::script::NarrationSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Vtt,
    Srt,
}

impl SubtitleFormat {
    fn separator(self) -> char {
        match self {
            SubtitleFormat::Vtt => '.',
            SubtitleFormat::Srt => ',',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Srt => "srt",
        }
    }
}

/// `HH:MM:SS.mmm` for VTT, `HH:MM:SS,mmm` for SRT.
pub fn format_timestamp(ms: u64, format: SubtitleFormat) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        format.separator(),
        ms % 1000
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry<'a> {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: &'a str,
}

pub fn render(entries: &[SubtitleEntry<'_>], format: SubtitleFormat) -> String {
    let mut lines: Vec<String> = Vec::new();
    if format == SubtitleFormat::Vtt {
        lines.push("WEBVTT".into());
        lines.push(String::new());
    }
    for (i, entry) in entries.iter().enumerate() {
        lines.push(format!(
            "{}\n{} --> {}\n{}\n",
            i + 1,
            format_timestamp(entry.start_ms, format),
            format_timestamp(entry.end_ms, format),
            entry.text
        ));
    }
    lines.join("\n")
}

fn from_raw(segments: &[NarrationSegment]) -> Vec<SubtitleEntry<'_>> {
    segments
        .iter()
        .map(|s| SubtitleEntry {
            start_ms: s.start_ms,
            end_ms: s.end_ms,
            text: &s.text,
        })
        .collect()
}

fn from_timed(segments: &[TimedNarrationSegment]) -> Vec<SubtitleEntry<'_>> {
    segments
        .iter()
        .map(|s| SubtitleEntry {
            start_ms: s.start_ms,
            end_ms: s.end_ms(),
            text: &s.text,
        })
        .collect()
}

pub fn generate_vtt(segments: &[NarrationSegment]) -> String {
    render(&from_raw(segments), SubtitleFormat::Vtt)
}

pub fn generate_srt(segments: &[NarrationSegment]) -> String {
    render(&from_raw(segments), SubtitleFormat::Srt)
}

pub fn generate_vtt_from_timed(segments: &[TimedNarrationSegment]) -> String {
    render(&from_timed(segments), SubtitleFormat::Vtt)
}

pub fn generate_srt_from_timed(segments: &[TimedNarrationSegment]) -> String {
    render(&from_timed(segments), SubtitleFormat::Srt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_use_format_separator() {
        assert_eq!(format_timestamp(3_723_045, SubtitleFormat::Vtt), "01:02:03.045");
        assert_eq!(format_timestamp(3_723_045, SubtitleFormat::Srt), "01:02:03,045");
        assert_eq!(format_timestamp(0, SubtitleFormat::Vtt), "00:00:00.000");
    }

    #[test]
    fn vtt_has_header_and_numbered_cues() {
        let segments = vec![
            NarrationSegment {
                text: "Hello".into(),
                start_ms: 0,
                end_ms: 1500,
            },
            NarrationSegment {
                text: "World".into(),
                start_ms: 2000,
                end_ms: 3000,
            },
        ];
        assert_eq!(
            generate_vtt(&segments),
            "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.500\nHello\n\n2\n00:00:02.000 --> 00:00:03.000\nWorld\n"
        );
    }

    #[test]
    fn srt_from_timed_uses_start_plus_duration() {
        let segments = vec![TimedNarrationSegment {
            text: "Click save".into(),
            start_ms: 4000,
            duration_ms: 2000,
        }];
        assert_eq!(
            generate_srt_from_timed(&segments),
            "1\n00:00:04,000 --> 00:00:06,000\nClick save\n"
        );
        assert!(generate_vtt_from_timed(&[]).starts_with("WEBVTT\n"));
    }
}
