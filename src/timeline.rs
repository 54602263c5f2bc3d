//! Turns a finished event log into render segments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::playback::ActionEvent;
use crate::spec::{DemoSpec, Resolution};

const INTRO_DURATION_MS: u64 = 2000;
const CHAPTER_TITLE_DURATION_MS: u64 = 1500;
const CALLOUT_DURATION_MS: u64 = 1500;
const OUTRO_DURATION_MS: u64 = 2000;
const CALLOUT_PADDING: f64 = 40.0;

/// Gaps longer than this between two actions are fast-forwarded.
pub const DEAD_TIME_THRESHOLD_MS: u64 = 3000;
pub const DEAD_TIME_SPEED_FACTOR: f64 = 3.0;

pub const OUTRO_LABEL: &str = "Thanks for watching";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Intro,
    Chapter,
    Content,
    Callout,
    Outro,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

/// Times are relative to the first recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(rename = "type")]
    pub kind: SegmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<ZoomRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f64>,
}

impl Segment {
    fn span(kind: SegmentType, start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            kind,
            label: None,
            zoom: None,
            speed_factor: None,
        }
    }

    fn labeled(kind: SegmentType, start_ms: u64, end_ms: u64, label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::span(kind, start_ms, end_ms)
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub segments: Vec<Segment>,
    pub total_duration_ms: u64,
    pub resolution: Resolution,
}

impl Timeline {
    pub fn segments_of(&self, kind: SegmentType) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.kind == kind)
    }
}

/// Epoch ms that maps to 0 on the timeline: the first recorded action.
/// Narration clips and subtitles are placed against the same origin.
pub fn video_start(events: &[ActionEvent]) -> Option<u64> {
    events.first().map(|e| e.timestamp)
}

pub fn build_timeline(events: &[ActionEvent], spec: &DemoSpec) -> Timeline {
    let resolution = spec.meta.resolution;
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Timeline {
            segments: Vec::new(),
            total_duration_ms: 0,
            resolution,
        };
    };

    let t0 = first.timestamp;
    let rel = |ts: u64| ts.saturating_sub(t0);
    let total = rel(last.end());

    let mut segments = vec![Segment::labeled(
        SegmentType::Intro,
        0,
        INTRO_DURATION_MS,
        &spec.meta.title,
    )];

    let mut index = 0;
    'chapters: for chapter in &spec.chapters {
        let Some(chapter_first) = events.get(index) else {
            break;
        };
        let start = rel(chapter_first.timestamp);
        segments.push(Segment::labeled(
            SegmentType::Chapter,
            start,
            start + CHAPTER_TITLE_DURATION_MS,
            &chapter.title,
        ));

        for _ in &chapter.steps {
            let Some(event) = events.get(index) else {
                break 'chapters;
            };
            let start = rel(event.timestamp);

            let mut content = Segment::span(SegmentType::Content, start, start + event.duration);
            if let Some(prev) = index.checked_sub(1).and_then(|i| events.get(i))
                && event.timestamp.saturating_sub(prev.end()) > DEAD_TIME_THRESHOLD_MS
            {
                content.speed_factor = Some(DEAD_TIME_SPEED_FACTOR);
            }
            segments.push(content);

            if event.action == "click"
                && let Some(b) = event.bounding_box
            {
                segments.push(Segment {
                    zoom: Some(ZoomRegion {
                        x: b.x,
                        y: b.y,
                        width: b.width,
                        height: b.height,
                        padding: CALLOUT_PADDING,
                    }),
                    ..Segment::span(SegmentType::Callout, start, start + CALLOUT_DURATION_MS)
                });
            }
            index += 1;
        }
    }

    segments.push(Segment::labeled(
        SegmentType::Outro,
        total.saturating_sub(OUTRO_DURATION_MS),
        total,
        OUTRO_LABEL,
    ));

    Timeline {
        segments,
        total_duration_ms: total,
        resolution,
    }
}

/// Lengthens the timeline so it is at least `narration_total_ms` long.
///
/// The outro is re-anchored to the new end and the last content segment is
/// held until the outro begins. A timeline already long enough is returned
/// unchanged.
pub fn extend_timeline_for_narration(timeline: &Timeline, narration_total_ms: u64) -> Timeline {
    let mut extended = timeline.clone();
    if narration_total_ms <= timeline.total_duration_ms {
        return extended;
    }

    let new_total = narration_total_ms;
    let outro_start = new_total.saturating_sub(OUTRO_DURATION_MS);
    extended.total_duration_ms = new_total;

    if let Some(outro) = extended
        .segments
        .iter_mut()
        .rev()
        .find(|s| s.kind == SegmentType::Outro)
    {
        outro.start_ms = outro_start;
        outro.end_ms = new_total;
    }

    if let Some(content) = extended
        .segments
        .iter_mut()
        .rev()
        .find(|s| s.kind == SegmentType::Content)
        && content.end_ms < outro_start
    {
        content.end_ms = outro_start;
    }

    extended
}

pub fn write_timeline(timeline: &Timeline, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(timeline)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
