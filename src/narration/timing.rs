use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::spec::{Chapter, narrated_steps};

/// Words per second assumed when no real audio duration is available.
const WORDS_PER_SECOND: f64 = 2.5;
const MIN_ESTIMATE_MS: u64 = 800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationTimingEntry {
    pub text: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

/// Flattened step index -> narration timing. Only narrated steps have keys.
pub type NarrationTimingMap = BTreeMap<usize, NarrationTimingEntry>;

/// Heuristic spoken length of `text`.
pub fn estimate_duration_ms(text: &str) -> u64 {
    let words = text.split_whitespace().count() as f64;
    let ms = (words / WORDS_PER_SECOND * 1000.0).round() as u64;
    ms.max(MIN_ESTIMATE_MS)
}

/// Estimate-only timing for every narrated step.
pub fn build_estimated_timing(chapters: &[Chapter]) -> NarrationTimingMap {
    narrated_steps(chapters)
        .map(|n| {
            (
                n.index,
                NarrationTimingEntry {
                    text: n.text.to_string(),
                    duration_ms: estimate_duration_ms(n.text),
                    audio_path: None,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Action, Step};

    #[test]
    fn estimate_uses_word_rate_with_floor() {
        assert_eq!(estimate_duration_ms("Hi"), 800);
        assert_eq!(estimate_duration_ms("one two three four five"), 2000);
        assert_eq!(estimate_duration_ms(""), 800);
    }

    #[test]
    fn estimated_keys_are_exactly_the_narrated_indices() {
        let chapters = vec![
            Chapter {
                title: "A".into(),
                narration: None,
                steps: vec![
                    Step::new(Action::Back),
                    Step::new(Action::Click)
                        .with_selector("#a")
                        .with_narration("Click it."),
                ],
            },
            Chapter {
                title: "B".into(),
                narration: None,
                steps: vec![
                    Step::new(Action::Forward).with_narration(""),
                    Step::new(Action::Back).with_narration("Go back now."),
                ],
            },
        ];
        let timing = build_estimated_timing(&chapters);
        assert_eq!(timing.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert!(timing.values().all(|e| e.audio_path.is_none()));
        assert_eq!(timing[&3].text, "Go back now.");
    }
}
