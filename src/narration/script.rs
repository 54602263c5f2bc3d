use serde::{Deserialize, Serialize};

use crate::playback::ActionEvent;
use crate::spec::{Chapter, narrated_steps};
use crate::timeline::video_start;

/// Placement used for narrated steps that never produced an event.
pub const DEFAULT_STEP_DURATION_MS: u64 = 3000;

/// Narration text anchored to the action it describes, relative to video
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// One segment per narrated step, matched to the event at the same flattened
/// index. `t0` defaults to the first event's timestamp.
pub fn generate_script(
    chapters: &[Chapter],
    events: &[ActionEvent],
    t0: Option<u64>,
) -> Vec<NarrationSegment> {
    let t0 = t0.or_else(|| video_start(events)).unwrap_or(0);

    narrated_steps(chapters)
        .map(|n| {
            let (start_ms, end_ms) = match events.get(n.index) {
                Some(event) => (
                    event.timestamp.saturating_sub(t0),
                    event.end().saturating_sub(t0),
                ),
                None => {
                    let start = n.index as u64 * DEFAULT_STEP_DURATION_MS;
                    (start, start + DEFAULT_STEP_DURATION_MS)
                }
            };
            NarrationSegment {
                text: n.text.to_string(),
                start_ms,
                end_ms,
            }
        })
        .collect()
}
