//! Places narration clips on one audio track.
//!
//! Each clip is scheduled to finish as its action starts, then pushed later
//! where needed so that no two clips overlap. Narration is never dropped or
//! truncated; dense narration may finish after its action.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::script::NarrationSegment;
use super::toolchain::{AudioToolchain, MixInput, ToolError};
use super::tts::{TtsError, TtsOptions, TtsProvider};

/// Minimum silence between consecutive clips.
pub const GAP_MS: u64 = 200;

pub const NARRATION_WAV: &str = "narration.wav";
const TMP_DIR: &str = ".narration-tmp";

#[derive(Debug, thiserror::Error)]
pub enum MixError {
    #[error("narration synthesis failed for segment {index}: {source}")]
    Synthesis {
        index: usize,
        #[source]
        source: TtsError,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("failed to write narration audio {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MixError + '_ {
    move |source| MixError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A clip as placed on the mixed track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedNarrationSegment {
    pub text: String,
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl TimedNarrationSegment {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationMixResult {
    pub audio_path: PathBuf,
    pub segments: Vec<TimedNarrationSegment>,
    pub total_duration_ms: u64,
}

/// Audio already on disk with a known duration, e.g. from pre-synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreSynthesizedClip {
    pub text: String,
    /// When the narrated action happens, relative to video start.
    pub action_ms: u64,
    pub duration_ms: u64,
    pub audio_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledClip {
    pub text: String,
    pub path: PathBuf,
    pub action_ms: u64,
    pub duration_ms: u64,
    pub start_ms: u64,
}

impl ScheduledClip {
    pub fn new(text: String, path: PathBuf, action_ms: u64, duration_ms: u64) -> Self {
        Self {
            text,
            path,
            action_ms,
            duration_ms,
            start_ms: action_ms,
        }
    }

    fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// Lead-in placement followed by the forward no-overlap pass.
pub fn schedule_clips(clips: &mut [ScheduledClip]) {
    for (i, clip) in clips.iter_mut().enumerate() {
        clip.start_ms = clip.action_ms.saturating_sub(clip.duration_ms);
        debug!(
            segment = i + 1,
            action_ms = clip.action_ms,
            duration_ms = clip.duration_ms,
            start_ms = clip.start_ms,
            "placed narration clip"
        );
    }

    for i in 1..clips.len() {
        let earliest = clips[i - 1].end_ms() + GAP_MS;
        if clips[i].start_ms < earliest {
            debug!(
                segment = i + 1,
                from_ms = clips[i].start_ms,
                to_ms = earliest,
                "pushed narration clip to avoid overlap"
            );
            clips[i].start_ms = earliest;
        }
    }
}

pub fn narration_total_ms(clips: &[ScheduledClip]) -> u64 {
    clips.last().map(ScheduledClip::end_ms).unwrap_or(0)
}

/// Synthesizes every segment, then schedules and mixes them into
/// `<output_dir>/narration.wav`. `None` when there is nothing to say.
pub async fn mix_narration_audio(
    segments: &[NarrationSegment],
    provider: &dyn TtsProvider,
    options: &TtsOptions,
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> Result<Option<NarrationMixResult>, MixError> {
    if segments.is_empty() {
        info!("no narration segments found, skipping TTS");
        return Ok(None);
    }

    let tmp_dir = output_dir.join(TMP_DIR);
    tokio::fs::create_dir_all(&tmp_dir)
        .await
        .map_err(io_err(&tmp_dir))?;

    let result = synthesize_and_mix(segments, provider, options, toolchain, &tmp_dir, output_dir).await;

    if let Err(e) = tokio::fs::remove_dir_all(&tmp_dir).await {
        warn!(path = %tmp_dir.display(), error = %e, "failed to remove narration temp dir");
    }
    result.map(Some)
}

async fn synthesize_and_mix(
    segments: &[NarrationSegment],
    provider: &dyn TtsProvider,
    options: &TtsOptions,
    toolchain: &dyn AudioToolchain,
    tmp_dir: &Path,
    output_dir: &Path,
) -> Result<NarrationMixResult, MixError> {
    let mut clips = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let preview: String = segment.text.chars().take(40).collect();
        info!(
            provider = provider.name(),
            "synthesizing segment {}/{}: \"{preview}...\"",
            index + 1,
            segments.len()
        );
        let audio = provider
            .synthesize(&segment.text, options)
            .await
            .map_err(|source| MixError::Synthesis { index, source })?;

        let path = tmp_dir.join(format!("seg-{index}.audio"));
        tokio::fs::write(&path, audio).await.map_err(io_err(&path))?;
        let duration_ms = toolchain.probe_duration_ms(&path).await?;
        clips.push(ScheduledClip::new(
            segment.text.clone(),
            path,
            segment.start_ms,
            duration_ms,
        ));
    }

    render_track(clips, toolchain, output_dir).await
}

/// Mixes clips whose durations are already known. `None` when `clips` is
/// empty.
pub async fn mix_presynthesized(
    clips: &[PreSynthesizedClip],
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> Result<Option<NarrationMixResult>, MixError> {
    if clips.is_empty() {
        return Ok(None);
    }
    let scheduled = clips
        .iter()
        .map(|c| {
            ScheduledClip::new(
                c.text.clone(),
                c.audio_path.clone(),
                c.action_ms,
                c.duration_ms,
            )
        })
        .collect();
    render_track(scheduled, toolchain, output_dir).await.map(Some)
}

async fn render_track(
    mut clips: Vec<ScheduledClip>,
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> Result<NarrationMixResult, MixError> {
    schedule_clips(&mut clips);
    let audio_path = output_dir.join(NARRATION_WAV);

    if let [only] = clips.as_slice() {
        tokio::fs::copy(&only.path, &audio_path)
            .await
            .map_err(io_err(&audio_path))?;
    } else {
        let inputs: Vec<MixInput> = clips
            .iter()
            .map(|c| MixInput {
                path: c.path.clone(),
                offset_ms: c.start_ms,
            })
            .collect();
        toolchain.mix(&inputs, &audio_path).await?;
    }

    let total_duration_ms = narration_total_ms(&clips);
    info!(
        clips = clips.len(),
        total_duration_ms,
        path = %audio_path.display(),
        "narration mixed"
    );
    Ok(NarrationMixResult {
        audio_path,
        segments: clips
            .into_iter()
            .map(|c| TimedNarrationSegment {
                text: c.text,
                start_ms: c.start_ms,
                duration_ms: c.duration_ms,
            })
            .collect(),
        total_duration_ms,
    })
}
