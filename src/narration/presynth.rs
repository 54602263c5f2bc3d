//! Synthesizes narration before playback purely to learn exact durations.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::timing::{NarrationTimingEntry, NarrationTimingMap, estimate_duration_ms};
use super::toolchain::AudioToolchain;
use super::tts::{TtsOptions, TtsProvider};
use super::wav::wav_duration_ms;
use crate::spec::{Chapter, narrated_steps};

const PRESYNTH_DIR: &str = "narration";

/// Timing for every narrated step, with audio paths where synthesis
/// succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrationPreSynthesisResult {
    pub timing: NarrationTimingMap,
    pub audio_dir: PathBuf,
}

impl NarrationPreSynthesisResult {
    pub fn synthesized_count(&self) -> usize {
        self.timing
            .values()
            .filter(|e| e.audio_path.is_some())
            .count()
    }
}

/// Items are processed one at a time. A failing item falls back to the word
/// estimate, so the returned map always covers every narrated step.
pub async fn pre_synthesize_narration(
    chapters: &[Chapter],
    provider: &dyn TtsProvider,
    options: &TtsOptions,
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> anyhow::Result<NarrationPreSynthesisResult> {
    let items: Vec<_> = narrated_steps(chapters).collect();
    let audio_dir = output_dir.join(PRESYNTH_DIR);
    if items.is_empty() {
        info!("no narration found, skipping pre-synthesis");
        return Ok(NarrationPreSynthesisResult {
            timing: NarrationTimingMap::new(),
            audio_dir,
        });
    }

    tokio::fs::create_dir_all(&audio_dir)
        .await
        .with_context(|| format!("failed to create {}", audio_dir.display()))?;
    info!(count = items.len(), provider = provider.name(), "pre-synthesizing narration");

    let mut timing = NarrationTimingMap::new();
    for item in &items {
        let path = audio_dir.join(format!("narration-{}.wav", item.index));
        let entry = match synthesize_one(item.text, &path, provider, options, toolchain).await {
            Ok(duration_ms) => {
                debug!(step_index = item.index, duration_ms, "pre-synthesized narration");
                NarrationTimingEntry {
                    text: item.text.to_string(),
                    duration_ms,
                    audio_path: Some(path),
                }
            }
            Err(e) => {
                let duration_ms = estimate_duration_ms(item.text);
                warn!(
                    step_index = item.index,
                    estimate_ms = duration_ms,
                    error = format!("{e:#}"),
                    "narration pre-synthesis failed, using estimate"
                );
                NarrationTimingEntry {
                    text: item.text.to_string(),
                    duration_ms,
                    audio_path: None,
                }
            }
        };
        timing.insert(item.index, entry);
    }

    let total_ms: u64 = timing.values().map(|e| e.duration_ms).sum();
    info!(segments = timing.len(), total_ms, "pre-synthesis complete");
    Ok(NarrationPreSynthesisResult { timing, audio_dir })
}

async fn synthesize_one(
    text: &str,
    path: &Path,
    provider: &dyn TtsProvider,
    options: &TtsOptions,
    toolchain: &dyn AudioToolchain,
) -> anyhow::Result<u64> {
    let audio = provider.synthesize(text, options).await?;
    tokio::fs::write(path, &audio)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    match wav_duration_ms(&audio) {
        Some(ms) => Ok(ms),
        None => Ok(toolchain.probe_duration_ms(path).await?),
    }
}
