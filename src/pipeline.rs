//! End-to-end capture: spec in, event log, timeline and narration out.

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::capture::failure::attempt;
use crate::capture::{
    CaptureMetadata, EVENTS_JSON, FailureArtifacts, METADATA_JSON, TIMELINE_JSON,
    capture_failure_artifacts, read_capture_metadata_maybe, read_event_log, write_capture_metadata,
    write_event_log,
};
use crate::narration::script::DEFAULT_STEP_DURATION_MS;
use crate::narration::subtitles::{generate_srt_from_timed, generate_vtt_from_timed};
use crate::narration::tts::DEFAULT_PROVIDER;
use crate::narration::{
    AudioToolchain, Ffmpeg, NarrationMixResult, NarrationPreSynthesisResult, PreSynthesizedClip,
    TtsOptions, build_estimated_timing, create_tts_provider, generate_script, mix_narration_audio,
    mix_presynthesized, pre_synthesize_narration,
};
use crate::playback::chrome::{BrowserSession, ChromeConfig};
use crate::playback::engine::NarrationSync;
use crate::playback::{
    ActionEvent, PlaybackEngine, PlaybackError, PlaybackOptions, PlaybackResult,
    PlaybackStepError,
};
use crate::spec::{DemoSpec, SyncMode, load_spec, narrated_steps};
use crate::timeline::{
    Timeline, build_timeline, extend_timeline_for_narration, video_start, write_timeline,
};

pub const DEFAULT_BUFFER_MS: u64 = 500;

/// Narration flags as given on the command line. `None` means the flag was
/// not passed, so the demo spec (then the default) decides.
#[derive(Debug, Clone, Default)]
pub struct NarrationArgs {
    pub narration: bool,
    pub tts_provider: Option<String>,
    pub tts_voice: Option<String>,
    pub sync: Option<SyncMode>,
    pub buffer_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationSettings {
    pub enabled: bool,
    pub provider: String,
    pub voice: Option<String>,
    pub sync_mode: SyncMode,
    pub buffer_ms: u64,
}

impl NarrationSettings {
    pub fn tts_options(&self) -> TtsOptions {
        TtsOptions::with_voice(self.voice.clone())
    }
}

pub fn resolve_narration_settings(spec: &DemoSpec, args: &NarrationArgs) -> NarrationSettings {
    let from_spec = spec.narration.as_ref();
    let sync = from_spec.and_then(|n| n.sync.as_ref());

    let enabled = args.narration && from_spec.and_then(|n| n.enabled) != Some(false);
    let provider = args
        .tts_provider
        .clone()
        .or_else(|| from_spec.and_then(|n| n.provider.clone()))
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    let voice = args
        .tts_voice
        .clone()
        .or_else(|| from_spec.and_then(|n| n.voice.clone()));
    let sync_mode = args
        .sync
        .or_else(|| sync.and_then(|s| s.mode))
        .unwrap_or_default();
    let buffer_ms = args
        .buffer_ms
        .or_else(|| sync.and_then(|s| s.buffer_ms))
        .and_then(|ms| u64::try_from(ms).ok())
        .unwrap_or(DEFAULT_BUFFER_MS);

    NarrationSettings {
        enabled,
        provider,
        voice,
        sync_mode,
        buffer_ms,
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub spec_path: PathBuf,
    pub output_dir: PathBuf,
    pub chrome: ChromeConfig,
    pub narration: NarrationArgs,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub playback: PlaybackResult,
    pub timeline: Timeline,
    pub narration: Option<NarrationMixResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{error}")]
    StepFailed {
        error: Box<PlaybackStepError>,
        artifacts: FailureArtifacts,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Pre-synthesis result plus the timing the waiter will pace against.
struct NarrationPrep {
    sync: Option<NarrationSync>,
    presynth: Option<NarrationPreSynthesisResult>,
}

async fn prepare_narration_timing(
    spec: &DemoSpec,
    settings: &NarrationSettings,
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> NarrationPrep {
    if !settings.enabled || settings.sync_mode == SyncMode::Manual {
        return NarrationPrep {
            sync: None,
            presynth: None,
        };
    }

    let attempt_presynth = async {
        let provider = create_tts_provider(&settings.provider)?;
        pre_synthesize_narration(
            &spec.chapters,
            provider.as_ref(),
            &settings.tts_options(),
            toolchain,
            output_dir,
        )
        .await
    };

    let (timing, presynth) = match attempt_presynth.await {
        Ok(pre) => (pre.timing.clone(), Some(pre)),
        Err(e) => {
            warn!(error = format!("{e:#}"), "pre-synthesis unavailable, falling back to estimates");
            (build_estimated_timing(&spec.chapters), None)
        }
    };

    NarrationPrep {
        sync: Some(NarrationSync {
            mode: settings.sync_mode,
            buffer_ms: settings.buffer_ms,
            timing,
        }),
        presynth,
    }
}

pub fn playback_options(
    spec: &DemoSpec,
    spec_dir: Option<PathBuf>,
    output_dir: &Path,
    narration: Option<NarrationSync>,
) -> PlaybackOptions {
    PlaybackOptions {
        base_url: spec.base_url().to_string(),
        spec_dir,
        screenshot_dir: Some(output_dir.join("screenshots")),
        redaction_selectors: spec.redaction_selectors().to_vec(),
        secret_patterns: spec.secret_patterns().to_vec(),
        pacing: Some(spec.pacing),
        narration,
    }
}

/// Launches Chrome and plays the demo spec on a blocking thread. On a step failure
/// the failure artifacts are captured from the live page before the browser
/// goes away.
async fn play_in_chrome(
    spec: DemoSpec,
    chrome: ChromeConfig,
    options: PlaybackOptions,
    output_dir: PathBuf,
) -> Result<PlaybackResult, RunError> {
    tokio::task::spawn_blocking(move || {
        let session = BrowserSession::launch(&chrome)?;
        let total = crate::spec::total_steps(&spec.chapters);
        let mut completed = 0usize;
        let mut engine =
            PlaybackEngine::new(session.driver(), options).on_step_complete(move |event| {
                completed += 1;
                debug!(completed, total, action = %event.action, "step complete");
                Ok(())
            });

        match engine.execute(&spec.chapters) {
            Ok(result) => Ok(result),
            Err(PlaybackError::Step(error)) => {
                let artifacts = capture_failure_artifacts(engine.driver_mut(), &error, &output_dir);
                Err(RunError::StepFailed { error, artifacts })
            }
            Err(other) => Err(RunError::Other(other.into())),
        }
    })
    .await
    .map_err(|e| anyhow!("playback task panicked: {e}"))?
}

pub async fn run(options: RunOptions) -> Result<RunOutcome, RunError> {
    let spec = load_spec(&options.spec_path).map_err(anyhow::Error::from)?;
    let output_dir = options.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    info!(title = %spec.meta.title, output = %output_dir.display(), "running demo");

    let settings = resolve_narration_settings(&spec, &options.narration);
    debug!(?settings, "narration settings");
    let toolchain = Ffmpeg;
    let prep = prepare_narration_timing(&spec, &settings, &toolchain, &output_dir).await;

    let spec_dir = options.spec_path.parent().map(Path::to_path_buf);
    let playback = playback_options(&spec, spec_dir, &output_dir, prep.sync);
    let chrome = ChromeConfig {
        resolution: spec.meta.resolution,
        ..options.chrome
    };

    let result = match play_in_chrome(spec.clone(), chrome, playback, output_dir.clone()).await {
        Ok(result) => result,
        Err(RunError::StepFailed { error, artifacts }) => {
            attempt(EVENTS_JSON, || {
                write_event_log(&error.events, &output_dir.join(EVENTS_JSON))?;
                Ok(())
            });
            return Err(RunError::StepFailed { error, artifacts });
        }
        Err(other) => return Err(other),
    };

    write_event_log(&result.events, &output_dir.join(EVENTS_JSON))
        .context("failed to save event log")?;
    write_capture_metadata(
        &CaptureMetadata::new(result.start_timestamp, Some(spec.meta.title.clone())),
        &output_dir.join(METADATA_JSON),
    )?;

    let mut timeline = build_timeline(&result.events, &spec);
    let mut narration = None;
    if settings.enabled {
        let mixed = mix_for_capture(
            &spec,
            &result.events,
            &settings,
            prep.presynth.as_ref(),
            &toolchain,
            &output_dir,
        )
        .await?;
        if let Some(mix) = mixed {
            timeline = extend_timeline_for_narration(&timeline, mix.total_duration_ms);
            write_subtitles(&mix, &output_dir)?;
            narration = Some(mix);
        }
    }

    write_timeline(&timeline, &output_dir.join(TIMELINE_JSON))?;
    info!(
        events = result.events.len(),
        duration_ms = timeline.total_duration_ms,
        "capture complete"
    );

    Ok(RunOutcome {
        playback: result,
        timeline,
        narration,
    })
}

/// Clips from pre-synthesis, anchored to the recorded action times on the
/// timeline's origin.
pub fn presynth_mix_inputs(
    spec: &DemoSpec,
    events: &[ActionEvent],
    presynth: &NarrationPreSynthesisResult,
) -> Vec<PreSynthesizedClip> {
    let t0 = video_start(events).unwrap_or(0);
    narrated_steps(&spec.chapters)
        .filter_map(|n| {
            let entry = presynth.timing.get(&n.index)?;
            let audio_path = entry.audio_path.clone()?;
            let action_ms = events
                .get(n.index)
                .map(|e| e.timestamp.saturating_sub(t0))
                .unwrap_or(n.index as u64 * DEFAULT_STEP_DURATION_MS);
            Some(PreSynthesizedClip {
                text: n.text.to_string(),
                action_ms,
                duration_ms: entry.duration_ms,
                audio_path,
            })
        })
        .collect()
}

pub async fn mix_for_capture(
    spec: &DemoSpec,
    events: &[ActionEvent],
    settings: &NarrationSettings,
    presynth: Option<&NarrationPreSynthesisResult>,
    toolchain: &dyn AudioToolchain,
    output_dir: &Path,
) -> Result<Option<NarrationMixResult>> {
    if settings.sync_mode == SyncMode::AutoSync
        && let Some(pre) = presynth
    {
        let inputs = presynth_mix_inputs(spec, events, pre);
        if !inputs.is_empty() {
            return Ok(mix_presynthesized(&inputs, toolchain, output_dir).await?);
        }
        warn!("auto-sync produced no pre-synthesized audio; falling back to TTS");
    }

    let segments = generate_script(&spec.chapters, events, None);
    let provider = create_tts_provider(&settings.provider)?;
    Ok(mix_narration_audio(
        &segments,
        provider.as_ref(),
        &settings.tts_options(),
        toolchain,
        output_dir,
    )
    .await?)
}

pub fn write_subtitles(mix: &NarrationMixResult, output_dir: &Path) -> Result<()> {
    for (name, body) in [
        ("subtitles.vtt", generate_vtt_from_timed(&mix.segments)),
        ("subtitles.srt", generate_srt_from_timed(&mix.segments)),
    ] {
        let path = output_dir.join(name);
        std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    }
    info!("subtitles saved");
    Ok(())
}

/// Rebuilds `timeline.json` from a saved event log, without a browser.
/// `metadata.json` beside the log, when present, is checked against it.
pub fn rebuild_timeline(events_path: &Path, spec_path: &Path, output: &Path) -> Result<Timeline> {
    let spec = load_spec(spec_path)?;
    let events = read_event_log(events_path)?;
    if let Some(meta) = read_capture_metadata_maybe(&events_path.with_file_name(METADATA_JSON)) {
        check_capture_metadata(&meta, &spec, &events)?;
    }
    let timeline = build_timeline(&events, &spec);
    write_timeline(&timeline, output)?;
    info!(
        segments = timeline.segments.len(),
        duration_ms = timeline.total_duration_ms,
        path = %output.display(),
        "timeline written"
    );
    Ok(timeline)
}

fn check_capture_metadata(
    meta: &CaptureMetadata,
    spec: &DemoSpec,
    events: &[ActionEvent],
) -> Result<()> {
    if let Some(first) = video_start(events) {
        if first < meta.start_timestamp {
            bail!(
                "event log starts at {first}, before its capture began at {}; \
                 events.json and metadata.json are from different runs",
                meta.start_timestamp
            );
        }
        debug!(lead_in_ms = first - meta.start_timestamp, "capture metadata");
    }
    if let Some(title) = &meta.spec_title
        && *title != spec.meta.title
    {
        warn!(
            captured = %title,
            spec = %spec.meta.title,
            "event log was captured from a different spec title"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::NarrationTimingEntry;
    use crate::narration::mixer::{ScheduledClip, narration_total_ms, schedule_clips};
    use crate::timeline::SegmentType;
    use crate::spec::{NarrationSyncConfig, SpecNarrationConfig};

    fn spec_with(narration: Option<SpecNarrationConfig>) -> DemoSpec {
        let raw = r##"{
            "meta": { "title": "Settings" },
            "chapters": [ { "title": "One", "steps": [
                { "action": "navigate", "url": "/", "narration": "Hello there." },
                { "action": "click", "selector": "#a" },
                { "action": "click", "selector": "#b", "narration": "Now click." }
            ] } ]
        }"##;
        let mut spec: DemoSpec = serde_json::from_str(raw).unwrap();
        spec.narration = narration;
        spec
    }

    #[test]
    fn defaults_apply_without_spec_or_flags() {
        let settings = resolve_narration_settings(&spec_with(None), &NarrationArgs::default());
        assert_eq!(
            settings,
            NarrationSettings {
                enabled: false,
                provider: "openai".into(),
                voice: None,
                sync_mode: SyncMode::Manual,
                buffer_ms: 500,
            }
        );
    }

    #[test]
    fn explicit_flags_beat_spec_values() {
        let spec = spec_with(Some(SpecNarrationConfig {
            enabled: None,
            provider: Some("piper".into()),
            voice: Some("amy".into()),
            sync: Some(NarrationSyncConfig {
                mode: Some(SyncMode::WarnOnly),
                buffer_ms: Some(800),
            }),
        }));

        let from_spec = resolve_narration_settings(
            &spec,
            &NarrationArgs {
                narration: true,
                ..Default::default()
            },
        );
        assert!(from_spec.enabled);
        assert_eq!(from_spec.provider, "piper");
        assert_eq!(from_spec.voice.as_deref(), Some("amy"));
        assert_eq!(from_spec.sync_mode, SyncMode::WarnOnly);
        assert_eq!(from_spec.buffer_ms, 800);

        let overridden = resolve_narration_settings(
            &spec,
            &NarrationArgs {
                narration: true,
                tts_provider: Some("openai".into()),
                tts_voice: None,
                sync: Some(SyncMode::AutoSync),
                buffer_ms: Some(-5),
            },
        );
        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.sync_mode, SyncMode::AutoSync);
        assert_eq!(overridden.buffer_ms, DEFAULT_BUFFER_MS);
    }

    #[test]
    fn spec_can_disable_narration() {
        let spec = spec_with(Some(SpecNarrationConfig {
            enabled: Some(false),
            ..Default::default()
        }));
        let args = NarrationArgs {
            narration: true,
            ..Default::default()
        };
        assert!(!resolve_narration_settings(&spec, &args).enabled);
    }

    #[test]
    fn presynth_inputs_use_event_times_and_skip_unsynthesized() {
        let spec = spec_with(None);
        let mut timing = crate::narration::NarrationTimingMap::new();
        timing.insert(
            0,
            NarrationTimingEntry {
                text: "Hello there.".into(),
                duration_ms: 900,
                audio_path: None,
            },
        );
        timing.insert(
            2,
            NarrationTimingEntry {
                text: "Now click.".into(),
                duration_ms: 1200,
                audio_path: Some("narration/narration-2.wav".into()),
            },
        );
        let presynth = NarrationPreSynthesisResult {
            timing,
            audio_dir: "narration".into(),
        };
        let events: Vec<ActionEvent> = [1_000u64, 2_000, 5_500]
            .iter()
            .map(|&timestamp| ActionEvent {
                action: "click".into(),
                selector: None,
                timestamp,
                bounding_box: None,
                duration: 100,
                narration: None,
            })
            .collect();

        let inputs = presynth_mix_inputs(&spec, &events, &presynth);
        assert_eq!(
            inputs,
            vec![PreSynthesizedClip {
                text: "Now click.".into(),
                action_ms: 4_500,
                duration_ms: 1200,
                audio_path: "narration/narration-2.wav".into(),
            }]
        );

        let inputs = presynth_mix_inputs(&spec, &events[..1], &presynth);
        assert_eq!(inputs[0].action_ms, 6_000);
    }

    #[test]
    fn narration_and_timeline_share_one_origin() {
        let spec = spec_with(None);
        let mut timing = crate::narration::NarrationTimingMap::new();
        for (index, text, duration_ms) in [(0, "Hello there.", 300), (2, "Now click.", 400)] {
            timing.insert(
                index,
                NarrationTimingEntry {
                    text: text.into(),
                    duration_ms,
                    audio_path: Some(format!("narration/narration-{index}.wav").into()),
                },
            );
        }
        let presynth = NarrationPreSynthesisResult {
            timing,
            audio_dir: "narration".into(),
        };
        // playback started at 10_000; a 3s lead-in delayed the first action
        let events: Vec<ActionEvent> = [(13_000u64, 200u64), (13_500, 100), (14_000, 300)]
            .iter()
            .map(|&(timestamp, duration)| ActionEvent {
                action: "click".into(),
                selector: None,
                timestamp,
                bounding_box: None,
                duration,
                narration: None,
            })
            .collect();

        let timeline = build_timeline(&events, &spec);
        let content: Vec<u64> = timeline
            .segments_of(SegmentType::Content)
            .map(|s| s.start_ms)
            .collect();
        assert_eq!(content, vec![0, 500, 1_000]);

        let clips = presynth_mix_inputs(&spec, &events, &presynth);
        let deadlines: Vec<u64> = clips.iter().map(|c| c.action_ms).collect();
        assert_eq!(deadlines, vec![content[0], content[2]]);

        let script = generate_script(&spec.chapters, &events, None);
        let starts: Vec<u64> = script.iter().map(|s| s.start_ms).collect();
        assert_eq!(starts, deadlines);

        let mut scheduled: Vec<ScheduledClip> = clips
            .into_iter()
            .map(|c| ScheduledClip::new(c.text, c.audio_path, c.action_ms, c.duration_ms))
            .collect();
        schedule_clips(&mut scheduled);
        let total = narration_total_ms(&scheduled);
        assert_eq!(total, 1_000);
        // narration fits inside the capture, so nothing is stretched
        let extended = extend_timeline_for_narration(&timeline, total);
        assert_eq!(extended, timeline);
        assert_eq!(extended.total_duration_ms, 1_300);
    }

    #[test]
    fn rebuild_checks_the_log_against_its_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("demo.json");
        std::fs::write(
            &spec_path,
            r#"{ "meta": { "title": "Settings" },
                 "chapters": [ { "title": "One", "steps": [ { "action": "back" } ] } ] }"#,
        )
        .unwrap();
        let events_path = dir.path().join(EVENTS_JSON);
        let events = vec![ActionEvent {
            action: "back".into(),
            selector: None,
            timestamp: 13_000,
            bounding_box: None,
            duration: 400,
            narration: None,
        }];
        write_event_log(&events, &events_path).unwrap();
        let output = dir.path().join(TIMELINE_JSON);

        let meta_path = dir.path().join(METADATA_JSON);
        write_capture_metadata(&CaptureMetadata::new(10_000, Some("Settings".into())), &meta_path)
            .unwrap();
        let timeline = rebuild_timeline(&events_path, &spec_path, &output).unwrap();
        assert_eq!(timeline.total_duration_ms, 400);
        assert!(output.exists());

        // metadata from a later run cannot describe this log
        write_capture_metadata(&CaptureMetadata::new(20_000, None), &meta_path).unwrap();
        let err = rebuild_timeline(&events_path, &spec_path, &output).unwrap_err();
        assert!(err.to_string().contains("different runs"));

        std::fs::remove_file(&meta_path).unwrap();
        assert!(rebuild_timeline(&events_path, &spec_path, &output).is_ok());
    }
}
