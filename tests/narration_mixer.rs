use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use demo_machine::narration::toolchain::MixInput;
use demo_machine::narration::wav::pcm16_to_wav;
use demo_machine::narration::{
    AudioToolchain, GAP_MS, MixError, NarrationSegment, PreSynthesizedClip, ToolError, TtsError,
    TtsOptions, TtsProvider, mix_narration_audio, mix_presynthesized, pre_synthesize_narration,
};
use demo_machine::spec::{Action, Chapter, Step};

/// Durations are looked up by the file's byte length; mixes are recorded.
#[derive(Default)]
struct FakeTools {
    ms_per_byte: u64,
    mixes: Mutex<Vec<(Vec<MixInput>, PathBuf)>>,
    probed: Mutex<Vec<PathBuf>>,
    fail_mix: bool,
}

#[async_trait]
impl AudioToolchain for FakeTools {
    async fn probe_duration_ms(&self, path: &Path) -> Result<u64, ToolError> {
        self.probed.lock().unwrap().push(path.to_path_buf());
        let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Ok(len * self.ms_per_byte)
    }

    async fn mix(&self, inputs: &[MixInput], output: &Path) -> Result<(), ToolError> {
        if self.fail_mix {
            return Err(ToolError::Failed {
                tool: "ffmpeg",
                code: Some(1),
                stderr_tail: "Invalid filter graph".into(),
            });
        }
        self.mixes
            .lock()
            .unwrap()
            .push((inputs.to_vec(), output.to_path_buf()));
        std::fs::write(output, b"mixed").map_err(|source| ToolError::Spawn {
            tool: "ffmpeg",
            source,
        })
    }
}

/// Returns `len` bytes of non-WAV audio per segment, where `len` is the
/// number of words. Texts containing "fail" error out.
struct WordsTts;

#[async_trait]
impl TtsProvider for WordsTts {
    fn name(&self) -> &str {
        "words"
    }

    async fn synthesize(&self, text: &str, _: &TtsOptions) -> Result<Vec<u8>, TtsError> {
        if text.contains("fail") {
            return Err(TtsError::Api {
                provider: "words",
                status: 500,
                message: "overloaded".into(),
            });
        }
        Ok(vec![b'x'; text.split_whitespace().count()])
    }
}

/// Emits real WAV headers: 100ms of 22050 Hz mono per word.
struct WavTts;

#[async_trait]
impl TtsProvider for WavTts {
    fn name(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, text: &str, _: &TtsOptions) -> Result<Vec<u8>, TtsError> {
        let words = text.split_whitespace().count();
        Ok(pcm16_to_wav(&vec![0u8; words * 4410], 22_050, 1))
    }
}

fn segment(text: &str, start_ms: u64) -> NarrationSegment {
    NarrationSegment {
        text: text.into(),
        start_ms,
        end_ms: start_ms + 500,
    }
}

#[tokio::test]
async fn two_clips_lead_into_their_actions() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools {
        ms_per_byte: 1000,
        ..FakeTools::default()
    };
    // two words each -> 2000ms clips, actions at 2000 and 6000
    let segments = vec![segment("Open settings", 2000), segment("Save changes", 6000)];

    let result = mix_narration_audio(
        &segments,
        &WordsTts,
        &TtsOptions::default(),
        &tools,
        out.path(),
    )
    .await
    .unwrap()
    .unwrap();

    let placed: Vec<_> = result
        .segments
        .iter()
        .map(|s| (s.start_ms, s.duration_ms))
        .collect();
    assert_eq!(placed, vec![(0, 2000), (4000, 2000)]);
    assert_eq!(result.total_duration_ms, 6000);
    assert_eq!(result.audio_path, out.path().join("narration.wav"));

    let mixes = tools.mixes.lock().unwrap();
    assert_eq!(mixes.len(), 1);
    let offsets: Vec<_> = mixes[0].0.iter().map(|m| m.offset_ms).collect();
    assert_eq!(offsets, vec![0, 4000]);
    assert_eq!(tools.probed.lock().unwrap().len(), 2);
    assert!(!out.path().join(".narration-tmp").exists());
}

#[tokio::test]
async fn dense_narration_never_overlaps() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools {
        ms_per_byte: 1000,
        ..FakeTools::default()
    };
    let segments = vec![
        segment("one two three", 1000),
        segment("four five", 1500),
        segment("six", 1800),
    ];

    let result = mix_narration_audio(&segments, &WordsTts, &TtsOptions::default(), &tools, out.path())
        .await
        .unwrap()
        .unwrap();

    for pair in result.segments.windows(2) {
        assert!(pair[1].start_ms >= pair[0].end_ms() + GAP_MS);
    }
    assert_eq!(result.segments.last().unwrap().end_ms(), result.total_duration_ms);
    assert_eq!(result.total_duration_ms, 3000 + 200 + 2000 + 200 + 1000);
}

#[tokio::test]
async fn single_clip_is_copied_without_mixing() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools {
        ms_per_byte: 500,
        ..FakeTools::default()
    };
    let result = mix_narration_audio(
        &[segment("Just one line here", 5000)],
        &WordsTts,
        &TtsOptions::default(),
        &tools,
        out.path(),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(tools.mixes.lock().unwrap().is_empty());
    assert_eq!(result.segments[0].start_ms, 3000);
    assert_eq!(std::fs::read(&result.audio_path).unwrap(), b"xxxx");
}

#[tokio::test]
async fn nothing_to_say_yields_no_track() {
    let out = tempfile::tempdir().unwrap();
    let result = mix_narration_audio(
        &[],
        &WordsTts,
        &TtsOptions::default(),
        &FakeTools::default(),
        out.path(),
    )
    .await
    .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn synthesis_and_tool_failures_are_fatal_and_clean_up() {
    let out = tempfile::tempdir().unwrap();
    let err = mix_narration_audio(
        &[segment("fine", 0), segment("this will fail", 1000)],
        &WordsTts,
        &TtsOptions::default(),
        &FakeTools::default(),
        out.path(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MixError::Synthesis { index: 1, .. }));
    assert!(!out.path().join(".narration-tmp").exists());

    let tools = FakeTools {
        fail_mix: true,
        ..FakeTools::default()
    };
    let err = mix_narration_audio(
        &[segment("a", 0), segment("b", 1000)],
        &WordsTts,
        &TtsOptions::default(),
        &tools,
        out.path(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Invalid filter graph"));
}

#[tokio::test]
async fn presynthesized_clips_skip_probing() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools::default();
    let clips = vec![
        PreSynthesizedClip {
            text: "Welcome".into(),
            action_ms: 1500,
            duration_ms: 1200,
            audio_path: out.path().join("narration-0.wav"),
        },
        PreSynthesizedClip {
            text: "Click save".into(),
            action_ms: 1600,
            duration_ms: 800,
            audio_path: out.path().join("narration-3.wav"),
        },
    ];

    let result = mix_presynthesized(&clips, &tools, out.path())
        .await
        .unwrap()
        .unwrap();
    assert!(tools.probed.lock().unwrap().is_empty());
    let starts: Vec<_> = result.segments.iter().map(|s| s.start_ms).collect();
    assert_eq!(starts, vec![300, 1700]);
    assert_eq!(result.total_duration_ms, 2500);

    assert!(
        mix_presynthesized(&[], &tools, out.path())
            .await
            .unwrap()
            .is_none()
    );
}

fn narrated_chapters() -> Vec<Chapter> {
    vec![
        Chapter {
            title: "One".into(),
            narration: None,
            steps: vec![
                Step::new(Action::Back).with_narration("Go back to the list."),
                Step::new(Action::Forward),
            ],
        },
        Chapter {
            title: "Two".into(),
            narration: None,
            steps: vec![Step::new(Action::Back).with_narration("Then fail loudly here.")],
        },
    ]
}

#[tokio::test]
async fn presynthesis_reads_wav_headers() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools::default();
    let result = pre_synthesize_narration(
        &narrated_chapters(),
        &WavTts,
        &TtsOptions::default(),
        &tools,
        out.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.timing.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(result.timing[&0].duration_ms, 500);
    assert!(tools.probed.lock().unwrap().is_empty());
    let path = result.timing[&2].audio_path.clone().unwrap();
    assert!(path.ends_with("narration/narration-2.wav"));
    assert!(path.exists());
}

#[tokio::test]
async fn presynthesis_falls_back_per_item() {
    let out = tempfile::tempdir().unwrap();
    let tools = FakeTools {
        ms_per_byte: 250,
        ..FakeTools::default()
    };
    let result = pre_synthesize_narration(
        &narrated_chapters(),
        &WordsTts,
        &TtsOptions::default(),
        &tools,
        out.path(),
    )
    .await
    .unwrap();

    // non-WAV output goes through the probe
    assert_eq!(result.timing[&0].duration_ms, 5 * 250);
    assert!(result.timing[&0].audio_path.is_some());
    // failed item keeps its slot with the word estimate
    assert_eq!(result.timing[&2].duration_ms, 1600);
    assert!(result.timing[&2].audio_path.is_none());
    assert_eq!(result.synthesized_count(), 1);
}
