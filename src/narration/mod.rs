//! Narration timing, synthesis and mixing.

pub mod mixer;
pub mod presynth;
pub mod script;
pub mod subtitles;
pub mod timing;
pub mod toolchain;
pub mod tts;
pub mod wav;

pub use mixer::{
    GAP_MS, MixError, NarrationMixResult, PreSynthesizedClip, TimedNarrationSegment,
    mix_narration_audio, mix_presynthesized,
};
pub use presynth::{NarrationPreSynthesisResult, pre_synthesize_narration};
pub use script::{NarrationSegment, generate_script};
pub use timing::{NarrationTimingEntry, NarrationTimingMap, build_estimated_timing};
pub use toolchain::{AudioToolchain, Ffmpeg, ToolError};
pub use tts::{TtsError, TtsOptions, TtsProvider, create_tts_provider};
