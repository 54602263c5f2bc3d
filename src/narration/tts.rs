//! Text-to-speech providers. Only the narrow "text in, audio bytes out"
//! contract matters to the rest of the crate.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use super::wav::pcm16_to_wav;

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const OPENAI_MODEL: &str = "tts-1";
const OPENAI_DEFAULT_VOICE: &str = "alloy";

const PIPER_DEFAULT_VOICE: &str = "en_US-lessac-medium";
const PIPER_SAMPLE_RATE: u32 = 22_050;

pub const DEFAULT_PROVIDER: &str = "openai";

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("Unknown TTS provider: \"{0}\"")]
    UnknownProvider(String),
    #[error("OPENAI_API_KEY environment variable is not set")]
    MissingApiKey,
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("piper binary not found. Install piper TTS.")]
    PiperNotFound,
    #[error("piper exited with code {code:?}: {stderr}")]
    PiperFailed { code: Option<i32>, stderr: String },
    #[error("TTS process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtsOptions {
    pub voice: Option<String>,
    pub speed: Option<f32>,
}

impl TtsOptions {
    pub fn with_voice(voice: Option<String>) -> Self {
        Self { voice, speed: None }
    }
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>, TtsError>;
}

pub fn create_tts_provider(name: &str) -> Result<Box<dyn TtsProvider>, TtsError> {
    match name {
        "openai" => Ok(Box::new(OpenAiTts::from_env()?)),
        "piper" => Ok(Box::new(PiperTts::default())),
        other => Err(TtsError::UnknownProvider(other.to_string())),
    }
}

/// OpenAI speech endpoint, asked for WAV so durations can be read from the
/// header.
pub struct OpenAiTts {
    client: Client,
    api_key: String,
}

impl OpenAiTts {
    pub fn from_env() -> Result<Self, TtsError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(TtsError::MissingApiKey)?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }
}

#[async_trait]
impl TtsProvider for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>, TtsError> {
        let voice = options.voice.as_deref().unwrap_or(OPENAI_DEFAULT_VOICE);
        let speed = options.speed.unwrap_or(1.0);
        info!(chars = text.len(), voice, speed, "synthesizing with openai");

        let response = self
            .client
            .post(OPENAI_SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": OPENAI_MODEL,
                "voice": voice,
                "speed": speed,
                "input": text,
                "response_format": "wav",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            return Err(TtsError::Api {
                provider: "openai",
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Local `piper` binary. Its raw PCM output is wrapped into a WAV.
#[derive(Debug, Clone)]
pub struct PiperTts {
    program: String,
}

impl Default for PiperTts {
    fn default() -> Self {
        Self {
            program: "piper".to_string(),
        }
    }
}

#[async_trait]
impl TtsProvider for PiperTts {
    fn name(&self) -> &str {
        "piper"
    }

    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>, TtsError> {
        let voice = options.voice.as_deref().unwrap_or(PIPER_DEFAULT_VOICE);
        info!(chars = text.len(), voice, "synthesizing with piper");

        let mut child = Command::new(&self.program)
            .args(["--model", voice, "--output-raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TtsError::PiperNotFound,
                _ => TtsError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(TtsError::PiperFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(pcm16_to_wav(&output.stdout, PIPER_SAMPLE_RATE, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected_by_name() {
        let err = create_tts_provider("espeak").err().unwrap();
        assert_eq!(err.to_string(), "Unknown TTS provider: \"espeak\"");
    }

    #[test]
    fn piper_is_available_without_credentials() {
        let provider = create_tts_provider("piper").unwrap();
        assert_eq!(provider.name(), "piper");
    }

    #[tokio::test]
    async fn missing_piper_binary_is_reported() {
        let piper = PiperTts {
            program: "definitely-not-a-real-piper-binary".into(),
        };
        let err = piper
            .synthesize("hello", &TtsOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TtsError::PiperNotFound));
    }
}
