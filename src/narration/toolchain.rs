//! External audio tools: duration probing and delayed-track mixing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const PROBE_STDERR_TAIL: usize = 200;
const MIX_STDERR_TAIL: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited {code:?}: {stderr_tail}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr_tail: String,
    },
    #[error("ffprobe returned invalid duration: {0}")]
    InvalidDuration(String),
}

/// One clip placed on the mixed track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixInput {
    pub path: PathBuf,
    pub offset_ms: u64,
}

#[async_trait]
pub trait AudioToolchain: Send + Sync {
    async fn probe_duration_ms(&self, path: &Path) -> Result<u64, ToolError>;

    /// Delays every clip by its offset and sums them into `output`.
    async fn mix(&self, inputs: &[MixInput], output: &Path) -> Result<(), ToolError>;
}

/// `ffprobe` + `ffmpeg` from `PATH`.
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg;

fn tail(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(max);
    chars[start..].iter().collect::<String>().trim().to_string()
}

pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "csv=p=0".into(),
        path.display().to_string(),
    ]
}

pub fn mix_args(inputs: &[MixInput], output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.path.display().to_string());
    }

    let mut filters: Vec<String> = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| format!("[{i}]adelay={0}|{0}[a{i}]", input.offset_ms))
        .collect();
    let labels: String = (0..inputs.len()).map(|i| format!("[a{i}]")).collect();
    filters.push(format!(
        "{labels}amix=inputs={}:duration=longest:normalize=0",
        inputs.len()
    ));

    args.push("-filter_complex".into());
    args.push(filters.join(";"));
    args.push(output.display().to_string());
    args
}

pub fn parse_probe_output(stdout: &str) -> Result<u64, ToolError> {
    let trimmed = stdout.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Ok((seconds * 1000.0).round() as u64)
        }
        _ => Err(ToolError::InvalidDuration(trimmed.to_string())),
    }
}

#[async_trait]
impl AudioToolchain for Ffmpeg {
    async fn probe_duration_ms(&self, path: &Path) -> Result<u64, ToolError> {
        let output = Command::new("ffprobe")
            .args(probe_args(path))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                tool: "ffprobe",
                source,
            })?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: "ffprobe",
                code: output.status.code(),
                stderr_tail: tail(&output.stderr, PROBE_STDERR_TAIL),
            });
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn mix(&self, inputs: &[MixInput], output: &Path) -> Result<(), ToolError> {
        let args = mix_args(inputs, output);
        debug!(?args, "running ffmpeg audio mix");
        let result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        if !result.status.success() {
            return Err(ToolError::Failed {
                tool: "ffmpeg",
                code: result.status.code(),
                stderr_tail: tail(&result.stderr, MIX_STDERR_TAIL),
            });
        }
        Ok(())
    }
}
