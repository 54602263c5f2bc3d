use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub schema_version: u32,
    /// Epoch ms at playback start. Timelines start at the first event, so the
    /// difference is the lead-in before the first action.
    pub start_timestamp: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_title: Option<String>,
}

impl CaptureMetadata {
    pub fn new(start_timestamp: u64, spec_title: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            start_timestamp,
            created_at: Utc::now(),
            spec_title,
        }
    }
}

pub fn write_capture_metadata(meta: &CaptureMetadata, path: &Path) -> Result<()> {
    let mut json = serde_json::to_string_pretty(meta)?;
    json.push('\n');
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn read_capture_metadata(path: &Path) -> Result<CaptureMetadata> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let meta: CaptureMetadata =
        serde_json::from_str(&raw).context("capture metadata is not a valid object")?;
    if meta.schema_version != SCHEMA_VERSION {
        bail!("unsupported capture metadata schemaVersion {}", meta.schema_version);
    }
    Ok(meta)
}

/// `None` when the file is absent or unreadable.
pub fn read_capture_metadata_maybe(path: &Path) -> Option<CaptureMetadata> {
    read_capture_metadata(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_and_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let meta = CaptureMetadata::new(1_700_000_000_000, Some("Demo".into()));
        write_capture_metadata(&meta, &path).unwrap();
        assert_eq!(read_capture_metadata(&path).unwrap(), meta);

        std::fs::write(
            &path,
            r#"{"schemaVersion":2,"startTimestamp":1,"createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(read_capture_metadata(&path).is_err());
        assert!(read_capture_metadata_maybe(&path).is_none());
        assert!(read_capture_metadata_maybe(&dir.path().join("missing.json")).is_none());
    }
}
