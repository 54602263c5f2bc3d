use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::playback::ActionEvent;

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("failed to access event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event log must be a JSON array")]
    NotArray,
    #[error("event {index} must be an object")]
    NotObject { index: usize },
    #[error("event {index} must have {expected} '{field}' field")]
    Field {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

/// Pretty-printed JSON array, overwriting any previous log.
pub fn write_event_log(events: &[ActionEvent], path: &Path) -> Result<(), EventLogError> {
    let io = |source| EventLogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(io)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, events)?;
    writer.flush().map_err(io)?;
    Ok(())
}

pub fn read_event_log(path: &Path) -> Result<Vec<ActionEvent>, EventLogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| EventLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_event_log(&raw)
}

/// Validates shape field by field before deserializing, so a bad entry is
/// reported by index and field rather than as a generic serde error.
/// Fractional `timestamp`/`duration` values are rounded to whole ms.
pub fn parse_event_log(raw: &str) -> Result<Vec<ActionEvent>, EventLogError> {
    let root: Value = serde_json::from_str(raw)?;
    let Value::Array(mut entries) = root else {
        return Err(EventLogError::NotArray);
    };

    for (index, entry) in entries.iter_mut().enumerate() {
        let Some(record) = entry.as_object_mut() else {
            return Err(EventLogError::NotObject { index });
        };
        let field_err = |field, expected| EventLogError::Field {
            index,
            field,
            expected,
        };
        if !record.get("action").is_some_and(Value::is_string) {
            return Err(field_err("action", "a string"));
        }
        for field in ["timestamp", "duration"] {
            let Some(value) = record.get(field) else {
                return Err(field_err(field, "a non-negative number"));
            };
            if value.is_u64() {
                continue;
            }
            let ms = value
                .as_f64()
                .filter(|ms| ms.is_finite() && *ms >= 0.0)
                .ok_or_else(|| field_err(field, "a non-negative number"))?;
            record.insert(field.to_string(), Value::from(ms.round() as u64));
        }
    }

    Ok(serde_json::from_value(Value::Array(entries))?)
}
