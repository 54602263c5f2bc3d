//! Artifacts persisted from a capture run.

pub mod event_log;
pub mod failure;
pub mod metadata;

pub use event_log::{EventLogError, read_event_log, write_event_log};
pub use failure::{FailureArtifacts, FailureReport, capture_failure_artifacts};
pub use metadata::{CaptureMetadata, read_capture_metadata_maybe, write_capture_metadata};

pub const EVENTS_JSON: &str = "events.json";
pub const METADATA_JSON: &str = "metadata.json";
pub const TIMELINE_JSON: &str = "timeline.json";
