pub mod chrome;
pub mod driver;
pub mod engine;
pub mod executor;
pub mod overlays;
pub mod target;
pub mod visuals;
pub mod waiter;

use serde::{Deserialize, Serialize};

use driver::BoundingBox;

/// One successfully completed step. Timestamps are epoch milliseconds taken
/// at action start; `duration` covers the action itself, not the pause after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

impl ActionEvent {
    /// Start-relative end of the action.
    pub fn end(&self) -> u64 {
        self.timestamp + self.duration
    }
}

pub use driver::{BrowserDriver, Locator, LocatorStrategy, WaitState};
pub use engine::{PlaybackEngine, PlaybackError, PlaybackOptions, PlaybackResult, PlaybackStepError};
pub use executor::StepError;

pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
