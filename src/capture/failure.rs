//! Post-mortem artifacts for a failed run.
//!
//! Each artifact is attempted on its own; a failure to capture one is logged
//! and never replaces the step error being reported.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::playback::{ActionEvent, BrowserDriver, PlaybackStepError};
use crate::spec::Step;

pub const FAILURE_JSON: &str = "failure.json";
pub const FAILURE_PNG: &str = "failure.png";
pub const FAILURE_HTML: &str = "failure.html";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub message: String,
    pub step_index: usize,
    pub chapter_title: String,
    pub step: Step,
    pub selector: String,
    pub start_timestamp: u64,
    pub cause: String,
    pub events: Vec<ActionEvent>,
}

impl From<&PlaybackStepError> for FailureReport {
    fn from(e: &PlaybackStepError) -> Self {
        Self {
            message: e.to_string(),
            step_index: e.step_index,
            chapter_title: e.chapter_title.clone(),
            step: e.step.clone(),
            selector: e.selector.clone(),
            start_timestamp: e.start_timestamp,
            cause: e.cause.to_string(),
            events: e.events.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureArtifacts {
    pub report: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub dom: Option<PathBuf>,
}

/// Runs `f`, logging instead of propagating its error.
pub fn attempt<T>(artifact: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match f() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(artifact, error = format!("{e:#}"), "failed to capture failure artifact");
            None
        }
    }
}

pub fn capture_failure_artifacts(
    driver: &mut dyn BrowserDriver,
    error: &PlaybackStepError,
    output_dir: &Path,
) -> FailureArtifacts {
    let report_path = output_dir.join(FAILURE_JSON);
    let report = attempt(FAILURE_JSON, || {
        let json = serde_json::to_string_pretty(&FailureReport::from(error))?;
        std::fs::write(&report_path, json)
            .with_context(|| format!("writing {}", report_path.display()))?;
        Ok(report_path.clone())
    });

    let png_path = output_dir.join(FAILURE_PNG);
    let screenshot = attempt(FAILURE_PNG, || {
        driver.screenshot(Some(&png_path))?;
        Ok(png_path.clone())
    });

    let html_path = output_dir.join(FAILURE_HTML);
    let dom = attempt(FAILURE_HTML, || {
        let html = driver.content()?;
        std::fs::write(&html_path, html)
            .with_context(|| format!("writing {}", html_path.display()))?;
        Ok(html_path.clone())
    });

    info!(
        report = report.is_some(),
        screenshot = screenshot.is_some(),
        dom = dom.is_some(),
        "captured failure artifacts"
    );
    FailureArtifacts {
        report,
        screenshot,
        dom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn attempt_swallows_errors() {
        assert_eq!(attempt("x", || Ok(3)), Some(3));
        assert_eq!(attempt::<u8>("x", || Err(anyhow!("disk full"))), None);
    }
}
