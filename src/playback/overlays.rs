use regex::Regex;
use tracing::{info, warn};

use crate::playback::driver::BrowserDriver;
use crate::playback::visuals;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("invalid redaction selector (contains braces): {0}")]
    InvalidSelector(String),
}

/// Builds blur rules for every redaction selector.
pub fn generate_blur_styles(selectors: &[String]) -> Result<String, OverlayError> {
    if let Some(bad) = selectors.iter().find(|s| s.contains(['{', '}'])) {
        return Err(OverlayError::InvalidSelector(bad.clone()));
    }
    Ok(selectors
        .iter()
        .map(|s| format!("{s} {{ filter: blur(10px) !important; pointer-events: none !important; }}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn apply_redaction(driver: &mut dyn BrowserDriver, selectors: &[String]) -> anyhow::Result<()> {
    if selectors.is_empty() {
        return Ok(());
    }
    let css = generate_blur_styles(selectors)?;
    driver.add_style_tag(&css)?;
    info!(count = selectors.len(), "applied redaction");
    Ok(())
}

pub fn inject_cursor(driver: &mut dyn BrowserDriver) -> anyhow::Result<()> {
    driver.add_style_tag(&visuals::cursor_css())?;
    driver.evaluate(visuals::ENSURE_CURSOR_JS)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMatch {
    pub pattern: String,
    pub text: String,
}

/// Every match of every pattern in `text`. Patterns that fail to compile are
/// skipped with a warning.
pub fn scan_for_secrets(text: &str, patterns: &[String]) -> Vec<SecretMatch> {
    let mut matches = Vec::new();
    for pattern in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(%pattern, error = %e, "invalid secret pattern, skipping");
                continue;
            }
        };
        matches.extend(re.find_iter(text).map(|m| SecretMatch {
            pattern: pattern.clone(),
            text: m.as_str().to_string(),
        }));
    }
    matches
}

/// Scans the visible page text and logs each hit. Never fails the run.
pub fn check_secrets(driver: &mut dyn BrowserDriver, patterns: &[String]) -> Vec<SecretMatch> {
    if patterns.is_empty() {
        return Vec::new();
    }
    let text = match driver.evaluate("document.body ? document.body.innerText : ''") {
        Ok(v) => v.as_str().map(String::from).unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "could not read page text for secret scan");
            return Vec::new();
        }
    };
    let found = scan_for_secrets(&text, patterns);
    for m in &found {
        warn!(pattern = %m.pattern, text = %m.text, "secret detected on page");
    }
    found
}
