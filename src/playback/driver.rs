//! The browser-driver contract the playback core runs against.
//!
//! Locators are plain values: the Target Resolver builds them, the driver
//! turns them into live element lookups on every call. Nothing here holds a
//! handle into the page, so events and errors can carry a locator's
//! descriptor without keeping the browser alive.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::spec::WaitUntil;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Text-like lookup strategies share one shape: match on a string, optionally exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    Text,
    Label,
    Placeholder,
    AltText,
    Title,
}

impl TextStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            TextStrategy::Text => "text",
            TextStrategy::Label => "label",
            TextStrategy::Placeholder => "placeholder",
            TextStrategy::AltText => "altText",
            TextStrategy::Title => "title",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorStrategy {
    Css(String),
    TestId(String),
    Role {
        role: String,
        name: Option<String>,
        exact: bool,
    },
    Text {
        strategy: TextStrategy,
        value: String,
        exact: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    /// 0-based index into the match list; `None` means the first match.
    pub nth: Option<usize>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Css(selector.into()),
            nth: None,
        }
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Visible,
    Hidden,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitState::Attached => "attached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        })
    }
}

/// Page and locator operations used by the step executor.
///
/// Calls block until the browser has carried out the operation or the given
/// timeout elapses. Errors are driver-level failures and are surfaced to the
/// caller unchanged.
pub trait BrowserDriver {
    fn goto(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;
    fn go_back(&mut self, timeout: Duration) -> Result<()>;
    fn go_forward(&mut self, timeout: Duration) -> Result<()>;

    fn wait_for(&mut self, locator: &Locator, state: WaitState, timeout: Duration) -> Result<()>;
    fn scroll_into_view(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;
    fn bounding_box(&mut self, locator: &Locator) -> Result<Option<BoundingBox>>;
    fn text_content(&mut self, locator: &Locator) -> Result<Option<String>>;
    fn is_visible(&mut self, locator: &Locator) -> Result<bool>;

    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;
    fn hover(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;
    fn fill(&mut self, locator: &Locator, value: &str, timeout: Duration) -> Result<()>;
    fn set_checked(&mut self, locator: &Locator, checked: bool, timeout: Duration) -> Result<()>;
    fn select_option(&mut self, locator: &Locator, option: &str, timeout: Duration) -> Result<()>;
    fn set_input_files(
        &mut self,
        locator: &Locator,
        files: &[PathBuf],
        timeout: Duration,
    ) -> Result<()>;
    fn drag_to(&mut self, from: &Locator, to: &Locator, timeout: Duration) -> Result<()>;
    /// Smoothly scrolls the matched element's own content by `(dx, dy)`.
    fn scroll_element_by(&mut self, locator: &Locator, dx: f64, dy: f64) -> Result<()>;

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;
    fn add_style_tag(&mut self, css: &str) -> Result<()>;
    fn screenshot(&mut self, path: Option<&Path>) -> Result<Vec<u8>>;
    /// Full serialized DOM of the current page.
    fn content(&mut self) -> Result<String>;

    fn press_key(&mut self, key: &str) -> Result<()>;
    fn type_text(&mut self, text: &str, delay: Duration) -> Result<()>;
    fn wait_for_timeout(&mut self, duration: Duration) -> Result<()>;
}
