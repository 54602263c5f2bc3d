//! Executes a single step against the driver and records what happened.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::playback::driver::{BoundingBox, BrowserDriver, Locator, WaitState};
use crate::playback::target::{ResolvedTarget, TargetResolutionError, resolve_input, resolve_step};
use crate::playback::{ActionEvent, now_ms, overlays, visuals};
use crate::spec::{Action, Pacing, Step, WaitUntil};

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const ASSERT_POLL_MS: u64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Target(#[from] TargetResolutionError),
    #[error("assertion failed: \"{expected}\" not found in {target}")]
    AssertionFailed { expected: String, target: String },
    #[error("invalid screenshot name (path separators not allowed): {0}")]
    InvalidScreenshotName(String),
    #[error("cannot resolve url \"{url}\" against {base}: {source}")]
    InvalidUrl {
        url: String,
        base: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub base_url: String,
    /// Relative upload paths resolve against this directory.
    pub spec_dir: Option<PathBuf>,
    pub screenshot_dir: Option<PathBuf>,
    pub pacing: Pacing,
    /// Cursor overlay and animated movement. Off when playback runs unpaced.
    pub cursor: bool,
    pub redaction_selectors: Vec<String>,
    pub secret_patterns: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            spec_dir: None,
            screenshot_dir: None,
            pacing: Pacing::NONE,
            cursor: false,
            redaction_selectors: Vec::new(),
            secret_patterns: Vec::new(),
        }
    }
}

pub struct StepExecutor {
    config: ExecutorConfig,
    cursor: (f64, f64),
}

/// Action start time, in both clocks.
struct Started {
    timestamp: u64,
    at: Instant,
}

impl Started {
    fn now() -> Self {
        Self {
            timestamp: now_ms(),
            at: Instant::now(),
        }
    }

    fn event(
        self,
        step: &Step,
        selector: Option<String>,
        bounding_box: Option<BoundingBox>,
    ) -> ActionEvent {
        ActionEvent {
            action: step.action.name().to_string(),
            selector,
            timestamp: self.timestamp,
            bounding_box,
            duration: self.at.elapsed().as_millis() as u64,
            narration: step.narration_text().map(String::from),
        }
    }
}

impl StepExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cursor: (0.0, 0.0),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor
    }

    /// Redaction blur plus, when enabled, the cursor overlay. Neither survives
    /// a page load.
    pub fn apply_overlays(&self, driver: &mut dyn BrowserDriver) -> anyhow::Result<()> {
        overlays::apply_redaction(driver, &self.config.redaction_selectors)?;
        if self.config.cursor {
            overlays::inject_cursor(driver)?;
        }
        Ok(())
    }

    pub fn execute(
        &mut self,
        driver: &mut dyn BrowserDriver,
        step: &Step,
    ) -> Result<ActionEvent, StepError> {
        let started = Started::now();
        let timeout = Duration::from_millis(step.timeout_override().unwrap_or(DEFAULT_TIMEOUT_MS));

        match &step.action {
            Action::Navigate { url, wait_until } => {
                self.navigate(driver, url, *wait_until, timeout)?;
                let event = started.event(step, None, None);
                overlays::check_secrets(driver, &self.config.secret_patterns);
                Ok(event)
            }
            Action::Click => {
                let target = resolve_step(step)?;
                ensure_ready(driver, &target.locator, timeout)?;
                let bbox = driver.bounding_box(&target.locator)?;
                self.move_cursor_to(driver, bbox)?;
                highlight(driver, bbox);
                cosmetic(driver, visuals::CLICK_PULSE_JS);
                if let Some(b) = &bbox {
                    cosmetic(driver, &visuals::ripple_script(b));
                }
                driver.click(&target.locator, timeout)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Type { text, clear } => {
                let target = resolve_step(step)?;
                let bbox = self.prepare(driver, &target, timeout)?;
                if *clear {
                    driver.fill(&target.locator, "", timeout)?;
                }
                driver.click(&target.locator, timeout)?;
                driver.type_text(text, Duration::from_millis(self.config.pacing.type_delay_ms))?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Hover => {
                let target = resolve_step(step)?;
                let bbox = self.prepare(driver, &target, timeout)?;
                driver.hover(&target.locator, timeout)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Scroll { x, y } => {
                if !step.target.is_specified() {
                    driver.evaluate(&format!(
                        "window.scrollBy({{ left: {x}, top: {y}, behavior: 'smooth' }})"
                    ))?;
                    return Ok(started.event(step, None, None));
                }
                let target = resolve_step(step)?;
                driver.wait_for(&target.locator, WaitState::Attached, timeout)?;
                driver.scroll_into_view(&target.locator, timeout)?;
                let bbox = driver.bounding_box(&target.locator)?;
                self.move_cursor_to(driver, bbox)?;
                highlight(driver, bbox);
                driver.scroll_element_by(&target.locator, *x, *y)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Wait { timeout: ms } => {
                driver.wait_for_timeout(Duration::from_millis(*ms))?;
                Ok(started.event(step, None, None))
            }
            Action::Assert { visible, text } => {
                let target = resolve_step(step)?;
                if let Some(visible) = visible {
                    let state = if *visible {
                        WaitState::Visible
                    } else {
                        WaitState::Hidden
                    };
                    driver.wait_for(&target.locator, state, timeout)?;
                }
                if let Some(expected) = text {
                    poll_text(driver, &target, expected, timeout)?;
                }
                let bbox = driver.bounding_box(&target.locator)?;
                highlight(driver, bbox);
                Ok(started.event(step, Some(target.descriptor), None))
            }
            Action::Screenshot { name } => {
                let path = match name {
                    Some(name) if name.contains(['/', '\\']) => {
                        return Err(StepError::InvalidScreenshotName(name.clone()));
                    }
                    Some(name) => Some(match &self.config.screenshot_dir {
                        Some(dir) => dir.join(name),
                        None => PathBuf::from(name),
                    }),
                    None => None,
                };
                driver.screenshot(path.as_deref())?;
                Ok(started.event(step, None, None))
            }
            Action::Press { key } => {
                driver.press_key(key)?;
                let selector = step
                    .target
                    .is_specified()
                    .then(|| resolve_step(step).ok().map(|r| r.descriptor))
                    .flatten();
                Ok(started.event(step, selector, None))
            }
            Action::Back => {
                driver.go_back(timeout)?;
                Ok(started.event(step, None, None))
            }
            Action::Forward => {
                driver.go_forward(timeout)?;
                Ok(started.event(step, None, None))
            }
            Action::Check | Action::Uncheck => {
                let target = resolve_step(step)?;
                let bbox = self.prepare(driver, &target, timeout)?;
                driver.set_checked(&target.locator, matches!(step.action, Action::Check), timeout)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Select { option } => {
                let target = resolve_step(step)?;
                let bbox = self.prepare(driver, &target, timeout)?;
                driver.select_option(&target.locator, option, timeout)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::Upload { file, files } => {
                let target = resolve_step(step)?;
                driver.wait_for(&target.locator, WaitState::Attached, timeout)?;
                let paths = self.upload_paths(file.as_deref(), files);
                let bbox = driver.bounding_box(&target.locator)?;
                self.move_cursor_to(driver, bbox)?;
                highlight(driver, bbox);
                driver.set_input_files(&target.locator, &paths, timeout)?;
                Ok(started.event(step, Some(target.descriptor), bbox))
            }
            Action::DragAndDrop { from, to } => {
                let from = resolve_input(from, "Step \"dragAndDrop.from\"")?;
                let to = resolve_input(to, "Step \"dragAndDrop.to\"")?;
                ensure_ready(driver, &from.locator, timeout)?;
                ensure_ready(driver, &to.locator, timeout)?;
                let bbox = driver.bounding_box(&from.locator)?;
                self.move_cursor_to(driver, bbox)?;
                highlight(driver, bbox);
                driver.drag_to(&from.locator, &to.locator, timeout)?;
                let selector = format!("{} -> {}", from.descriptor, to.descriptor);
                Ok(started.event(step, Some(selector), bbox))
            }
        }
    }

    fn navigate(
        &mut self,
        driver: &mut dyn BrowserDriver,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), StepError> {
        let invalid = |source| StepError::InvalidUrl {
            url: url.to_string(),
            base: self.config.base_url.clone(),
            source,
        };
        let resolved = Url::parse(&self.config.base_url)
            .and_then(|base| base.join(url))
            .map_err(invalid)?;
        driver.goto(resolved.as_str(), wait_until, timeout)?;
        self.apply_overlays(driver)?;
        Ok(())
    }

    /// Interactive preamble: ready the target, move the cursor, highlight.
    fn prepare(
        &mut self,
        driver: &mut dyn BrowserDriver,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Option<BoundingBox>, StepError> {
        ensure_ready(driver, &target.locator, timeout)?;
        let bbox = driver.bounding_box(&target.locator)?;
        self.move_cursor_to(driver, bbox)?;
        highlight(driver, bbox);
        Ok(bbox)
    }

    fn move_cursor_to(
        &mut self,
        driver: &mut dyn BrowserDriver,
        bbox: Option<BoundingBox>,
    ) -> anyhow::Result<()> {
        let Some(b) = bbox else { return Ok(()) };
        let duration = self.config.pacing.cursor_duration_ms;
        if !self.config.cursor || duration == 0 {
            return Ok(());
        }
        let to = b.center();
        cosmetic(driver, &visuals::move_cursor_script(self.cursor, to, duration));
        driver.wait_for_timeout(Duration::from_millis(duration))?;
        self.cursor = to;
        Ok(())
    }

    fn upload_paths(&self, file: Option<&str>, files: &[String]) -> Vec<PathBuf> {
        let raw: Vec<&str> = if files.is_empty() {
            file.into_iter().collect()
        } else {
            files.iter().map(String::as_str).collect()
        };
        raw.into_iter()
            .map(|p| match &self.config.spec_dir {
                Some(dir) if Path::new(p).is_relative() => dir.join(p),
                _ => PathBuf::from(p),
            })
            .collect()
    }
}

fn ensure_ready(
    driver: &mut dyn BrowserDriver,
    locator: &Locator,
    timeout: Duration,
) -> anyhow::Result<()> {
    driver.wait_for(locator, WaitState::Attached, timeout)?;
    driver.scroll_into_view(locator, timeout)?;
    driver.wait_for(locator, WaitState::Visible, timeout)?;
    Ok(())
}

/// Polls text content until it contains `expected`. Bounded both by wall
/// clock and by attempt count, so a driver whose sleeps return immediately
/// still gives up.
fn poll_text(
    driver: &mut dyn BrowserDriver,
    target: &ResolvedTarget,
    expected: &str,
    timeout: Duration,
) -> Result<(), StepError> {
    let deadline = Instant::now() + timeout;
    let attempts = (timeout.as_millis() as u64 / ASSERT_POLL_MS).max(1);
    for attempt in 0..=attempts {
        let content = driver.text_content(&target.locator)?;
        if content.as_deref().is_some_and(|c| c.contains(expected)) {
            return Ok(());
        }
        if attempt == attempts || Instant::now() >= deadline {
            break;
        }
        driver.wait_for_timeout(Duration::from_millis(ASSERT_POLL_MS))?;
    }
    Err(StepError::AssertionFailed {
        expected: expected.to_string(),
        target: target.descriptor.clone(),
    })
}

fn highlight(driver: &mut dyn BrowserDriver, bbox: Option<BoundingBox>) {
    if let Some(b) = &bbox {
        cosmetic(driver, &visuals::spotlight_script(b));
        cosmetic(driver, &visuals::focus_script(b));
    }
}

fn cosmetic(driver: &mut dyn BrowserDriver, script: &str) {
    if let Err(e) = driver.evaluate(script) {
        debug!(error = %e, "visual feedback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Target, TargetBy, TargetInput};
    use anyhow::anyhow;
    use std::collections::VecDeque;

    /// Records calls; text content answers are scripted.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        texts: VecDeque<Option<String>>,
        bbox: Option<BoundingBox>,
        fail_evaluate: bool,
    }

    impl BrowserDriver for Recorder {
        fn goto(&mut self, url: &str, _: WaitUntil, _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("goto {url}"));
            Ok(())
        }
        fn go_back(&mut self, _: Duration) -> anyhow::Result<()> {
            self.calls.push("back".into());
            Ok(())
        }
        fn go_forward(&mut self, _: Duration) -> anyhow::Result<()> {
            self.calls.push("forward".into());
            Ok(())
        }
        fn wait_for(&mut self, _: &Locator, state: WaitState, _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("wait_for {state}"));
            Ok(())
        }
        fn scroll_into_view(&mut self, _: &Locator, _: Duration) -> anyhow::Result<()> {
            self.calls.push("scroll_into_view".into());
            Ok(())
        }
        fn bounding_box(&mut self, _: &Locator) -> anyhow::Result<Option<BoundingBox>> {
            Ok(self.bbox)
        }
        fn text_content(&mut self, _: &Locator) -> anyhow::Result<Option<String>> {
            Ok(self.texts.pop_front().flatten())
        }
        fn is_visible(&mut self, _: &Locator) -> anyhow::Result<bool> {
            Ok(true)
        }
        fn click(&mut self, _: &Locator, _: Duration) -> anyhow::Result<()> {
            self.calls.push("click".into());
            Ok(())
        }
        fn hover(&mut self, _: &Locator, _: Duration) -> anyhow::Result<()> {
            self.calls.push("hover".into());
            Ok(())
        }
        fn fill(&mut self, _: &Locator, value: &str, _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("fill {value:?}"));
            Ok(())
        }
        fn set_checked(&mut self, _: &Locator, checked: bool, _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("set_checked {checked}"));
            Ok(())
        }
        fn select_option(&mut self, _: &Locator, option: &str, _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("select {option}"));
            Ok(())
        }
        fn set_input_files(&mut self, _: &Locator, files: &[PathBuf], _: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("files {files:?}"));
            Ok(())
        }
        fn drag_to(&mut self, _: &Locator, _: &Locator, _: Duration) -> anyhow::Result<()> {
            self.calls.push("drag".into());
            Ok(())
        }
        fn scroll_element_by(&mut self, _: &Locator, dx: f64, dy: f64) -> anyhow::Result<()> {
            self.calls.push(format!("scroll_by {dx},{dy}"));
            Ok(())
        }
        fn evaluate(&mut self, script: &str) -> anyhow::Result<serde_json::Value> {
            if self.fail_evaluate {
                return Err(anyhow!("page crashed"));
            }
            if script.contains("window.scrollBy") {
                self.calls.push("window_scroll".into());
            }
            Ok(serde_json::Value::Null)
        }
        fn add_style_tag(&mut self, _: &str) -> anyhow::Result<()> {
            self.calls.push("style".into());
            Ok(())
        }
        fn screenshot(&mut self, path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
            self.calls.push(format!("screenshot {path:?}"));
            Ok(Vec::new())
        }
        fn content(&mut self) -> anyhow::Result<String> {
            Ok(String::new())
        }
        fn press_key(&mut self, key: &str) -> anyhow::Result<()> {
            self.calls.push(format!("press {key}"));
            Ok(())
        }
        fn type_text(&mut self, text: &str, delay: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("type {text} {}", delay.as_millis()));
            Ok(())
        }
        fn wait_for_timeout(&mut self, d: Duration) -> anyhow::Result<()> {
            self.calls.push(format!("sleep {}", d.as_millis()));
            Ok(())
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
        }
    }

    #[test]
    fn click_waits_then_animates_then_clicks() {
        let mut driver = Recorder {
            bbox: Some(bbox()),
            ..Recorder::default()
        };
        let mut exec = StepExecutor::new(ExecutorConfig {
            pacing: Pacing::default(),
            cursor: true,
            ..ExecutorConfig::default()
        });
        let step = Step::new(Action::Click).with_selector("#save");
        let event = exec.execute(&mut driver, &step).unwrap();

        assert_eq!(
            driver.calls,
            vec![
                "wait_for attached",
                "scroll_into_view",
                "wait_for visible",
                "sleep 600",
                "click"
            ]
        );
        assert_eq!(event.action, "click");
        assert_eq!(event.selector.as_deref(), Some("#save"));
        assert_eq!(event.bounding_box, Some(bbox()));
        assert_eq!(exec.cursor_position(), (60.0, 40.0));
    }

    #[test]
    fn cursor_is_skipped_without_pacing_or_box() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig {
            pacing: Pacing::default(),
            cursor: true,
            ..ExecutorConfig::default()
        });
        exec.execute(&mut driver, &Step::new(Action::Hover).with_selector("a"))
            .unwrap();
        assert!(!driver.calls.iter().any(|c| c.starts_with("sleep")));
    }

    #[test]
    fn visual_feedback_failures_do_not_fail_the_step() {
        let mut driver = Recorder {
            bbox: Some(bbox()),
            fail_evaluate: true,
            ..Recorder::default()
        };
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let step = Step::new(Action::Click).with_target(Target::role("button", "Go"));
        let event = exec.execute(&mut driver, &step).unwrap();
        assert_eq!(event.selector.as_deref(), Some("target(role:button[name=\"Go\"])"));
    }

    #[test]
    fn navigate_resolves_relative_urls_and_reapplies_overlays() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig {
            base_url: "http://localhost:4000/app/".into(),
            redaction_selectors: vec![".secret".into()],
            ..ExecutorConfig::default()
        });
        let step = Step::new(Action::Navigate {
            url: "settings?tab=1".into(),
            wait_until: WaitUntil::Load,
        });
        let event = exec.execute(&mut driver, &step).unwrap();
        assert_eq!(
            driver.calls,
            vec!["goto http://localhost:4000/app/settings?tab=1", "style"]
        );
        assert_eq!(event.selector, None);
    }

    #[test]
    fn type_clears_clicks_and_types_with_pacing_delay() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig {
            pacing: Pacing::default(),
            ..ExecutorConfig::default()
        });
        let step = Step::new(Action::Type {
            text: "hello".into(),
            clear: true,
        })
        .with_selector("#name");
        exec.execute(&mut driver, &step).unwrap();
        assert_eq!(&driver.calls[3..], &["fill \"\"", "click", "type hello 50"]);
    }

    #[test]
    fn assert_polls_until_text_appears() {
        let mut driver = Recorder {
            texts: VecDeque::from(vec![None, Some("Loading".into()), Some("Saved!".into())]),
            ..Recorder::default()
        };
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let step = Step::new(Action::Assert {
            visible: None,
            text: Some("Saved".into()),
        })
        .with_selector(".toast");
        let event = exec.execute(&mut driver, &step).unwrap();
        assert_eq!(driver.calls, vec!["sleep 200", "sleep 200"]);
        assert_eq!(event.bounding_box, None);
    }

    #[test]
    fn assert_gives_up_after_timeout_attempts() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let step = Step::new(Action::Assert {
            visible: Some(true),
            text: Some("never".into()),
        })
        .with_selector("h1")
        .with_timeout(1000);
        let err = exec.execute(&mut driver, &step).unwrap_err();
        assert_eq!(err.to_string(), "assertion failed: \"never\" not found in h1");
        assert_eq!(driver.calls[0], "wait_for visible");
        assert_eq!(driver.calls.iter().filter(|c| *c == "sleep 200").count(), 5);
    }

    #[test]
    fn screenshot_names_cannot_be_paths() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig {
            screenshot_dir: Some(PathBuf::from("out")),
            ..ExecutorConfig::default()
        });
        let bad = Step::new(Action::Screenshot {
            name: Some("../x.png".into()),
        });
        assert!(matches!(
            exec.execute(&mut driver, &bad),
            Err(StepError::InvalidScreenshotName(_))
        ));
        let good = Step::new(Action::Screenshot {
            name: Some("home.png".into()),
        });
        exec.execute(&mut driver, &good).unwrap();
        assert_eq!(driver.calls, vec![format!("screenshot {:?}", Some(Path::new("out/home.png")))]);
    }

    #[test]
    fn upload_waits_for_attached_only_and_resolves_paths() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig {
            spec_dir: Some(PathBuf::from("/specs")),
            ..ExecutorConfig::default()
        });
        let step = Step::new(Action::Upload {
            file: Some("a.txt".into()),
            files: Vec::new(),
        })
        .with_selector("input[type=file]");
        exec.execute(&mut driver, &step).unwrap();
        assert_eq!(driver.calls[0], "wait_for attached");
        assert!(!driver.calls.contains(&"wait_for visible".to_string()));
        assert!(driver.calls[1].contains("/specs/a.txt"));
    }

    #[test]
    fn drag_and_drop_descriptor_joins_endpoints() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let step = Step::new(Action::DragAndDrop {
            from: TargetInput::selector("#card"),
            to: TargetInput {
                target: Some(Target::new(TargetBy::TestId, "done")),
                ..TargetInput::default()
            },
        });
        let event = exec.execute(&mut driver, &step).unwrap();
        assert_eq!(event.selector.as_deref(), Some("#card -> target(testId:done)"));
        assert_eq!(driver.calls.last().map(String::as_str), Some("drag"));
    }

    #[test]
    fn scroll_without_target_scrolls_the_window() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let window = Step::new(Action::Scroll { x: 0.0, y: 400.0 });
        exec.execute(&mut driver, &window).unwrap();
        let element = Step::new(Action::Scroll { x: 0.0, y: 120.0 }).with_selector(".list");
        let event = exec.execute(&mut driver, &element).unwrap();
        assert_eq!(driver.calls[0], "window_scroll");
        assert_eq!(driver.calls.last().map(String::as_str), Some("scroll_by 0,120"));
        assert_eq!(event.selector.as_deref(), Some(".list"));
    }

    #[test]
    fn events_carry_narration_only_when_non_empty() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let press = || Step::new(Action::Press { key: "Enter".into() });

        let event = exec.execute(&mut driver, &press().with_narration("")).unwrap();
        assert_eq!(event.narration, None);
        let event = exec.execute(&mut driver, &press().with_narration(" ")).unwrap();
        assert_eq!(event.narration.as_deref(), Some(" "));
    }

    #[test]
    fn missing_target_surfaces_resolution_error() {
        let mut driver = Recorder::default();
        let mut exec = StepExecutor::new(ExecutorConfig::default());
        let err = exec.execute(&mut driver, &Step::new(Action::Check)).unwrap_err();
        assert!(matches!(err, StepError::Target(_)));
        assert!(driver.calls.is_empty());
    }
}
