//! Runs every chapter's steps in order against one driver.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::narration::timing::NarrationTimingMap;
use crate::playback::driver::BrowserDriver;
use crate::playback::executor::{ExecutorConfig, StepError, StepExecutor};
use crate::playback::target::describe_step_target;
use crate::playback::waiter::{NarrationWaiter, WaitPlan};
use crate::playback::{ActionEvent, now_ms};
use crate::spec::{Chapter, Pacing, Step, SyncMode, total_steps};

/// Narration timing the waiter paces against.
#[derive(Debug, Clone, Default)]
pub struct NarrationSync {
    pub mode: SyncMode,
    pub buffer_ms: u64,
    pub timing: NarrationTimingMap,
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub base_url: String,
    pub spec_dir: Option<PathBuf>,
    pub screenshot_dir: Option<PathBuf>,
    pub redaction_selectors: Vec<String>,
    pub secret_patterns: Vec<String>,
    /// `None` runs without pacing delays or the cursor overlay.
    pub pacing: Option<Pacing>,
    pub narration: Option<NarrationSync>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            spec_dir: None,
            screenshot_dir: None,
            redaction_selectors: Vec::new(),
            secret_patterns: Vec::new(),
            pacing: None,
            narration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackResult {
    pub events: Vec<ActionEvent>,
    pub duration_ms: u64,
    /// Epoch ms when playback began; the time base for events.
    pub start_timestamp: u64,
}

/// A failed step with everything needed for a post-mortem.
#[derive(Debug)]
pub struct PlaybackStepError {
    pub step_index: usize,
    pub chapter_title: String,
    pub step: Step,
    pub selector: String,
    /// Events completed before the failure.
    pub events: Vec<ActionEvent>,
    pub start_timestamp: u64,
    pub cause: StepError,
}

impl fmt::Display for PlaybackStepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Playback failed at step {} ({}): {} {}",
            self.step_index,
            self.chapter_title,
            self.step.action.name(),
            self.selector
        )
    }
}

impl std::error::Error for PlaybackStepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Step(Box<PlaybackStepError>),
    /// The caller's per-step callback failed; passed through untouched.
    #[error(transparent)]
    Callback(anyhow::Error),
    #[error("playback setup failed: {0:#}")]
    Setup(anyhow::Error),
}

impl PlaybackError {
    pub fn step_error(&self) -> Option<&PlaybackStepError> {
        match self {
            PlaybackError::Step(e) => Some(e),
            _ => None,
        }
    }
}

pub type StepCallback = Box<dyn FnMut(&ActionEvent) -> anyhow::Result<()> + Send>;

pub struct PlaybackEngine<D> {
    driver: D,
    options: PlaybackOptions,
    executor: StepExecutor,
    on_step_complete: Option<StepCallback>,
}

impl<D: BrowserDriver> PlaybackEngine<D> {
    pub fn new(driver: D, options: PlaybackOptions) -> Self {
        let executor = StepExecutor::new(ExecutorConfig {
            base_url: options.base_url.clone(),
            spec_dir: options.spec_dir.clone(),
            screenshot_dir: options.screenshot_dir.clone(),
            pacing: options.pacing.unwrap_or(Pacing::NONE),
            cursor: options.pacing.is_some(),
            redaction_selectors: options.redaction_selectors.clone(),
            secret_patterns: options.secret_patterns.clone(),
        });
        Self {
            driver,
            options,
            executor,
            on_step_complete: None,
        }
    }

    /// Called with each event right after its step succeeds. An error here
    /// aborts the run as-is.
    pub fn on_step_complete(
        mut self,
        callback: impl FnMut(&ActionEvent) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.on_step_complete = Some(Box::new(callback));
        self
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn execute(&mut self, chapters: &[Chapter]) -> Result<PlaybackResult, PlaybackError> {
        let mut events = Vec::new();
        let start_timestamp = now_ms();
        let pacing = self.options.pacing.unwrap_or(Pacing::NONE);
        let (mode, buffer_ms, timing) = match &self.options.narration {
            Some(n) => (n.mode, n.buffer_ms, Some(&n.timing)),
            None => (SyncMode::Manual, 0, None),
        };
        let waiter = NarrationWaiter::new(pacing, mode, buffer_ms, timing, total_steps(chapters));

        self.executor
            .apply_overlays(&mut self.driver)
            .map_err(PlaybackError::Setup)?;
        sleep(&mut self.driver, waiter.before_first_step()).map_err(PlaybackError::Setup)?;

        let mut index = 0;
        for chapter in chapters {
            info!(chapter = %chapter.title, "starting chapter");
            for step in &chapter.steps {
                let fail = |cause: StepError, events: &[ActionEvent]| {
                    PlaybackError::Step(Box::new(PlaybackStepError {
                        step_index: index,
                        chapter_title: chapter.title.clone(),
                        step: step.clone(),
                        selector: describe_step_target(step).unwrap_or_default(),
                        events: events.to_vec(),
                        start_timestamp,
                        cause,
                    }))
                };

                let event = match self.executor.execute(&mut self.driver, step) {
                    Ok(event) => event,
                    Err(cause) => {
                        warn!(step_index = index, error = %cause, "step failed");
                        return Err(fail(cause, &events));
                    }
                };
                events.push(event);

                if let Some(callback) = self.on_step_complete.as_mut()
                    && let Some(last) = events.last()
                {
                    callback(last).map_err(PlaybackError::Callback)?;
                }

                let plan = waiter.after_step(index, step);
                if let Err(e) = sleep(&mut self.driver, plan) {
                    return Err(fail(StepError::Driver(e), &events));
                }
                if pacing.settle_delay_ms > 0
                    && let Err(e) = self
                        .driver
                        .wait_for_timeout(Duration::from_millis(pacing.settle_delay_ms))
                {
                    return Err(fail(StepError::Driver(e), &events));
                }
                index += 1;
            }
        }

        let duration_ms = now_ms().saturating_sub(start_timestamp);
        info!(steps = events.len(), duration_ms, "playback complete");
        Ok(PlaybackResult {
            events,
            duration_ms,
            start_timestamp,
        })
    }
}

fn sleep<D: BrowserDriver>(driver: &mut D, plan: WaitPlan) -> anyhow::Result<()> {
    if plan.sleep_ms > 0 {
        driver.wait_for_timeout(Duration::from_millis(plan.sleep_ms))?;
    }
    Ok(())
}
