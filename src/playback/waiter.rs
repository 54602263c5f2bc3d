//! Post-step pacing, stretched (or just checked) against narration length.
//!
//! The waiter is predictive: it only looks at durations measured or
//! estimated before playback started, never at live audio progress.

use tracing::{info, warn};

use crate::narration::timing::NarrationTimingMap;
use crate::spec::{Action, Pacing, Step, SyncMode};

/// How long to pause, and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitPlan {
    /// Milliseconds to actually sleep.
    pub sleep_ms: u64,
    /// Lead-in the upcoming narration needs (0 when none applies).
    pub lead_in_ms: u64,
    /// How far the natural pause falls short of the lead-in.
    pub shortfall_ms: u64,
}

pub struct NarrationWaiter<'a> {
    pacing: Pacing,
    mode: SyncMode,
    buffer_ms: u64,
    timing: Option<&'a NarrationTimingMap>,
    total_steps: usize,
}

impl<'a> NarrationWaiter<'a> {
    pub fn new(
        pacing: Pacing,
        mode: SyncMode,
        buffer_ms: u64,
        timing: Option<&'a NarrationTimingMap>,
        total_steps: usize,
    ) -> Self {
        Self {
            pacing,
            mode,
            buffer_ms,
            timing,
            total_steps,
        }
    }

    fn required_lead_in(&self, index: usize) -> u64 {
        if self.mode == SyncMode::Manual || index >= self.total_steps {
            return 0;
        }
        self.timing
            .and_then(|t| t.get(&index))
            .map(|entry| entry.duration_ms + self.buffer_ms)
            .unwrap_or(0)
    }

    /// Pause before step 0. Only auto-sync sleeps; warn-only has no natural
    /// pre-delay slot so it just reports.
    pub fn before_first_step(&self) -> WaitPlan {
        let lead_in = self.required_lead_in(0);
        if lead_in == 0 {
            return WaitPlan::default();
        }
        match self.mode {
            SyncMode::AutoSync => {
                info!(lead_in_ms = lead_in, "auto-sync: waiting before first step for narration");
                WaitPlan {
                    sleep_ms: lead_in,
                    lead_in_ms: lead_in,
                    shortfall_ms: 0,
                }
            }
            SyncMode::WarnOnly => {
                warn!(
                    step_index = 0,
                    lead_in_ms = lead_in,
                    "narration needs lead-in but warn-only mode has no pre-step delay"
                );
                WaitPlan {
                    sleep_ms: 0,
                    lead_in_ms: lead_in,
                    shortfall_ms: lead_in,
                }
            }
            SyncMode::Manual => WaitPlan::default(),
        }
    }

    pub fn after_step(&self, index: usize, step: &Step) -> WaitPlan {
        let base = base_delay(step, &self.pacing);
        let lead_in = self.required_lead_in(index + 1);
        let available = base + self.pacing.settle_delay_ms;
        let shortfall = lead_in.saturating_sub(available);

        let sleep_ms = match self.mode {
            SyncMode::AutoSync if shortfall > 0 => {
                info!(
                    step_index = index,
                    delay_ms = base + shortfall,
                    base_ms = base,
                    settle_ms = self.pacing.settle_delay_ms,
                    lead_in_ms = lead_in,
                    "auto-sync: extended post-step delay"
                );
                base + shortfall
            }
            SyncMode::WarnOnly if shortfall > 0 => {
                warn!(
                    next_step = index + 1,
                    lead_in_ms = lead_in,
                    available_ms = available,
                    shortfall_ms = shortfall,
                    uncovered_ms = lead_in.saturating_sub(base),
                    "narration timing: next step's lead-in exceeds the configured delay"
                );
                base
            }
            _ => base,
        };

        WaitPlan {
            sleep_ms,
            lead_in_ms: lead_in,
            shortfall_ms: shortfall,
        }
    }
}

impl WaitPlan {
    /// Lead-in not covered by the sleep itself.
    pub fn uncovered_ms(&self) -> u64 {
        self.lead_in_ms.saturating_sub(self.sleep_ms)
    }
}

/// Pacing default for the step kind, or the step's own non-zero `delay`.
pub fn base_delay(step: &Step, pacing: &Pacing) -> u64 {
    let default = match step.action {
        Action::Navigate { .. } => pacing.post_navigate_delay_ms,
        Action::Type { .. } => pacing.post_type_delay_ms,
        Action::Click
        | Action::Hover
        | Action::Scroll { .. }
        | Action::Press { .. }
        | Action::Check
        | Action::Uncheck
        | Action::Select { .. }
        | Action::Upload { .. }
        | Action::DragAndDrop { .. }
        | Action::Back
        | Action::Forward => pacing.post_click_delay_ms,
        Action::Wait { .. } | Action::Assert { .. } | Action::Screenshot { .. } => 0,
    };
    step.delay_override().unwrap_or(default)
}
