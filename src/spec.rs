//! Demo spec data model.
//!
//! A spec is an ordered list of chapters, each holding an ordered list of
//! steps. Steps are numbered 0..N-1 across all chapters in document order
//! (the *flattened step index*); that numbering is the shared key between
//! narration pre-synthesis, playback waits and script generation, so every
//! caller walks steps through [`flatten_steps`] / [`narrated_steps`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("failed to read spec file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported spec extension \"{0}\" (supported: .json, .toml)")]
    UnsupportedExtension(String),
    #[error("spec file is empty: {0}")]
    Empty(PathBuf),
    #[error("failed to parse {format} in {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("invalid spec in {origin}:\n{}", format_issues(.issues))]
    Invalid { origin: String, issues: Vec<String> },
}

fn format_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSpec {
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redaction: Option<RedactionConfig>,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<SpecNarrationConfig>,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub title: String,
    #[serde(default)]
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Where the application under test is served. Process supervision of the
/// app itself happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionConfig {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pacing {
    pub cursor_duration_ms: u64,
    pub type_delay_ms: u64,
    pub post_click_delay_ms: u64,
    pub post_type_delay_ms: u64,
    pub post_navigate_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            cursor_duration_ms: 600,
            type_delay_ms: 50,
            post_click_delay_ms: 500,
            post_type_delay_ms: 300,
            post_navigate_delay_ms: 1000,
            settle_delay_ms: 200,
        }
    }
}

impl Pacing {
    /// All delays zeroed. Used when playback runs without visual pacing.
    pub const NONE: Pacing = Pacing {
        cursor_duration_ms: 0,
        type_delay_ms: 0,
        post_click_delay_ms: 0,
        post_type_delay_ms: 0,
        post_navigate_delay_ms: 0,
        settle_delay_ms: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    #[default]
    Manual,
    AutoSync,
    WarnOnly,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Manual => "manual",
            SyncMode::AutoSync => "auto-sync",
            SyncMode::WarnOnly => "warn-only",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SyncMode::Manual),
            "auto-sync" => Ok(SyncMode::AutoSync),
            "warn-only" => Ok(SyncMode::WarnOnly),
            other => Err(format!(
                "invalid narration sync mode \"{other}\" (expected: manual | auto-sync | warn-only)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SyncMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecNarrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<NarrationSyncConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    pub steps: Vec<Step>,
}

/// A single UI action plus its common options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    #[serde(flatten)]
    pub target: TargetInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            target: TargetInput::default(),
            narration: None,
            delay: None,
            timeout_ms: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.target.selector = Some(selector.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target.target = Some(target);
        self
    }

    pub fn with_nth(mut self, nth: usize) -> Self {
        self.target.nth = Some(nth);
        self
    }

    pub fn with_narration(mut self, text: impl Into<String>) -> Self {
        self.narration = Some(text.into());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Narration text, if the step carries a non-empty string. Recorded
    /// events and the narration timing map both key off this.
    pub fn narration_text(&self) -> Option<&str> {
        self.narration.as_deref().filter(|text| !text.is_empty())
    }

    /// The step's own post-step delay. Zero counts as "not set".
    pub fn delay_override(&self) -> Option<u64> {
        self.delay.filter(|ms| *ms > 0)
    }

    pub fn timeout_override(&self) -> Option<u64> {
        self.timeout_ms.filter(|ms| *ms > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
}

/// The closed set of step kinds. Payload fields live on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Navigate {
        url: String,
        #[serde(default)]
        wait_until: WaitUntil,
    },
    Click,
    Type {
        text: String,
        #[serde(default)]
        clear: bool,
    },
    Hover,
    Scroll {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    Wait {
        timeout: u64,
    },
    Assert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Press {
        key: String,
    },
    Back,
    Forward,
    Check,
    Uncheck,
    Select {
        option: String,
    },
    Upload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<String>,
    },
    DragAndDrop {
        from: TargetInput,
        to: TargetInput,
    },
}

impl Action {
    /// The action name as it appears in specs and event logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click => "click",
            Action::Type { .. } => "type",
            Action::Hover => "hover",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::Assert { .. } => "assert",
            Action::Screenshot { .. } => "screenshot",
            Action::Press { .. } => "press",
            Action::Back => "back",
            Action::Forward => "forward",
            Action::Check => "check",
            Action::Uncheck => "uncheck",
            Action::Select { .. } => "select",
            Action::Upload { .. } => "upload",
            Action::DragAndDrop { .. } => "dragAndDrop",
        }
    }

    /// Whether the step-level selector/target is mandatory for this action.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            Action::Click
                | Action::Type { .. }
                | Action::Hover
                | Action::Assert { .. }
                | Action::Check
                | Action::Uncheck
                | Action::Select { .. }
                | Action::Upload { .. }
        )
    }
}

/// Either a raw selector or a structured target, plus an optional
/// repetition index. Used for step targets and drag endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl TargetInput {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn is_specified(&self) -> bool {
        self.selector.as_deref().is_some_and(|s| !s.is_empty()) || self.target.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub by: TargetBy,
    pub value: String,
    /// Accessible name filter, only meaningful for `by: role`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl Target {
    pub fn new(by: TargetBy, value: impl Into<String>) -> Self {
        Self {
            by,
            value: value.into(),
            name: None,
            exact: None,
            nth: None,
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(TargetBy::Role, role)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetBy {
    Css,
    Text,
    Role,
    TestId,
    Label,
    Placeholder,
    AltText,
    Title,
}

impl TargetBy {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetBy::Css => "css",
            TargetBy::Text => "text",
            TargetBy::Role => "role",
            TargetBy::TestId => "testId",
            TargetBy::Label => "label",
            TargetBy::Placeholder => "placeholder",
            TargetBy::AltText => "altText",
            TargetBy::Title => "title",
        }
    }
}

/// A step together with its flattened index and owning chapter.
#[derive(Debug, Clone, Copy)]
pub struct FlatStep<'a> {
    pub index: usize,
    pub chapter: &'a Chapter,
    pub step: &'a Step,
}

/// Walks every step across all chapters in document order, numbering them
/// 0..N-1 whether or not they carry narration.
pub fn flatten_steps(chapters: &[Chapter]) -> impl Iterator<Item = FlatStep<'_>> {
    chapters
        .iter()
        .flat_map(|chapter| chapter.steps.iter().map(move |step| (chapter, step)))
        .enumerate()
        .map(|(index, (chapter, step))| FlatStep {
            index,
            chapter,
            step,
        })
}

/// A narrated step keyed by its flattened index.
#[derive(Debug, Clone, Copy)]
pub struct NarratedStep<'a> {
    pub index: usize,
    pub text: &'a str,
    pub step: &'a Step,
}

pub fn narrated_steps(chapters: &[Chapter]) -> impl Iterator<Item = NarratedStep<'_>> {
    flatten_steps(chapters).filter_map(|flat| {
        flat.step.narration_text().map(|text| NarratedStep {
            index: flat.index,
            text,
            step: flat.step,
        })
    })
}

pub fn total_steps(chapters: &[Chapter]) -> usize {
    chapters.iter().map(|chapter| chapter.steps.len()).sum()
}

impl DemoSpec {
    pub fn base_url(&self) -> &str {
        self.runner
            .as_ref()
            .map(|runner| runner.url.as_str())
            .unwrap_or("http://localhost:3000")
    }

    pub fn redaction_selectors(&self) -> &[String] {
        self.redaction
            .as_ref()
            .map(|r| r.selectors.as_slice())
            .unwrap_or_default()
    }

    pub fn secret_patterns(&self) -> &[String] {
        self.redaction
            .as_ref()
            .map(|r| r.secrets.as_slice())
            .unwrap_or_default()
    }

    /// Load-time checks. Missing targets are authoring bugs and are reported
    /// here rather than discovered mid-run.
    pub fn validate(&self, origin: &str) -> Result<(), SpecError> {
        let mut issues = Vec::new();

        if self.meta.title.trim().is_empty() {
            issues.push("meta.title: must not be empty".to_string());
        }
        if self.chapters.is_empty() {
            issues.push("chapters: at least one chapter is required".to_string());
        }

        for (ci, chapter) in self.chapters.iter().enumerate() {
            if chapter.title.trim().is_empty() {
                issues.push(format!("chapters.{ci}.title: must not be empty"));
            }
            if chapter.steps.is_empty() {
                issues.push(format!("chapters.{ci}.steps: at least one step is required"));
            }
            for (si, step) in chapter.steps.iter().enumerate() {
                let at = format!("chapters.{ci}.steps.{si}");
                if step.action.requires_target() && !step.target.is_specified() {
                    issues.push(format!(
                        "{at}: \"{}\" requires \"selector\" or \"target\"",
                        step.action.name()
                    ));
                }
                match &step.action {
                    Action::DragAndDrop { from, to } => {
                        if !from.is_specified() {
                            issues.push(format!("{at}.from: requires \"selector\" or \"target\""));
                        }
                        if !to.is_specified() {
                            issues.push(format!("{at}.to: requires \"selector\" or \"target\""));
                        }
                    }
                    Action::Upload { file, files } if file.is_none() && files.is_empty() => {
                        issues.push(format!("{at}: upload requires \"file\" or \"files\""));
                    }
                    Action::Wait { timeout: 0 } => {
                        issues.push(format!("{at}.timeout: must be positive"));
                    }
                    _ => {}
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SpecError::Invalid {
                origin: origin.to_string(),
                issues,
            })
        }
    }
}

/// Parses a spec from text in the given format and validates it.
pub fn parse_spec(raw: &str, format: SpecFormat, origin: &Path) -> Result<DemoSpec, SpecError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if raw.trim().is_empty() {
        return Err(SpecError::Empty(origin.to_path_buf()));
    }

    let spec: DemoSpec = match format {
        SpecFormat::Json => serde_json::from_str(raw).map_err(|e| SpecError::Parse {
            path: origin.to_path_buf(),
            format: "JSON",
            message: e.to_string(),
        })?,
        SpecFormat::Toml => toml::from_str(raw).map_err(|e| SpecError::Parse {
            path: origin.to_path_buf(),
            format: "TOML",
            message: e.to_string(),
        })?,
    };

    spec.validate(&origin.display().to_string())?;
    Ok(spec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Toml,
}

impl SpecFormat {
    pub fn from_path(path: &Path) -> Result<Self, SpecError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(SpecFormat::Json),
            "toml" => Ok(SpecFormat::Toml),
            _ => Err(SpecError::UnsupportedExtension(format!(".{ext}"))),
        }
    }
}

pub fn load_spec(path: &Path) -> Result<DemoSpec, SpecError> {
    let format = SpecFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spec(&raw, format, path)
}
