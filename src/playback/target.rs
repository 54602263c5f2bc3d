//! Target resolution: step selector/target -> driver locator + descriptor.

use crate::playback::driver::{Locator, LocatorStrategy, TextStrategy};
use crate::spec::{Action, Step, Target, TargetBy, TargetInput};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context} requires \"selector\" or \"target\"")]
pub struct TargetResolutionError {
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub locator: Locator,
    /// Stable human-readable form used in events and error messages.
    pub descriptor: String,
}

/// Resolves a selector/target pair. A non-empty raw selector wins over a
/// structured target. `context` names the step (or drag endpoint) in errors.
pub fn resolve_input(
    input: &TargetInput,
    context: &str,
) -> Result<ResolvedTarget, TargetResolutionError> {
    if let Some(selector) = input.selector.as_deref().filter(|s| !s.is_empty()) {
        let locator = Locator {
            strategy: LocatorStrategy::Css(selector.to_string()),
            nth: input.nth,
        };
        return Ok(ResolvedTarget {
            descriptor: with_nth(selector.to_string(), input.nth),
            locator,
        });
    }

    let target = input.target.as_ref().ok_or_else(|| TargetResolutionError {
        context: context.to_string(),
    })?;
    let nth = target.nth.or(input.nth);
    Ok(ResolvedTarget {
        locator: Locator {
            strategy: strategy_for(target),
            nth,
        },
        descriptor: with_nth(format!("target({})", describe_target(target)), nth),
    })
}

pub fn resolve_step(step: &Step) -> Result<ResolvedTarget, TargetResolutionError> {
    resolve_input(&step.target, &format!("Step \"{}\"", step.action.name()))
}

/// Descriptor for error reporting, computed without failing: drag steps
/// describe both endpoints, unresolvable targets render as `?`.
pub fn describe_step_target(step: &Step) -> Option<String> {
    match &step.action {
        Action::DragAndDrop { from, to } => {
            let from = resolve_input(from, "from")
                .map(|r| r.descriptor)
                .unwrap_or_else(|_| "from(?)".to_string());
            let to = resolve_input(to, "to")
                .map(|r| r.descriptor)
                .unwrap_or_else(|_| "to(?)".to_string());
            Some(format!("{from} -> {to}"))
        }
        Action::Navigate { url, .. } => Some(url.clone()),
        Action::Press { key } => Some(format!("key({key})")),
        _ if step.target.is_specified() => resolve_step(step).ok().map(|r| r.descriptor),
        _ => None,
    }
}

fn strategy_for(target: &Target) -> LocatorStrategy {
    let exact = target.exact.unwrap_or(false);
    let text = |strategy| LocatorStrategy::Text {
        strategy,
        value: target.value.clone(),
        exact,
    };
    match target.by {
        TargetBy::Css => LocatorStrategy::Css(target.value.clone()),
        TargetBy::TestId => LocatorStrategy::TestId(target.value.clone()),
        TargetBy::Role => LocatorStrategy::Role {
            role: target.value.clone(),
            name: target.name.clone().filter(|n| !n.is_empty()),
            exact,
        },
        TargetBy::Text => text(TextStrategy::Text),
        TargetBy::Label => text(TextStrategy::Label),
        TargetBy::Placeholder => text(TextStrategy::Placeholder),
        TargetBy::AltText => text(TextStrategy::AltText),
        TargetBy::Title => text(TextStrategy::Title),
    }
}

fn describe_target(target: &Target) -> String {
    let mut out = format!("{}:{}", target.by.as_str(), target.value);
    if let Some(name) = target.name.as_deref().filter(|n| !n.is_empty()) {
        out.push_str(&format!("[name=\"{}\"]", name.replace('"', "\\\"")));
    }
    if target.exact == Some(true) {
        out.push_str("[exact]");
    }
    out
}

fn with_nth(descriptor: String, nth: Option<usize>) -> String {
    match nth {
        Some(n) => format!("{descriptor}[nth={n}]"),
        None => descriptor,
    }
}
