//! Expectation rule resolution.
//!
//! Every rule whose `when` clause matches `(project, module, active
//! requirements)` is a candidate; candidates reduce by a stable sort on
//! `(priority desc, id asc)` and the first wins. The tie-break on rule id
//! is arbitrary but stable, which keeps reordering a config file from
//! flipping verdicts. No match is the normal `Unmapped` outcome; a winning
//! rule that names an unregistered baseline is a setup defect and fatal.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use thiserror::Error;

use driftscan_types::{Expectation, ExpectationRule, Target, Thresholds};

/// Fatal resolution errors. `Unmapped` is not here on purpose; it is a
/// report outcome, not an error.
#[derive(Debug, Error)]
pub enum ExpectError {
    #[error("rule '{rule_id}' references unknown baseline '{baseline_id}'")]
    DanglingBaseline { rule_id: String, baseline_id: String },
}

/// Outcome of expectation resolution for one (project, module) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Expected(Expectation),
    Unmapped,
}

/// Does `rule` apply to this project, module, and requirement set?
pub fn rule_matches(
    rule: &ExpectationRule,
    project_id: &str,
    module_id: &str,
    active_requirements: &BTreeSet<String>,
) -> bool {
    let when = &rule.when;
    if !scope_matches(&when.projects, project_id) {
        return false;
    }
    if !scope_matches(&when.modules, module_id) {
        return false;
    }
    when.requires_all
        .iter()
        .all(|req| active_requirements.contains(req))
}

/// Empty scope matches everything; `"*"` is an explicit wildcard.
fn scope_matches(scope: &[String], id: &str) -> bool {
    scope.is_empty() || scope.iter().any(|s| s == "*" || s == id)
}

/// Resolve the expectation for one (project, module) pair.
///
/// `known_baselines` is the registry of configured baseline ids; a winning
/// rule pointing outside it aborts the run.
pub fn resolve(
    rules: &[ExpectationRule],
    project_id: &str,
    module_id: &str,
    active_requirements: &BTreeSet<String>,
    defaults: Thresholds,
    known_baselines: &BTreeSet<String>,
) -> Result<Resolution, ExpectError> {
    let mut matched: Vec<&ExpectationRule> = rules
        .iter()
        .filter(|rule| rule_matches(rule, project_id, module_id, active_requirements))
        .collect();
    matched.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let Some(winner) = matched.first() else {
        return Ok(Resolution::Unmapped);
    };

    if let Target::Baseline { baseline_id } = &winner.target {
        if !known_baselines.contains(baseline_id) {
            return Err(ExpectError::DanglingBaseline {
                rule_id: winner.id.clone(),
                baseline_id: baseline_id.clone(),
            });
        }
    }

    let overrides = winner.thresholds.unwrap_or_default();
    Ok(Resolution::Expected(Expectation {
        rule_id: winner.id.clone(),
        target: winner.target.clone(),
        thresholds: overrides.apply(defaults),
        thresholds_overridden: overrides.is_set(),
    }))
}
