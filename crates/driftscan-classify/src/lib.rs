//! Drift status classification.
//!
//! `classify` is a pure function from resolution outcome, similarity score,
//! and effective thresholds to one of the six statuses. The MISSING and
//! UNMAPPED short-circuits come first; scoring only happens against a
//! resolved target. The OK split follows the configured default-baseline
//! policy: a passing module is OK_BASELINE only when it matched the
//! project's designated default baseline through a rule with no threshold
//! override, otherwise OK_EXPECTED.

#![forbid(unsafe_code)]

use driftscan_types::{Action, DriftStatus, Expectation, RunRecord, Target, Thresholds};

/// Resolution outcome for one (project, module) pair, as fed to `classify`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleResolution {
    /// Zero resolved files. Terminal; nothing was scored.
    Missing,
    /// No expectation rule matched. Terminal; nothing was scored.
    Unmapped,
    /// A target was resolved and scored.
    Scored {
        score: f64,
        thresholds: Thresholds,
        /// The matched target is the project's designated default baseline
        /// and the winning rule carried no threshold override.
        default_baseline: bool,
    },
}

/// Map a resolution outcome to its drift status.
pub fn classify(resolution: &ModuleResolution) -> DriftStatus {
    match resolution {
        ModuleResolution::Missing => DriftStatus::Missing,
        ModuleResolution::Unmapped => DriftStatus::Unmapped,
        ModuleResolution::Scored {
            score,
            thresholds,
            default_baseline,
        } => {
            if *score >= thresholds.ok_threshold {
                if *default_baseline {
                    DriftStatus::OkBaseline
                } else {
                    DriftStatus::OkExpected
                }
            } else if *score >= thresholds.warn_threshold {
                DriftStatus::Warn
            } else {
                DriftStatus::DriftUnexpected
            }
        }
    }
}

/// Default-baseline policy: with a configured default, only that baseline
/// counts; with none configured, any baseline target does. A rule-level
/// threshold override always demotes the match to OK_EXPECTED territory.
pub fn is_default_baseline(expectation: &Expectation, default_baseline: Option<&str>) -> bool {
    if expectation.thresholds_overridden {
        return false;
    }
    match &expectation.target {
        Target::Baseline { baseline_id } => {
            default_baseline.map_or(true, |id| id == baseline_id)
        }
        Target::Signature { .. } => false,
    }
}

/// Suggested follow-up per finding status. OK statuses produce no action.
fn action_message(status: DriftStatus) -> Option<&'static str> {
    match status {
        DriftStatus::Warn | DriftStatus::DriftUnexpected => {
            Some("Review drift against the expected target and update the expectation or baseline.")
        }
        DriftStatus::Unmapped => {
            Some("No expectation rule matched; add a rule or mark the module out of scope.")
        }
        DriftStatus::Missing => {
            Some("Module resolved zero files; check its include/exclude patterns.")
        }
        DriftStatus::OkBaseline | DriftStatus::OkExpected => None,
    }
}

/// Derive `actions.json` content from report records. Pure and
/// order-preserving, so it can run in the analyzer or lazily in a viewer.
pub fn derive_actions(records: &[RunRecord]) -> Vec<Action> {
    records
        .iter()
        .filter_map(|record| {
            action_message(record.status).map(|message| Action {
                project_id: record.project_id.clone(),
                module_id: record.module_id.clone(),
                status: record.status,
                message: message.to_string(),
            })
        })
        .collect()
}
