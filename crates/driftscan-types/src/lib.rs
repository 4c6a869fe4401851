//! # driftscan-types
//!
//! **Tier 1 (Data Model)**
//!
//! Shared data model for the drift analysis pipeline. Every struct that
//! crosses a crate boundary or lands in a run folder document lives here.
//!
//! ## What belongs here
//! * Serde types for fingerprints, targets, rules, and run records
//! * The `DriftStatus` enum and its wire spelling
//! * Run folder document shapes (report, evidence, actions, manifest)
//!
//! ## What does NOT belong here
//! * Hashing or normalization logic (use driftscan-fingerprint)
//! * Rule evaluation (use driftscan-expect)
//! * I/O of any kind

use serde::{Deserialize, Serialize};

/// A single file as handed to the core: project-relative path plus raw bytes.
///
/// `content_id` is a stable external identifier (e.g. a VCS blob id) that the
/// cache may use to shortcut lookups. Immutable once discovered.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: String,
    pub content: Vec<u8>,
    pub content_id: Option<String>,
}

/// A named set of files within a project, defined by include/exclude globs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Language hint driving comment-syntax selection during normalization.
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Paths that require stricter diff visibility in evidence output.
    #[serde(default)]
    pub critical_files: Vec<String>,
}

/// Fingerprint of one file's normalized content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: String,
    /// Hex-encoded SHA-256 of the normalized text (64 chars).
    pub sha256_normalized: String,
    /// Locality-sensitive 64-bit digest of the normalized token stream.
    pub simhash64: u64,
    pub normalized_byte_length: u64,
}

/// Fingerprint of a whole module, derived from its path-sorted files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFingerprint {
    pub module_id: String,
    pub aggregate_sha256: String,
    pub aggregate_simhash64: u64,
    /// Constituent fingerprints, sorted by `path`.
    pub files: Vec<FileFingerprint>,
}

/// What a module is expected to resemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    /// A reference snapshot registered in the baseline registry.
    Baseline { baseline_id: String },
    /// A literal fingerprint written directly into the rule.
    Signature {
        sha256_normalized: String,
        simhash64: u64,
    },
}

/// Classification thresholds. Invariant: `ok_threshold > warn_threshold`,
/// enforced at config load, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub ok_threshold: f64,
    pub warn_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ok_threshold: 1.0,
            warn_threshold: 0.8,
        }
    }
}

/// Per-rule threshold overrides; unset fields fall back to defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverride {
    #[serde(default)]
    pub ok_threshold: Option<f64>,
    #[serde(default)]
    pub warn_threshold: Option<f64>,
}

impl ThresholdOverride {
    /// True when the rule actually overrides something.
    pub fn is_set(&self) -> bool {
        self.ok_threshold.is_some() || self.warn_threshold.is_some()
    }

    /// Apply this override on top of `defaults`.
    pub fn apply(&self, defaults: Thresholds) -> Thresholds {
        Thresholds {
            ok_threshold: self.ok_threshold.unwrap_or(defaults.ok_threshold),
            warn_threshold: self.warn_threshold.unwrap_or(defaults.warn_threshold),
        }
    }
}

/// Predicate deciding whether a rule applies to `(project, module, reqs)`.
///
/// Empty lists match everything; `"*"` is an explicit wildcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleWhen {
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    /// Every listed requirement must be active for the rule to match.
    #[serde(default)]
    pub requires_all: Vec<String>,
}

/// A priority-ordered predicate-to-target mapping. Higher priority wins;
/// ties break on ascending `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationRule {
    pub id: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub when: RuleWhen,
    pub target: Target,
    #[serde(default)]
    pub thresholds: Option<ThresholdOverride>,
}

/// Resolved expectation for one (project, module) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub rule_id: String,
    pub target: Target,
    pub thresholds: Thresholds,
    /// Whether the winning rule carried its own threshold override. Feeds the
    /// OK_BASELINE vs OK_EXPECTED distinction.
    pub thresholds_overridden: bool,
}

/// Per-module verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftStatus {
    /// Matches the project's designated default baseline.
    OkBaseline,
    /// Matches a specifically-expected, non-default target.
    OkExpected,
    /// Between the warn and ok thresholds.
    Warn,
    /// Below the warn threshold.
    DriftUnexpected,
    /// No expectation rule matched; a normal terminal outcome.
    Unmapped,
    /// The module resolved to zero files; a normal terminal outcome.
    Missing,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftStatus::OkBaseline => "OK_BASELINE",
            DriftStatus::OkExpected => "OK_EXPECTED",
            DriftStatus::Warn => "WARN",
            DriftStatus::DriftUnexpected => "DRIFT_UNEXPECTED",
            DriftStatus::Unmapped => "UNMAPPED",
            DriftStatus::Missing => "MISSING",
        }
    }
}

/// The atomic unit of `report.json`: one row per (project, module).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub project_id: String,
    pub module_id: String,
    pub status: DriftStatus,
    /// Similarity score in [0, 1], rounded to 4 decimals. Absent for the
    /// terminal MISSING / UNMAPPED outcomes.
    pub score: Option<f64>,
    pub expected_rule_id: Option<String>,
    pub target: Option<Target>,
    pub active_requirements: Vec<String>,
}

/// Per-module block of `evidence.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEvidence {
    pub module_id: String,
    pub files: Vec<FileFingerprint>,
    pub module_fingerprint: Option<ModuleFingerprint>,
    pub critical_files: Vec<String>,
    /// Configured critical paths the resolved file set did not contain.
    pub missing_critical_files: Vec<String>,
}

/// Per-project block of `evidence.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEvidence {
    pub project_id: String,
    pub snapshot_ref: String,
    pub modules: Vec<ModuleEvidence>,
}

/// One derived suggestion in `actions.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub project_id: String,
    pub module_id: String,
    pub status: DriftStatus,
    pub message: String,
}

/// Per-run cache counters. Stats only; correctness never depends on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub file_cache_hits: u64,
    pub file_cache_misses: u64,
    pub module_cache_hits: u64,
    pub module_cache_misses: u64,
}

/// Tool identity stamped into the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Project summary row inside the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestProject {
    pub id: String,
    pub title: String,
    pub snapshot_ref: String,
}

/// `run_manifest.json`. `generated_at` is the only intentionally
/// non-deterministic field in the whole run folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub generated_at: String,
    pub tool: ToolInfo,
    pub projects: Vec<ManifestProject>,
    pub reports: ReportIndex,
}

/// File names of the documents making up one run folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIndex {
    pub report: String,
    pub evidence: String,
    pub actions: String,
    pub cache_stats: String,
}

impl Default for ReportIndex {
    fn default() -> Self {
        Self {
            report: "report.json".to_string(),
            evidence: "evidence.json".to_string(),
            actions: "actions.json".to_string(),
            cache_stats: "cache_stats.json".to_string(),
        }
    }
}
