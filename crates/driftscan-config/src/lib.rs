//! Typed configuration bundle.
//!
//! A config directory holds six YAML documents, each stamped `version: 1`:
//! `projects.yml`, `modules.yml`, `baselines.yml`, `requirements.yml`,
//! `matrix.yml`, `expectations.yml`. Loading is strict: schema violations,
//! duplicate ids, threshold misordering, and unsupported source types are
//! all fatal here, before any analysis starts, so the pipeline downstream
//! can assume a valid bundle.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftscan_types::{ExpectationRule, ModuleSpec, Thresholds};

const SUPPORTED_VERSION: u32 = 1;

/// Fatal configuration errors. Every variant names enough context to find
/// the offending file or id.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory not found: {0}")]
    MissingDir(PathBuf),

    #[error("missing config file: {0}")]
    MissingFile(String),

    #[error("{file}: {source}")]
    Parse {
        file: String,
        source: serde_yaml::Error,
    },

    #[error("{file}: failed to read: {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },

    #[error("{file}: unsupported version {version} (expected 1)")]
    UnsupportedVersion { file: String, version: u32 },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{scope}: ok_threshold ({ok}) must be greater than warn_threshold ({warn})")]
    ThresholdOrder { scope: String, ok: f64, warn: f64 },

    #[error("{kind} '{id}': git sources are not supported by this build; \
             resolve the snapshot externally and point an fs source at it")]
    GitSourceUnsupported { kind: &'static str, id: String },

    #[error("expectations defaults name unknown default_baseline '{0}'")]
    UnknownDefaultBaseline(String),
}

/// Where a project or baseline snapshot comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    /// An already-materialized directory on disk.
    Fs { path: PathBuf },
    /// A git ref; kept in the schema as the seam for an external resolver,
    /// rejected at validation by this build.
    Git { repo: String, snapshot: SnapshotRef },
}

impl Source {
    /// Stable reference string for the run manifest.
    pub fn snapshot_ref(&self) -> String {
        match self {
            Source::Fs { path } => path.to_string_lossy().replace('\\', "/"),
            Source::Git { snapshot, .. } => snapshot.reference.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRequirement {
    pub id: String,
    #[serde(default)]
    pub must_have: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub id: String,
    #[serde(default)]
    pub requires: Vec<MatrixRequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectationDefaults {
    pub thresholds: Thresholds,
    /// The project-wide designated default baseline for the OK_BASELINE /
    /// OK_EXPECTED split. Unset means any baseline target counts.
    pub default_baseline: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectationsConfig {
    #[serde(default)]
    pub defaults: ExpectationDefaults,
    #[serde(default)]
    pub rules: Vec<ExpectationRule>,
}

/// The fully loaded, validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub projects: Vec<Project>,
    pub modules: Vec<ModuleSpec>,
    pub baselines: Vec<Baseline>,
    pub requirements: Vec<Requirement>,
    pub matrix: Vec<MatrixEntry>,
    pub expectations: ExpectationsConfig,
}

impl ConfigBundle {
    /// Active requirement ids for one project: the matrix entries marked
    /// `must_have`. A project without a matrix row has none.
    pub fn active_requirements(&self, project_id: &str) -> BTreeSet<String> {
        self.matrix
            .iter()
            .find(|entry| entry.id == project_id)
            .map(|entry| {
                entry
                    .requires
                    .iter()
                    .filter(|req| req.must_have)
                    .map(|req| req.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered baseline ids.
    pub fn baseline_ids(&self) -> BTreeSet<String> {
        self.baselines.iter().map(|b| b.id.clone()).collect()
    }

    pub fn baseline(&self, id: &str) -> Option<&Baseline> {
        self.baselines.iter().find(|b| b.id == id)
    }
}

// Per-file document wrappers. Every file carries its own version stamp.

#[derive(Deserialize)]
struct ProjectsDoc {
    version: u32,
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct ModulesDoc {
    version: u32,
    #[serde(default)]
    modules: Vec<ModuleSpec>,
}

#[derive(Deserialize)]
struct BaselinesDoc {
    version: u32,
    #[serde(default)]
    baselines: Vec<Baseline>,
}

#[derive(Deserialize)]
struct RequirementsDoc {
    version: u32,
    #[serde(default)]
    requirements: Vec<Requirement>,
}

#[derive(Deserialize)]
struct MatrixDoc {
    version: u32,
    #[serde(default)]
    projects: Vec<MatrixEntry>,
}

#[derive(Deserialize)]
struct ExpectationsDoc {
    version: u32,
    #[serde(default)]
    defaults: ExpectationDefaults,
    #[serde(default)]
    rules: Vec<ExpectationRule>,
}

fn read_doc<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T, ConfigError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(ConfigError::MissingFile(name.to_string()));
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        file: name.to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        file: name.to_string(),
        source,
    })
}

fn check_version(file: &str, version: u32) -> Result<(), ConfigError> {
    if version != SUPPORTED_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            file: file.to_string(),
            version,
        });
    }
    Ok(())
}

fn check_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn check_thresholds(scope: String, thresholds: Thresholds) -> Result<(), ConfigError> {
    if thresholds.ok_threshold <= thresholds.warn_threshold {
        return Err(ConfigError::ThresholdOrder {
            scope,
            ok: thresholds.ok_threshold,
            warn: thresholds.warn_threshold,
        });
    }
    Ok(())
}

fn check_source(kind: &'static str, id: &str, source: &Source) -> Result<(), ConfigError> {
    match source {
        Source::Fs { .. } => Ok(()),
        Source::Git { .. } => Err(ConfigError::GitSourceUnsupported {
            kind,
            id: id.to_string(),
        }),
    }
}

/// Load and validate the six-file bundle from `dir`.
pub fn load_bundle(dir: &Path) -> Result<ConfigBundle, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingDir(dir.to_path_buf()));
    }

    let projects: ProjectsDoc = read_doc(dir, "projects.yml")?;
    check_version("projects.yml", projects.version)?;
    let modules: ModulesDoc = read_doc(dir, "modules.yml")?;
    check_version("modules.yml", modules.version)?;
    let baselines: BaselinesDoc = read_doc(dir, "baselines.yml")?;
    check_version("baselines.yml", baselines.version)?;
    let requirements: RequirementsDoc = read_doc(dir, "requirements.yml")?;
    check_version("requirements.yml", requirements.version)?;
    let matrix: MatrixDoc = read_doc(dir, "matrix.yml")?;
    check_version("matrix.yml", matrix.version)?;
    let expectations: ExpectationsDoc = read_doc(dir, "expectations.yml")?;
    check_version("expectations.yml", expectations.version)?;

    let bundle = ConfigBundle {
        projects: projects.projects,
        modules: modules.modules,
        baselines: baselines.baselines,
        requirements: requirements.requirements,
        matrix: matrix.projects,
        expectations: ExpectationsConfig {
            defaults: expectations.defaults,
            rules: expectations.rules,
        },
    };
    validate(&bundle)?;
    Ok(bundle)
}

fn validate(bundle: &ConfigBundle) -> Result<(), ConfigError> {
    check_unique("project", bundle.projects.iter().map(|p| p.id.as_str()))?;
    check_unique("module", bundle.modules.iter().map(|m| m.id.as_str()))?;
    check_unique("baseline", bundle.baselines.iter().map(|b| b.id.as_str()))?;
    check_unique(
        "requirement",
        bundle.requirements.iter().map(|r| r.id.as_str()),
    )?;
    check_unique(
        "rule",
        bundle.expectations.rules.iter().map(|r| r.id.as_str()),
    )?;

    for project in &bundle.projects {
        check_source("project", &project.id, &project.source)?;
    }
    for baseline in &bundle.baselines {
        check_source("baseline", &baseline.id, &baseline.source)?;
    }

    let defaults = bundle.expectations.defaults.thresholds;
    check_thresholds("expectations defaults".to_string(), defaults)?;
    for rule in &bundle.expectations.rules {
        if let Some(overrides) = rule.thresholds {
            check_thresholds(format!("rule '{}'", rule.id), overrides.apply(defaults))?;
        }
    }

    if let Some(default_baseline) = &bundle.expectations.defaults.default_baseline {
        if bundle.baseline(default_baseline).is_none() {
            return Err(ConfigError::UnknownDefaultBaseline(default_baseline.clone()));
        }
    }

    Ok(())
}
