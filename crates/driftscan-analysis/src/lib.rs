//! The analysis pipeline.
//!
//! Data flows strictly left to right: resolved files, normalized text, file
//! fingerprints (cached), module fingerprint (cached), similarity against
//! the resolved target, classification. Per-file work has no cross-file
//! dependency and fans out across worker threads; module aggregation is the
//! barrier that waits for every constituent. The cache is the only shared
//! mutable resource.
//!
//! Fatal errors (dangling baseline, broken cache store, unreadable
//! snapshot) surface as `Err` before the caller writes any output, so a
//! failed run never leaves a partial report. Per-module terminal states
//! (`MISSING`, `UNMAPPED`) are ordinary records, not errors.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use driftscan_aggregate::{aggregate, module_cache_key};
use driftscan_cache::{CacheError, CacheStore, CachedFile, CachedModule};
use driftscan_classify::{classify, derive_actions, is_default_baseline, ModuleResolution};
use driftscan_config::{Baseline, ConfigBundle, Project};
use driftscan_expect::{ExpectError, Resolution};
use driftscan_fingerprint::{fingerprint_file, sha256_hex, similarity};
use driftscan_normalize::normalize;
use driftscan_resolve::{missing_critical_files, resolve_module, snapshot_files};
use driftscan_types::{
    Action, CacheStatsSnapshot, DriftStatus, FileFingerprint, ManifestProject, ModuleEvidence,
    ModuleFingerprint, ModuleSpec, ProjectEvidence, ResolvedFile, RunRecord, Target,
};

/// Fatal pipeline errors. Anything here aborts the run with no output.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Expect(#[from] ExpectError),

    #[error("failed to resolve snapshot for {kind} '{id}': {reason:#}")]
    Snapshot {
        kind: &'static str,
        id: String,
        reason: anyhow::Error,
    },

    #[error("module '{module_id}': {reason:#}")]
    ModuleResolve {
        module_id: String,
        reason: anyhow::Error,
    },
}

/// Everything one run produces, before serialization.
#[derive(Debug)]
pub struct AnalysisOutput {
    /// Sorted by (project_id, module_id).
    pub records: Vec<RunRecord>,
    /// Sorted by project_id, modules sorted by module_id.
    pub evidence: Vec<ProjectEvidence>,
    pub actions: Vec<Action>,
    pub cache_stats: CacheStatsSnapshot,
    pub projects: Vec<ManifestProject>,
}

/// Run the full pipeline over every configured project.
pub fn analyze(bundle: &ConfigBundle, cache: &CacheStore) -> Result<AnalysisOutput, AnalysisError> {
    let mut projects: Vec<&Project> = bundle.projects.iter().collect();
    projects.sort_by(|a, b| a.id.cmp(&b.id));

    let mut modules: Vec<&ModuleSpec> = bundle.modules.iter().collect();
    modules.sort_by(|a, b| a.id.cmp(&b.id));

    let known_baselines = bundle.baseline_ids();
    let mut baseline_fps = BaselineFingerprints::default();

    let mut records = Vec::new();
    let mut evidence = Vec::new();
    let mut manifest_projects = Vec::new();

    for project in &projects {
        let files = load_snapshot("project", &project.id, &project.source)?;
        let active = bundle.active_requirements(&project.id);
        let active_sorted: Vec<String> = active.iter().cloned().collect();

        let mut module_evidence = Vec::new();

        for spec in &modules {
            let outcome = analyze_module(
                bundle,
                cache,
                &mut baseline_fps,
                &known_baselines,
                project,
                spec,
                &files,
                &active,
            )?;

            records.push(RunRecord {
                project_id: project.id.clone(),
                module_id: spec.id.clone(),
                status: outcome.status,
                score: outcome.score,
                expected_rule_id: outcome.expected_rule_id,
                target: outcome.target,
                active_requirements: active_sorted.clone(),
            });
            module_evidence.push(outcome.evidence);
        }

        evidence.push(ProjectEvidence {
            project_id: project.id.clone(),
            snapshot_ref: project.source.snapshot_ref(),
            modules: module_evidence,
        });
        manifest_projects.push(ManifestProject {
            id: project.id.clone(),
            title: project.title.clone(),
            snapshot_ref: project.source.snapshot_ref(),
        });
    }

    let actions = derive_actions(&records);
    Ok(AnalysisOutput {
        records,
        evidence,
        actions,
        cache_stats: cache.stats(),
        projects: manifest_projects,
    })
}

struct ModuleOutcome {
    status: DriftStatus,
    score: Option<f64>,
    expected_rule_id: Option<String>,
    target: Option<Target>,
    evidence: ModuleEvidence,
}

#[allow(clippy::too_many_arguments)]
fn analyze_module(
    bundle: &ConfigBundle,
    cache: &CacheStore,
    baseline_fps: &mut BaselineFingerprints,
    known_baselines: &BTreeSet<String>,
    project: &Project,
    spec: &ModuleSpec,
    files: &[ResolvedFile],
    active: &BTreeSet<String>,
) -> Result<ModuleOutcome, AnalysisError> {
    let members =
        resolve_module(files, spec).map_err(|reason| AnalysisError::ModuleResolve {
            module_id: spec.id.clone(),
            reason,
        })?;
    let member_paths: Vec<&str> = members.iter().map(|f| f.path.as_str()).collect();
    let missing_critical = missing_critical_files(spec, &member_paths);

    if members.is_empty() {
        return Ok(ModuleOutcome {
            status: DriftStatus::Missing,
            score: None,
            expected_rule_id: None,
            target: None,
            evidence: ModuleEvidence {
                module_id: spec.id.clone(),
                files: Vec::new(),
                module_fingerprint: None,
                critical_files: spec.critical_files.clone(),
                missing_critical_files: missing_critical,
            },
        });
    }

    let fingerprints = fingerprint_files(cache, &members, &spec.language)?;
    let module_fp = module_fingerprint(cache, &spec.id, fingerprints)?;

    let evidence = ModuleEvidence {
        module_id: spec.id.clone(),
        files: module_fp.files.clone(),
        module_fingerprint: Some(module_fp.clone()),
        critical_files: spec.critical_files.clone(),
        missing_critical_files: missing_critical,
    };

    let defaults = bundle.expectations.defaults.thresholds;
    let resolution = driftscan_expect::resolve(
        &bundle.expectations.rules,
        &project.id,
        &spec.id,
        active,
        defaults,
        known_baselines,
    )?;

    let expectation = match resolution {
        Resolution::Unmapped => {
            return Ok(ModuleOutcome {
                status: DriftStatus::Unmapped,
                score: None,
                expected_rule_id: None,
                target: None,
                evidence,
            });
        }
        Resolution::Expected(expectation) => expectation,
    };

    let target_fp = match &expectation.target {
        Target::Signature {
            sha256_normalized,
            simhash64,
        } => Some((sha256_normalized.clone(), *simhash64)),
        Target::Baseline { baseline_id } => baseline_fps
            .module_fingerprint(bundle, cache, baseline_id, spec)?
            .map(|m| (m.aggregate_sha256, m.aggregate_simhash64)),
    };

    let Some((target_sha, target_simhash)) = target_fp else {
        // The baseline exists but holds no files for this module; there is
        // nothing to score against.
        return Ok(ModuleOutcome {
            status: DriftStatus::Missing,
            score: None,
            expected_rule_id: Some(expectation.rule_id),
            target: Some(expectation.target),
            evidence,
        });
    };

    let score = similarity(
        &module_fp.aggregate_sha256,
        module_fp.aggregate_simhash64,
        &target_sha,
        target_simhash,
    );
    let default_baseline = is_default_baseline(
        &expectation,
        bundle.expectations.defaults.default_baseline.as_deref(),
    );
    let status = classify(&ModuleResolution::Scored {
        score,
        thresholds: expectation.thresholds,
        default_baseline,
    });

    Ok(ModuleOutcome {
        status,
        score: Some(round4(score)),
        expected_rule_id: Some(expectation.rule_id),
        target: Some(expectation.target),
        evidence,
    })
}

fn load_snapshot(
    kind: &'static str,
    id: &str,
    source: &driftscan_config::Source,
) -> Result<Vec<ResolvedFile>, AnalysisError> {
    let path = match source {
        driftscan_config::Source::Fs { path } => path.clone(),
        driftscan_config::Source::Git { .. } => {
            // Config validation rejects git sources before analysis starts.
            return Err(AnalysisError::Snapshot {
                kind,
                id: id.to_string(),
                reason: anyhow::anyhow!("git sources are not resolvable in-process"),
            });
        }
    };
    snapshot_files(&path).map_err(|reason| AnalysisError::Snapshot {
        kind,
        id: id.to_string(),
        reason,
    })
}

/// Fingerprint a module's members, fanning out across worker threads.
/// Results come back keyed by path, so worker scheduling never leaks into
/// downstream ordering.
fn fingerprint_files(
    cache: &CacheStore,
    members: &[&ResolvedFile],
    language: &str,
) -> Result<Vec<FileFingerprint>, AnalysisError> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(members.len().max(1));
    let chunk_size = members.len().div_ceil(workers).max(1);

    let mut by_path: BTreeMap<String, FileFingerprint> = BTreeMap::new();
    let mut first_error: Option<CacheError> = None;

    std::thread::scope(|scope| {
        let handles: Vec<_> = members
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|file| fingerprint_one(cache, file, language))
                        .collect::<Vec<Result<FileFingerprint, CacheError>>>()
                })
            })
            .collect();

        for handle in handles {
            let results = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            for result in results {
                match result {
                    Ok(fp) => {
                        by_path.insert(fp.path.clone(), fp);
                    }
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
        }
    });

    if let Some(err) = first_error {
        return Err(err.into());
    }
    Ok(by_path.into_values().collect())
}

/// Fingerprint one file through the cache.
///
/// The content-id alias can skip normalization outright; the primary path
/// always normalizes (the key requires it) but skips simhash derivation on
/// a hit.
fn fingerprint_one(
    cache: &CacheStore,
    file: &ResolvedFile,
    language: &str,
) -> Result<FileFingerprint, CacheError> {
    if let Some(content_id) = &file.content_id {
        if let Some(cached) = cache.file_by_content_id(content_id) {
            return Ok(with_path(&file.path, cached));
        }
    }

    let normalized = normalize(&file.content, language);
    let sha = sha256_hex(&normalized);
    let cached = cache.file(&sha, || {
        let fp = fingerprint_file(&file.path, &normalized);
        CachedFile {
            sha256_normalized: fp.sha256_normalized,
            simhash64: fp.simhash64,
            normalized_byte_length: fp.normalized_byte_length,
        }
    })?;

    if let Some(content_id) = &file.content_id {
        cache.record_content_id(content_id, &cached)?;
    }
    Ok(with_path(&file.path, cached))
}

fn with_path(path: &str, cached: CachedFile) -> FileFingerprint {
    FileFingerprint {
        path: path.to_string(),
        sha256_normalized: cached.sha256_normalized,
        simhash64: cached.simhash64,
        normalized_byte_length: cached.normalized_byte_length,
    }
}

/// Aggregate through the module cache. A hit skips the fold entirely; the
/// constituent list is carried alongside either way.
fn module_fingerprint(
    cache: &CacheStore,
    module_id: &str,
    mut files: Vec<FileFingerprint>,
) -> Result<ModuleFingerprint, AnalysisError> {
    files.sort_by(|a, b| a.path.cmp(&b.path));
    let key = module_cache_key(module_id, &files);
    let cached = cache.module(&key, || {
        let fp = aggregate(module_id, &files);
        CachedModule {
            aggregate_sha256: fp.aggregate_sha256,
            aggregate_simhash64: fp.aggregate_simhash64,
        }
    })?;
    Ok(ModuleFingerprint {
        module_id: module_id.to_string(),
        aggregate_sha256: cached.aggregate_sha256,
        aggregate_simhash64: cached.aggregate_simhash64,
        files,
    })
}

/// Lazily computed module fingerprints per baseline, memoized for the run.
#[derive(Default)]
struct BaselineFingerprints {
    by_baseline: BTreeMap<String, BTreeMap<String, ModuleFingerprint>>,
}

impl BaselineFingerprints {
    fn module_fingerprint(
        &mut self,
        bundle: &ConfigBundle,
        cache: &CacheStore,
        baseline_id: &str,
        spec: &ModuleSpec,
    ) -> Result<Option<ModuleFingerprint>, AnalysisError> {
        if !self.by_baseline.contains_key(baseline_id) {
            let baseline = bundle.baseline(baseline_id).ok_or_else(|| {
                // The expectation engine verified the registry; reaching
                // here means the registry itself changed mid-run.
                ExpectError::DanglingBaseline {
                    rule_id: String::new(),
                    baseline_id: baseline_id.to_string(),
                }
            })?;
            let fps = self.compute_all(bundle, cache, baseline)?;
            self.by_baseline.insert(baseline_id.to_string(), fps);
        }
        Ok(self
            .by_baseline
            .get(baseline_id)
            .and_then(|m| m.get(&spec.id))
            .cloned())
    }

    fn compute_all(
        &self,
        bundle: &ConfigBundle,
        cache: &CacheStore,
        baseline: &Baseline,
    ) -> Result<BTreeMap<String, ModuleFingerprint>, AnalysisError> {
        let files = load_snapshot("baseline", &baseline.id, &baseline.source)?;
        let mut out = BTreeMap::new();
        for spec in &bundle.modules {
            let members =
                resolve_module(&files, spec).map_err(|reason| AnalysisError::ModuleResolve {
                    module_id: spec.id.clone(),
                    reason,
                })?;
            if members.is_empty() {
                continue;
            }
            let fingerprints = fingerprint_files(cache, &members, &spec.language)?;
            out.insert(
                spec.id.clone(),
                module_fingerprint(cache, &spec.id, fingerprints)?,
            );
        }
        Ok(out)
    }
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_config::{ExpectationDefaults, ExpectationsConfig, MatrixEntry,
        MatrixRequirement, Source};
    use driftscan_types::{ExpectationRule, RuleWhen, Thresholds};
    use std::fs;
    use std::path::Path;

    fn fs_source(path: &Path) -> Source {
        Source::Fs {
            path: path.to_path_buf(),
        }
    }

    fn module(id: &str, include: &[&str]) -> ModuleSpec {
        ModuleSpec {
            id: id.to_string(),
            title: id.to_string(),
            language: "rust".to_string(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            critical_files: Vec::new(),
        }
    }

    fn baseline_rule(id: &str, baseline_id: &str) -> ExpectationRule {
        ExpectationRule {
            id: id.to_string(),
            priority: 0,
            when: RuleWhen::default(),
            target: Target::Baseline {
                baseline_id: baseline_id.to_string(),
            },
            thresholds: None,
        }
    }

    /// A project tree plus a baseline tree, one module over `src/**/*.rs`.
    fn bundle_with_trees(
        project_dir: &Path,
        baseline_dir: &Path,
        rules: Vec<ExpectationRule>,
    ) -> ConfigBundle {
        ConfigBundle {
            projects: vec![driftscan_config::Project {
                id: "p1".to_string(),
                title: "Project One".to_string(),
                source: fs_source(project_dir),
            }],
            modules: vec![module("core", &["src/**/*.rs"])],
            baselines: vec![driftscan_config::Baseline {
                id: "rel-1".to_string(),
                title: "Release 1".to_string(),
                source: fs_source(baseline_dir),
            }],
            requirements: Vec::new(),
            matrix: vec![MatrixEntry {
                id: "p1".to_string(),
                requires: vec![MatrixRequirement {
                    id: "REQ-1".to_string(),
                    must_have: true,
                }],
            }],
            expectations: ExpectationsConfig {
                defaults: ExpectationDefaults {
                    thresholds: Thresholds {
                        ok_threshold: 0.95,
                        warn_threshold: 0.5,
                    },
                    default_baseline: None,
                },
                rules,
            },
        }
    }

    fn write_tree(dir: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn exact_match_against_default_baseline_is_ok_baseline() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(project.path(), &[("src/lib.rs", "fn core() { body(); }")]);
        // Same code modulo comments and whitespace.
        write_tree(
            baseline.path(),
            &[("src/lib.rs", "// header\nfn core() {\n    body();\n}\n")],
        );

        let bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("r1", "rel-1")],
        );
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let out = analyze(&bundle, &cache).unwrap();

        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.status, DriftStatus::OkBaseline);
        assert_eq!(record.score, Some(1.0));
        assert_eq!(record.expected_rule_id.as_deref(), Some("r1"));
        assert_eq!(record.active_requirements, vec!["REQ-1".to_string()]);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn empty_module_is_missing_without_scoring() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(project.path(), &[("docs/readme.md", "nothing matches")]);
        write_tree(baseline.path(), &[("docs/readme.md", "nothing matches")]);

        let bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("r1", "rel-1")],
        );
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let out = analyze(&bundle, &cache).unwrap();

        let record = &out.records[0];
        assert_eq!(record.status, DriftStatus::Missing);
        assert_eq!(record.score, None);
        assert_eq!(record.expected_rule_id, None);
        assert!(out.evidence[0].modules[0].module_fingerprint.is_none());
    }

    #[test]
    fn no_matching_rule_is_unmapped() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(project.path(), &[("src/lib.rs", "fn x() {}")]);
        write_tree(baseline.path(), &[("src/lib.rs", "fn x() {}")]);

        let mut rule = baseline_rule("scoped", "rel-1");
        rule.when.modules = vec!["other-module".to_string()];
        let bundle = bundle_with_trees(project.path(), baseline.path(), vec![rule]);
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let out = analyze(&bundle, &cache).unwrap();

        let record = &out.records[0];
        assert_eq!(record.status, DriftStatus::Unmapped);
        assert_eq!(record.expected_rule_id, None);
        assert_eq!(record.score, None);
        // UNMAPPED is a finding, so it gets an action.
        assert_eq!(out.actions.len(), 1);
    }

    #[test]
    fn dangling_baseline_aborts_the_run() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(project.path(), &[("src/lib.rs", "fn x() {}")]);

        let bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("bad", "ghost")],
        );
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let err = analyze(&bundle, &cache).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Expect(ExpectError::DanglingBaseline { .. })
        ));
    }

    #[test]
    fn second_run_hits_cache_for_every_file_and_module() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(
            project.path(),
            &[("src/a.rs", "fn a() {}"), ("src/b.rs", "fn b() {}")],
        );
        write_tree(
            baseline.path(),
            &[("src/a.rs", "fn a() {}"), ("src/b.rs", "fn b() {}")],
        );

        let bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("r1", "rel-1")],
        );

        let first = {
            let cache = CacheStore::open(cache_dir.path()).unwrap();
            analyze(&bundle, &cache).unwrap()
        };
        // Project and baseline trees are identical here, so the project's
        // two files cover both key sets: 2 misses, then hits throughout.
        assert_eq!(first.cache_stats.file_cache_misses, 2);
        assert_eq!(first.cache_stats.module_cache_misses, 1);

        let second = {
            let cache = CacheStore::open(cache_dir.path()).unwrap();
            analyze(&bundle, &cache).unwrap()
        };
        assert_eq!(second.cache_stats.file_cache_misses, 0);
        assert_eq!(second.cache_stats.module_cache_misses, 0);
        assert_eq!(
            second.cache_stats.file_cache_hits,
            first.cache_stats.file_cache_hits + first.cache_stats.file_cache_misses
        );
        assert_eq!(
            second.cache_stats.module_cache_hits,
            first.cache_stats.module_cache_hits + first.cache_stats.module_cache_misses
        );

        // Cached and uncached runs agree on every fingerprint and verdict.
        assert_eq!(first.records[0].status, second.records[0].status);
        assert_eq!(first.records[0].score, second.records[0].score);
        assert_eq!(
            first.evidence[0].modules[0].module_fingerprint,
            second.evidence[0].modules[0].module_fingerprint
        );
    }

    #[test]
    fn signature_target_scores_without_a_baseline() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(project.path(), &[("src/lib.rs", "fn sig() {}")]);

        // First pass: learn the module's aggregate fingerprint.
        let learn_bundle = bundle_with_trees(project.path(), baseline.path(), Vec::new());
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let learned = analyze(&learn_bundle, &cache).unwrap();
        let module_fp = learned.evidence[0].modules[0]
            .module_fingerprint
            .clone()
            .unwrap();

        // Second pass: pin it as a signature target.
        let rule = ExpectationRule {
            id: "pinned".to_string(),
            priority: 0,
            when: RuleWhen::default(),
            target: Target::Signature {
                sha256_normalized: module_fp.aggregate_sha256.clone(),
                simhash64: module_fp.aggregate_simhash64,
            },
            thresholds: None,
        };
        let bundle = bundle_with_trees(project.path(), baseline.path(), vec![rule]);
        let out = analyze(&bundle, &cache).unwrap();

        let record = &out.records[0];
        // A signature is a specifically-expected target, never the default
        // baseline.
        assert_eq!(record.status, DriftStatus::OkExpected);
        assert_eq!(record.score, Some(1.0));
    }

    #[test]
    fn drifted_module_lands_below_warn() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(
            project.path(),
            &[("src/lib.rs", "completely rewritten parser with new tokens everywhere")],
        );
        write_tree(
            baseline.path(),
            &[("src/lib.rs", "original tiny stub")],
        );

        let mut bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("r1", "rel-1")],
        );
        // Push the warn floor high so any real divergence drops below it.
        bundle.expectations.defaults.thresholds = Thresholds {
            ok_threshold: 1.0,
            warn_threshold: 0.99,
        };
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let out = analyze(&bundle, &cache).unwrap();

        let record = &out.records[0];
        assert_eq!(record.status, DriftStatus::DriftUnexpected);
        let score = record.score.unwrap();
        assert!((0.0..1.0).contains(&score), "score {score} should be in [0,1)");
        assert_eq!(out.actions.len(), 1);
    }

    #[test]
    fn records_are_sorted_by_project_then_module() {
        let project = tempfile::tempdir().unwrap();
        let baseline = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        write_tree(
            project.path(),
            &[("src/a.rs", "fn a() {}"), ("lib/b.rs", "fn b() {}")],
        );
        write_tree(baseline.path(), &[("src/a.rs", "fn a() {}")]);

        let mut bundle = bundle_with_trees(
            project.path(),
            baseline.path(),
            vec![baseline_rule("r1", "rel-1")],
        );
        bundle.modules = vec![
            module("zeta", &["src/**"]),
            module("alpha", &["lib/**"]),
        ];
        let cache = CacheStore::open(cache_dir.path()).unwrap();
        let out = analyze(&bundle, &cache).unwrap();

        let ids: Vec<&str> = out.records.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn content_id_alias_skips_normalization_on_the_next_lookup() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(cache_dir.path()).unwrap();

        let file = ResolvedFile {
            path: "src/lib.rs".to_string(),
            content: b"fn aliased() {}".to_vec(),
            content_id: Some("blob:abc123".to_string()),
        };

        let first = fingerprint_one(&cache, &file, "rust").unwrap();
        assert_eq!(cache.stats().file_cache_misses, 1);

        let second = fingerprint_one(&cache, &file, "rust").unwrap();
        assert_eq!(first, second);
        // The alias path serves the second lookup as a hit.
        assert_eq!(cache.stats().file_cache_hits, 1);
    }
}
