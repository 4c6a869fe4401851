//! Shared fixture helpers for driftscan integration tests.
//!
//! Each test builds its own hermetic config bundle plus snapshot trees
//! inside a tempdir, so tests never depend on repository state or on each
//! other's cache contents.

#![allow(dead_code)]

use std::path::Path;

/// Write a file tree under `dir`, creating parent directories.
pub fn write_tree(dir: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// Write a complete six-file config bundle into `config_dir`.
///
/// One project (`p1`) over `project_path`, one baseline (`rel-1`) over
/// `baseline_path`, one module (`core`) matching `src/**/*.rs`, one active
/// requirement (`REQ-1`), and the caller-supplied `expectations.yml` body.
pub fn write_config(
    config_dir: &Path,
    project_path: &Path,
    baseline_path: &Path,
    expectations: &str,
) {
    std::fs::create_dir_all(config_dir).unwrap();
    std::fs::write(
        config_dir.join("projects.yml"),
        format!(
            "version: 1\nprojects:\n  - id: p1\n    title: Project One\n    source:\n      type: fs\n      path: \"{}\"\n",
            project_path.display()
        ),
    )
    .unwrap();
    std::fs::write(
        config_dir.join("modules.yml"),
        "version: 1\nmodules:\n  - id: core\n    title: Core\n    language: rust\n    include: [\"src/**/*.rs\"]\n",
    )
    .unwrap();
    std::fs::write(
        config_dir.join("baselines.yml"),
        format!(
            "version: 1\nbaselines:\n  - id: rel-1\n    title: Release 1\n    source:\n      type: fs\n      path: \"{}\"\n",
            baseline_path.display()
        ),
    )
    .unwrap();
    std::fs::write(
        config_dir.join("requirements.yml"),
        "version: 1\nrequirements:\n  - id: REQ-1\n    title: Core must match its release\n",
    )
    .unwrap();
    std::fs::write(
        config_dir.join("matrix.yml"),
        "version: 1\nprojects:\n  - id: p1\n    requires:\n      - id: REQ-1\n        must_have: true\n",
    )
    .unwrap();
    std::fs::write(config_dir.join("expectations.yml"), expectations).unwrap();
}

/// An `expectations.yml` body with one catch-all rule against `rel-1`.
pub const EXPECTATIONS_BASELINE: &str = "version: 1\n\
defaults:\n  thresholds:\n    ok_threshold: 0.95\n    warn_threshold: 0.5\n\
rules:\n  - id: r1\n    priority: 10\n    target:\n      type: baseline\n      baseline_id: rel-1\n";

/// An `expectations.yml` body with no rules at all.
pub const EXPECTATIONS_EMPTY: &str = "version: 1\n\
defaults:\n  thresholds:\n    ok_threshold: 0.95\n    warn_threshold: 0.5\n\
rules: []\n";

/// An `expectations.yml` body whose only rule names an unknown baseline.
pub const EXPECTATIONS_DANGLING: &str = "version: 1\n\
defaults:\n  thresholds:\n    ok_threshold: 0.95\n    warn_threshold: 0.5\n\
rules:\n  - id: bad\n    priority: 10\n    target:\n      type: baseline\n      baseline_id: ghost\n";
