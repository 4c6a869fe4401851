//! Snapshot file loading and module membership resolution.
//!
//! A snapshot directory becomes a sorted set of `ResolvedFile`s
//! (project-relative forward-slash paths plus raw bytes); module specs then
//! select their members with include/exclude glob sets. Everything here is
//! path-sorted so downstream stages never see discovery order.

#![forbid(unsafe_code)]

use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use driftscan_types::{ModuleSpec, ResolvedFile};

/// Load every file under `root` as a `ResolvedFile`, respecting gitignore
/// rules, sorted by relative path.
pub fn snapshot_files(root: &Path) -> Result<Vec<ResolvedFile>> {
    if !root.is_dir() {
        anyhow::bail!("snapshot path is not a directory: {}", root.display());
    }

    let mut builder = WalkBuilder::new(root);
    builder.hidden(false);
    builder.git_ignore(true);
    builder.git_exclude(true);
    builder.git_global(true);
    builder.follow_links(false);

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel = rel.to_string_lossy().replace('\\', "/");
        if rel.starts_with(".git/") {
            continue;
        }
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
        files.push(ResolvedFile {
            path: rel,
            content,
            content_id: None,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Compiled include/exclude matcher for one module spec.
pub struct ModuleMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl ModuleMatcher {
    pub fn compile(spec: &ModuleSpec) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(&spec.include)
                .with_context(|| format!("module {}: invalid include pattern", spec.id))?,
            exclude: build_glob_set(&spec.exclude)
                .with_context(|| format!("module {}: invalid exclude pattern", spec.id))?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Select a module's members from a resolved file set, sorted by path.
pub fn resolve_module<'a>(
    files: &'a [ResolvedFile],
    spec: &ModuleSpec,
) -> Result<Vec<&'a ResolvedFile>> {
    let matcher = ModuleMatcher::compile(spec)?;
    let mut members: Vec<&ResolvedFile> = files
        .iter()
        .filter(|f| matcher.matches(&f.path))
        .collect();
    members.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(members)
}

/// Configured critical paths absent from the resolved member set.
pub fn missing_critical_files(spec: &ModuleSpec, member_paths: &[&str]) -> Vec<String> {
    spec.critical_files
        .iter()
        .filter(|critical| !member_paths.contains(&critical.as_str()))
        .cloned()
        .collect()
}
