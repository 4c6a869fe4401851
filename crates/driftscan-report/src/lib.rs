//! Run folder assembly.
//!
//! One completed analysis becomes five JSON documents in an output
//! directory: `report.json`, `evidence.json`, `actions.json`,
//! `run_manifest.json`, `cache_stats.json`. Everything but the manifest's
//! `generated_at` timestamp is a pure function of the analysis output, and
//! serde struct field order keeps key order stable, so two runs over the
//! same inputs produce byte-identical report and evidence documents.
//!
//! Writing only starts after analysis succeeded; a fatal run leaves the
//! output directory untouched.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use driftscan_analysis::AnalysisOutput;
use driftscan_types::{Action, ReportIndex, RunManifest, ToolInfo};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode {file}: {source}")]
    Encode {
        file: &'static str,
        source: serde_json::Error,
    },

    #[error("failed to format run timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Wrapper shape of `actions.json`.
#[derive(Serialize)]
struct ActionsDoc<'a> {
    actions: &'a [Action],
}

/// Write one run folder under `out_dir`. The directory's basename becomes
/// the run id. Returns the manifest that was written.
pub fn write_run_folder(
    out_dir: &Path,
    output: &AnalysisOutput,
    tool: ToolInfo,
) -> Result<RunManifest, ReportError> {
    std::fs::create_dir_all(out_dir).map_err(|source| ReportError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let manifest = RunManifest {
        run_id: run_id(out_dir),
        generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
        tool,
        projects: output.projects.clone(),
        reports: ReportIndex::default(),
    };

    write_doc(out_dir, "report.json", &output.records)?;
    write_doc(out_dir, "evidence.json", &output.evidence)?;
    write_doc(
        out_dir,
        "actions.json",
        &ActionsDoc {
            actions: &output.actions,
        },
    )?;
    write_doc(out_dir, "run_manifest.json", &manifest)?;
    write_doc(out_dir, "cache_stats.json", &output.cache_stats)?;

    Ok(manifest)
}

fn run_id(out_dir: &Path) -> String {
    out_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| out_dir.to_string_lossy().into_owned())
}

fn write_doc<T: Serialize>(
    out_dir: &Path,
    file: &'static str,
    value: &T,
) -> Result<(), ReportError> {
    let mut encoded =
        serde_json::to_vec_pretty(value).map_err(|source| ReportError::Encode { file, source })?;
    encoded.push(b'\n');
    let path = out_dir.join(file);
    std::fs::write(&path, encoded).map_err(|source| ReportError::Io { path, source })
}
