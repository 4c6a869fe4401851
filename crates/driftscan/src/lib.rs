//! # driftscan
//!
//! **CLI Binary**
//!
//! Entry point for the `driftscan` command-line application. It wires the
//! config bundle, cache store, analysis pipeline, and run folder writer
//! together and maps failures to exit codes.
//!
//! ## Responsibilities
//! * Parse command line arguments
//! * Load and validate the config bundle
//! * Run the analysis and write the run folder
//! * Handle errors and exit codes (0 = run completed, findings included;
//!   2 = configuration error; 1 = any other fatal error)
//!
//! This crate should contain minimal business logic.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use driftscan_cache::CacheStore;
use driftscan_config::ConfigError;
use driftscan_types::ToolInfo;

#[derive(Parser)]
#[command(name = "driftscan", version, about = "Detect traceability drift between projects and their expected baselines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze all configured projects and write a run folder.
    Analyze {
        /// Directory holding the six-file YAML config bundle.
        #[arg(long, value_name = "DIR")]
        config: PathBuf,
        /// Output directory for this run; its basename becomes the run id.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
        /// Persistent fingerprint cache root, shared across runs.
        #[arg(long, value_name = "DIR")]
        cache_dir: PathBuf,
    },
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "driftscan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Entry point used by the `driftscan` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            config,
            out,
            cache_dir,
        } => analyze(config, out, cache_dir),
    }
}

/// Exit code for a failed run: configuration errors get 2, everything else
/// 1. Findings are not failures; a completed run exits 0.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        2
    } else {
        1
    }
}

fn analyze(config: PathBuf, out: PathBuf, cache_dir: PathBuf) -> Result<()> {
    let bundle = driftscan_config::load_bundle(&config)?;
    let cache = CacheStore::open(&cache_dir)
        .with_context(|| format!("failed to open cache at {}", cache_dir.display()))?;

    let output = driftscan_analysis::analyze(&bundle, &cache)?;
    let manifest = driftscan_report::write_run_folder(&out, &output, tool_info())
        .with_context(|| format!("failed to write run folder {}", out.display()))?;

    let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &output.records {
        *by_status.entry(record.status.as_str()).or_insert(0) += 1;
    }

    println!("run {} complete: {} records", manifest.run_id, output.records.len());
    for (status, count) in &by_status {
        println!("  {status}: {count}");
    }
    println!(
        "cache: {} file hits / {} misses, {} module hits / {} misses",
        output.cache_stats.file_cache_hits,
        output.cache_stats.file_cache_misses,
        output.cache_stats.module_cache_hits,
        output.cache_stats.module_cache_misses,
    );
    println!("wrote {}", out.display());
    Ok(())
}
