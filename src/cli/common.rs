//! Arguments and helpers shared by the batch commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use super::output::Output;
use crate::batch::{BatchResult, UnitResult};
use crate::domain::{ConversionResult, MappingStore};
use crate::storage::{write_atomic, Config, RunOptions};

/// Loaded configuration plus the global `--mappings` flag
pub struct Session {
    pub config: Config,
    pub mappings: Option<PathBuf>,
}

impl Session {
    /// Builds the shared mapping table; a bad table stops the run here
    pub fn store(&self, output: &Output) -> Result<Arc<MappingStore>> {
        let store = self.config.mapping_store(self.mappings.as_deref())?;
        output.verbose_ctx(
            "mappings",
            &format!("{} entries ({} overridden)", store.len(), store.overridden()),
        );
        Ok(Arc::new(store))
    }
}

/// Discovery and scheduling flags
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Files or directories to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Number of worker threads (default: available parallelism)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Stop scheduling new files after the first failure
    #[arg(long)]
    pub stop_on_error: bool,

    /// Exit non-zero if any file failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Per-file timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// File name glob to include (replaces the defaults; repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Path glob to exclude (added to the defaults; repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Maximum directory depth searched for projects
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Write the JSON batch report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl BatchArgs {
    /// Overrides configured options with the flags that were given
    pub fn apply(&self, options: &mut RunOptions) {
        if self.workers.is_some() {
            options.max_workers = self.workers;
        }
        if self.stop_on_error {
            options.continue_on_error = false;
        }
        if self.timeout.is_some() {
            options.unit_timeout_secs = self.timeout;
        }
        if !self.include.is_empty() {
            options.include_patterns = self.include.clone();
        }
        options.exclude_patterns.extend(self.exclude.iter().cloned());
        if let Some(depth) = self.max_depth {
            options.max_discovery_depth = depth;
        }
    }
}

/// Writes the JSON report for `batch` to `path`
pub fn write_report(path: &Path, batch: &BatchResult) -> Result<()> {
    let json = serde_json::to_string_pretty(batch).context("Failed to serialize batch report")?;
    write_atomic(path, &json).with_context(|| format!("Failed to write report: {}", path.display()))
}

/// Line diff between the original and converted text of one file
pub fn render_diff(result: &ConversionResult) -> String {
    let mut out = format!(
        "--- {}\n+++ {}\n",
        result.file_path.display(),
        result.file_path.display()
    );
    let converted: Vec<&str> = result.converted_content.lines().collect();
    for (index, old) in result.original_content.lines().enumerate() {
        let Some(new) = converted.get(index) else { break };
        if old != *new {
            out.push_str(&format!("-{:>5}: {}\n", index + 1, old));
            out.push_str(&format!("+{:>5}: {}\n", index + 1, new));
        }
    }
    out
}

/// Prints failed units in text mode
pub fn print_failures(output: &Output, batch: &BatchResult) {
    for project in batch.projects.values() {
        for error in &project.errors {
            output.text(&format!("FAILED {}: {}", project.root.display(), error));
        }
    }
    for result in batch.results().filter(|r| !r.success()) {
        let errors = result.errors().join("; ");
        output.text(&format!("FAILED {}: {}", result.file_path().display(), errors));
    }
}

/// Turns the batch outcome into the process result
pub fn finish(batch: &BatchResult, fail_on_error: bool) -> Result<()> {
    if batch.exit_success(fail_on_error) {
        return Ok(());
    }

    let summary = &batch.summary;
    if batch.aborted {
        bail!(
            "Batch {} aborted after a failure ({} file(s) not processed)",
            batch.run_id,
            summary.skipped
        );
    }
    if summary.failed > 0 {
        bail!("{} of {} unit(s) failed", summary.failed, summary.units());
    }
    bail!("{} module reference(s) are not fully qualified", summary.error_issues)
}

/// Counts results that carry warnings
pub fn warning_count(batch: &BatchResult) -> usize {
    batch
        .results()
        .map(|r| match r {
            UnitResult::Conversion(c) => c.warnings.len(),
            UnitResult::Validation(v) => v.warnings.len(),
        })
        .sum()
}
