//! Batch report
//!
//! Run ID format: `b-{7-char-hash}` (e.g. `b-3fa91c0`), hashed from the
//! batch roots and the start timestamp.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ConversionResult, ErrorKind, Severity, ValidationResult};

/// What a batch does to each file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Convert,
    Validate,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Convert => "convert",
            Mode::Validate => "validate",
        }
    }
}

/// Short identifier for one batch invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct RunId {
    hash: String,
}

impl RunId {
    pub fn new(roots: &[PathBuf], started_at: DateTime<Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for root in roots {
            hasher.update(root.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(&started_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self {
            hash: hex[..7].to_string(),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b-{}", self.hash)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.to_string()
    }
}

/// Result of one file in either mode
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UnitResult {
    Conversion(ConversionResult),
    Validation(ValidationResult),
}

impl UnitResult {
    pub fn file_path(&self) -> &Path {
        match self {
            UnitResult::Conversion(r) => &r.file_path,
            UnitResult::Validation(r) => &r.file_path,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            UnitResult::Conversion(r) => r.success,
            UnitResult::Validation(r) => r.success,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            UnitResult::Conversion(r) => &r.errors,
            UnitResult::Validation(r) => &r.errors,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            UnitResult::Conversion(r) => r.error_kind,
            UnitResult::Validation(r) => r.error_kind,
        }
    }

    pub fn as_conversion(&self) -> Option<&ConversionResult> {
        match self {
            UnitResult::Conversion(r) => Some(r),
            UnitResult::Validation(_) => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationResult> {
        match self {
            UnitResult::Validation(r) => Some(r),
            UnitResult::Conversion(_) => None,
        }
    }
}

/// Results for one discovered project, in completion order
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub root: PathBuf,
    pub success: bool,
    /// Project-level failures such as an unreadable root
    pub errors: Vec<String>,
    pub results: Vec<UnitResult>,
}

impl ProjectReport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            success: true,
            errors: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn failed(root: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            success: false,
            errors: vec![error.into()],
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: UnitResult) {
        if !result.success() {
            self.success = false;
        }
        self.results.push(result);
    }
}

/// Aggregate counts, computed once all units finished
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub projects: usize,
    pub files: usize,
    pub succeeded: usize,
    /// Failed files plus failed projects
    pub failed: usize,
    /// Files never started because the batch was aborted
    pub skipped: usize,
    pub files_changed: usize,
    pub changes: usize,
    pub total_modules: usize,
    pub fqcn_modules: usize,
    pub error_issues: usize,
    pub warning_issues: usize,
    pub info_issues: usize,
}

impl Summary {
    /// Units that ran to a result (files and failed projects)
    pub fn units(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Overall compliance across every validated file
    pub fn compliance(&self) -> f64 {
        if self.total_modules == 0 {
            1.0
        } else {
            self.fqcn_modules as f64 / self.total_modules as f64
        }
    }
}

/// Everything a batch produced
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: RunId,
    pub mode: Mode,
    pub dry_run: bool,
    pub strict: bool,
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "crate::domain::duration_secs")]
    pub duration: Duration,
    pub projects: BTreeMap<String, ProjectReport>,
    pub summary: Summary,
}

impl BatchResult {
    /// Fills in the summary from the accumulated projects
    pub fn finalize(&mut self, skipped: usize) {
        let mut summary = Summary {
            projects: self.projects.len(),
            skipped,
            ..Default::default()
        };

        for project in self.projects.values() {
            if project.results.is_empty() && !project.errors.is_empty() {
                summary.failed += 1;
            }
            for result in &project.results {
                summary.files += 1;
                if result.success() {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }

                match result {
                    UnitResult::Conversion(r) if r.success => {
                        summary.changes += r.changes_made;
                        if r.has_changes() {
                            summary.files_changed += 1;
                        }
                    }
                    UnitResult::Validation(r) if r.success => {
                        summary.total_modules += r.total_modules;
                        summary.fqcn_modules += r.fqcn_modules;
                        summary.error_issues += r.count(Severity::Error);
                        summary.warning_issues += r.count(Severity::Warning);
                        summary.info_issues += r.count(Severity::Info);
                    }
                    _ => {}
                }
            }
        }

        self.summary = summary;
    }

    /// Iterates over every unit result
    pub fn results(&self) -> impl Iterator<Item = &UnitResult> {
        self.projects.values().flat_map(|p| p.results.iter())
    }

    /// Overall success signal.
    ///
    /// A batch fails when it was aborted, when every unit failed (which
    /// includes a lone failing unit), when `fail_on_error` is set and any
    /// unit failed, or when strict validation found error issues.
    pub fn exit_success(&self, fail_on_error: bool) -> bool {
        let summary = &self.summary;
        if self.aborted {
            return false;
        }
        if summary.failed > 0 && summary.failed == summary.units() {
            return false;
        }
        if fail_on_error && summary.failed > 0 {
            return false;
        }
        !(self.mode == Mode::Validate && self.strict && summary.error_issues > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conversion, EngineError, ParseError};

    fn batch(mode: Mode, results: Vec<UnitResult>) -> BatchResult {
        let started_at = Utc::now();
        let mut project = ProjectReport::new("/repo");
        for r in results {
            project.push(r);
        }
        let mut batch = BatchResult {
            run_id: RunId::new(&[PathBuf::from("/repo")], started_at),
            mode,
            dry_run: false,
            strict: false,
            aborted: false,
            started_at,
            finished_at: started_at,
            duration: Duration::ZERO,
            projects: BTreeMap::from([("/repo".to_string(), project)]),
            summary: Summary::default(),
        };
        batch.finalize(0);
        batch
    }

    fn ok(path: &str, changes: usize) -> UnitResult {
        let conversion = Conversion {
            content: String::new(),
            changes: (0..changes)
                .map(|i| crate::domain::Change {
                    line: i + 1,
                    column: 1,
                    old_name: "apt".to_string(),
                    new_name: "ansible.builtin.apt".to_string(),
                })
                .collect(),
            warnings: Vec::new(),
        };
        UnitResult::Conversion(ConversionResult::succeeded(path, String::new(), conversion, Duration::ZERO))
    }

    fn bad(path: &str) -> UnitResult {
        let err = EngineError::from(ParseError::at("did not find expected key", 2, 3));
        UnitResult::Conversion(ConversionResult::failed(path, String::new(), &err, Duration::ZERO))
    }

    #[test]
    fn run_id_format() {
        let id = RunId::new(&[PathBuf::from("a")], Utc::now());
        let text = id.to_string();
        assert!(text.starts_with("b-"));
        assert_eq!(text.len(), 9);
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!(text));
    }

    #[test]
    fn summary_counts() {
        let batch = batch(Mode::Convert, vec![ok("a.yml", 2), bad("b.yml"), ok("c.yml", 0)]);
        assert_eq!(batch.summary.files, 3);
        assert_eq!(batch.summary.succeeded, 2);
        assert_eq!(batch.summary.failed, 1);
        assert_eq!(batch.summary.changes, 2);
        assert_eq!(batch.summary.files_changed, 1);
        assert!(!batch.projects["/repo"].success);
    }

    #[test]
    fn partial_failure_is_still_success() {
        let batch = batch(Mode::Convert, vec![ok("a.yml", 1), bad("b.yml")]);
        assert!(batch.exit_success(false));
        assert!(!batch.exit_success(true));
    }

    #[test]
    fn only_unit_failing_is_failure() {
        let batch = batch(Mode::Convert, vec![bad("b.yml")]);
        assert!(!batch.exit_success(false));
    }

    #[test]
    fn empty_batch_succeeds() {
        let batch = batch(Mode::Convert, vec![]);
        assert_eq!(batch.summary.units(), 0);
        assert!(batch.exit_success(true));
        assert_eq!(batch.summary.compliance(), 1.0);
    }

    #[test]
    fn report_serializes() {
        let batch = batch(Mode::Convert, vec![bad("b.yml")]);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["mode"], "convert");
        assert_eq!(json["summary"]["failed"], 1);
        let result = &json["projects"]["/repo"]["results"][0];
        assert_eq!(result["error_kind"], "parse");
        assert!(result["errors"][0].as_str().unwrap().contains("line 2"));
    }
}
