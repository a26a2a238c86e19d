//! Validation engine
//!
//! Read-only counterpart of the converter: classifies the same task keys and
//! reports which ones are not yet fully qualified, with a compliance score.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::classify::{classify_task, find_tasks, Classification, ReservedKeywords, TaskListMode};
use super::document::{locate, Document, Node};
use super::error::{EngineError, ErrorKind};
use super::mapping::{is_already_qualified, MappingStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A module reference that is not in fully-qualified form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub module_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

/// Module counts and issues for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub total_modules: usize,
    pub fqcn_modules: usize,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl Report {
    /// Share of module references already qualified; an empty document
    /// scores 1.0
    pub fn score(&self) -> f64 {
        if self.total_modules == 0 {
            1.0
        } else {
            self.fqcn_modules as f64 / self.total_modules as f64
        }
    }
}

/// Result of validating one file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub file_path: PathBuf,
    pub success: bool,
    pub score: f64,
    pub total_modules: usize,
    pub fqcn_modules: usize,
    pub issues: Vec<ValidationIssue>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(with = "super::duration_secs")]
    pub processing_time: Duration,
}

impl ValidationResult {
    pub fn from_report(file_path: impl Into<PathBuf>, report: Report, processing_time: Duration) -> Self {
        Self {
            file_path: file_path.into(),
            success: true,
            score: report.score(),
            total_modules: report.total_modules,
            fqcn_modules: report.fqcn_modules,
            issues: report.issues,
            errors: Vec::new(),
            warnings: report.warnings,
            error_kind: None,
            processing_time,
        }
    }

    pub fn failed(file_path: impl Into<PathBuf>, error: &EngineError, processing_time: Duration) -> Self {
        Self {
            file_path: file_path.into(),
            success: false,
            score: 0.0,
            total_modules: 0,
            fqcn_modules: 0,
            issues: Vec::new(),
            errors: vec![error.describe()],
            warnings: Vec::new(),
            error_kind: Some(error.kind()),
            processing_time,
        }
    }

    /// True when parsing succeeded and nothing above `info` was found
    pub fn is_compliant(&self) -> bool {
        self.success && self.issues.iter().all(|i| i.severity == Severity::Info)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Scores documents against a mapping table
pub struct Validator<'a> {
    store: &'a MappingStore,
    strict: bool,
    reserved: ReservedKeywords,
}

impl<'a> Validator<'a> {
    /// In strict mode convertible keys are errors instead of warnings
    pub fn new(store: &'a MappingStore, strict: bool) -> Self {
        Self {
            store,
            strict,
            reserved: ReservedKeywords::default(),
        }
    }

    pub fn validate_text(&self, text: &str, mode: TaskListMode) -> Result<Report, EngineError> {
        let doc = Document::parse(text)?;
        let mut report = Report::default();

        for task_ref in find_tasks(&doc, mode) {
            let task = match doc.node(&task_ref.path) {
                Some(Node::Mapping(task)) => task,
                other => {
                    let line = other.map_or(task_ref.position.line, |node| locate(node).line);
                    report.warnings.push(format!(
                        "line {}: {} entry is not a block mapping; skipped",
                        line, task_ref.section
                    ));
                    continue;
                }
            };

            let module = match classify_task(task, &self.reserved) {
                Classification::Module(module) => module,
                Classification::Block => continue,
                Classification::NoModule => {
                    report.warnings.push(format!(
                        "line {}: no module key found in task",
                        task_ref.position.line
                    ));
                    continue;
                }
                Classification::Ambiguous(names) => {
                    report.warnings.push(format!(
                        "line {}: ambiguous task, multiple module candidates ({})",
                        task_ref.position.line,
                        names.join(", ")
                    ));
                    continue;
                }
            };

            report.total_modules += 1;
            if is_already_qualified(&module.name) {
                report.fqcn_modules += 1;
                continue;
            }

            let issue = match self.store.resolve(&module.name) {
                Some(fqcn) => ValidationIssue {
                    line: module.position.line,
                    column: module.position.column,
                    severity: if self.strict {
                        Severity::Error
                    } else {
                        Severity::Warning
                    },
                    message: format!("Module '{}' should use its fully-qualified name", module.name),
                    suggested_fix: Some(fqcn.to_string()),
                    module_name: module.name,
                },
                None => ValidationIssue {
                    line: module.position.line,
                    column: module.position.column,
                    severity: Severity::Info,
                    message: format!("Unknown module '{}', cannot verify", module.name),
                    suggested_fix: None,
                    module_name: module.name,
                },
            };
            report.issues.push(issue);
        }

        Ok(report)
    }

    /// Validates `text` into a result object; failures are captured
    pub fn validate(&self, file_path: impl Into<PathBuf>, text: &str, mode: TaskListMode) -> ValidationResult {
        let started = Instant::now();
        match self.validate_text(text, mode) {
            Ok(report) => ValidationResult::from_report(file_path, report, started.elapsed()),
            Err(err) => ValidationResult::failed(file_path, &err, started.elapsed()),
        }
    }
}
