//! Conversion engine
//!
//! Rewrites short module keys to their fully-qualified names. The engine is
//! pure: it takes text and returns text plus a change list. Reading files and
//! committing output are left to the caller (see `batch::unit`).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::classify::{classify_task, find_tasks, ArgumentForm, Classification, ReservedKeywords, TaskListMode};
use super::document::{locate, Document, Node};
use super::error::{ConversionError, EngineError, ErrorKind};
use super::mapping::{is_already_qualified, MappingStore};

/// One rewritten module reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub line: usize,
    pub column: usize,
    pub old_name: String,
    pub new_name: String,
}

/// Output of a successful text conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub content: String,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
}

/// Result of converting one file
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub file_path: PathBuf,
    pub success: bool,
    pub changes_made: usize,
    pub changes: Vec<Change>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(skip)]
    pub original_content: String,
    #[serde(skip)]
    pub converted_content: String,
    #[serde(with = "super::duration_secs")]
    pub processing_time: Duration,
}

impl ConversionResult {
    pub fn succeeded(
        file_path: impl Into<PathBuf>,
        original_content: String,
        conversion: Conversion,
        processing_time: Duration,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            success: true,
            changes_made: conversion.changes.len(),
            changes: conversion.changes,
            errors: Vec::new(),
            warnings: conversion.warnings,
            error_kind: None,
            backup_path: None,
            original_content,
            converted_content: conversion.content,
            processing_time,
        }
    }

    /// A failed result; nothing was changed
    pub fn failed(
        file_path: impl Into<PathBuf>,
        original_content: String,
        error: &EngineError,
        processing_time: Duration,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            success: false,
            changes_made: 0,
            changes: Vec::new(),
            errors: vec![error.describe()],
            warnings: Vec::new(),
            error_kind: Some(error.kind()),
            backup_path: None,
            converted_content: original_content.clone(),
            original_content,
            processing_time,
        }
    }

    /// Marks a converted result as failed after the fact (e.g. write error)
    pub fn fail_with(&mut self, error: &EngineError) {
        self.success = false;
        self.errors.push(error.describe());
        self.error_kind = Some(error.kind());
    }

    pub fn has_changes(&self) -> bool {
        self.changes_made > 0
    }
}

/// Converts documents against a mapping table
pub struct Converter<'a> {
    store: &'a MappingStore,
    reserved: ReservedKeywords,
}

impl<'a> Converter<'a> {
    pub fn new(store: &'a MappingStore) -> Self {
        Self {
            store,
            reserved: ReservedKeywords::default(),
        }
    }

    /// Converts `text`, never partially: a parse failure returns the error and
    /// no content
    pub fn convert_text(&self, text: &str, mode: TaskListMode) -> Result<Conversion, EngineError> {
        let mut doc = Document::parse(text)?;
        let mut changes = Vec::new();
        let mut warnings = Vec::new();

        for task_ref in find_tasks(&doc, mode) {
            let Some(node) = doc.node_mut(&task_ref.path) else {
                return Err(ConversionError(format!(
                    "lost track of task at line {}",
                    task_ref.position.line
                ))
                .into());
            };

            let task = match node {
                Node::Mapping(task) => task,
                other => {
                    warnings.push(format!(
                        "line {}: {} entry is not a block mapping; skipped",
                        locate(other).line,
                        task_ref.section
                    ));
                    continue;
                }
            };

            let module = match classify_task(task, &self.reserved) {
                Classification::Module(module) => module,
                Classification::Block => continue,
                Classification::NoModule => {
                    warnings.push(format!(
                        "line {}: no module key found in task; skipped",
                        task_ref.position.line
                    ));
                    continue;
                }
                Classification::Ambiguous(names) => {
                    tracing::warn!(line = task_ref.position.line, candidates = ?names, "ambiguous task");
                    warnings.push(format!(
                        "line {}: ambiguous task, multiple module candidates ({}); skipped",
                        task_ref.position.line,
                        names.join(", ")
                    ));
                    continue;
                }
            };

            if is_already_qualified(&module.name) {
                continue;
            }

            let Some(fqcn) = self.store.resolve(&module.name) else {
                warnings.push(format!(
                    "line {}: unknown module '{}' left unchanged",
                    module.position.line, module.name
                ));
                continue;
            };

            let entry = &mut task.entries_mut()[module.index];
            match module.form {
                ArgumentForm::Mapping | ArgumentForm::Inline => entry.key.rename(fqcn),
                ArgumentForm::Action => {
                    let rewritten = entry
                        .value
                        .as_scalar_mut()
                        .map(|scalar| {
                            let rest = scalar.text()[module.name.len()..].to_string();
                            scalar.replace(format!("{}{}", fqcn, rest))
                        })
                        .unwrap_or(false);
                    if !rewritten {
                        warnings.push(format!(
                            "line {}: could not rewrite action '{}'; skipped",
                            module.position.line, module.name
                        ));
                        continue;
                    }
                }
            }

            tracing::debug!(line = module.position.line, from = %module.name, to = fqcn, "rewrote module");
            changes.push(Change {
                line: module.position.line,
                column: module.position.column,
                old_name: module.name,
                new_name: fqcn.to_string(),
            });
        }

        if doc.edit_count() != changes.len() {
            return Err(ConversionError(format!(
                "{} edits recorded for {} changes",
                doc.edit_count(),
                changes.len()
            ))
            .into());
        }

        Ok(Conversion {
            content: doc.serialize(),
            changes,
            warnings,
        })
    }

    /// Converts `text` into a result object; failures are captured, never
    /// returned
    pub fn convert(&self, file_path: impl Into<PathBuf>, text: &str, mode: TaskListMode) -> ConversionResult {
        let started = Instant::now();
        let file_path = file_path.into();

        match self.convert_text(text, mode) {
            Ok(conversion) => {
                ConversionResult::succeeded(file_path, text.to_string(), conversion, started.elapsed())
            }
            Err(err) => ConversionResult::failed(file_path, text.to_string(), &err, started.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn store() -> MappingStore {
        MappingStore::with_defaults(HashMap::new()).unwrap()
    }

    fn convert(text: &str) -> Conversion {
        Converter::new(&store())
            .convert_text(text, TaskListMode::Detect)
            .unwrap()
    }

    #[test]
    fn converts_package_task() {
        let input = "- hosts: all\n  tasks:\n    - name: \"Install pkg\"\n      package:\n        name: nginx\n        state: present\n";
        let result = convert(input);

        assert_eq!(result.changes.len(), 1);
        assert_eq!(
            result.content,
            "- hosts: all\n  tasks:\n    - name: \"Install pkg\"\n      ansible.builtin.package:\n        name: nginx\n        state: present\n"
        );
        assert_eq!(
            result.changes[0],
            Change {
                line: 4,
                column: 7,
                old_name: "package".to_string(),
                new_name: "ansible.builtin.package".to_string(),
            }
        );
    }

    #[test]
    fn parameter_sharing_a_module_name_is_untouched() {
        let input = "\
- hosts: all
  tasks:
    - name: Create user
      user:
        name: deploy
        group: admin
    - name: Create group
      group:
        name: admin
";
        let result = convert(input);
        assert_eq!(result.changes.len(), 2);
        assert!(result.content.contains("      ansible.builtin.user:\n"));
        assert!(result.content.contains("        group: admin\n"));
        assert!(result.content.contains("      ansible.builtin.group:\n"));
    }

    #[test]
    fn ambiguous_task_gets_one_warning_and_no_change() {
        let input = "- hosts: all\n  tasks:\n    - name: two\n      copy:\n        src: a\n      file:\n        path: b\n";
        let result = convert(input);

        assert!(result.changes.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("ambiguous"));
        assert_eq!(result.content, input);
    }

    #[test]
    fn unknown_module_is_a_warning() {
        let input = "- hosts: all\n  tasks:\n    - my_custom_module:\n        arg: 1\n";
        let result = convert(input);
        assert!(result.changes.is_empty());
        assert_eq!(result.warnings, vec!["line 3: unknown module 'my_custom_module' left unchanged"]);
    }

    #[test]
    fn conversion_is_idempotent() {
        let input = "- hosts: all\n  tasks:\n    - copy:\n        src: a\n        dest: b\n    - ansible.builtin.debug:\n        msg: hi\n";
        let first = convert(input);
        assert_eq!(first.changes.len(), 1);

        let second = convert(&first.content);
        assert!(second.changes.is_empty());
        assert!(second.warnings.is_empty());
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn inline_and_action_forms() {
        let input = "- hosts: all\n  tasks:\n    - user: name=bob group=admin\n    - name: legacy\n      action: apt name=git\n    - local_action: command uptime\n";
        let result = convert(input);
        assert_eq!(result.changes.len(), 3);
        assert_eq!(
            result.content,
            "- hosts: all\n  tasks:\n    - ansible.builtin.user: name=bob group=admin\n    - name: legacy\n      action: ansible.builtin.apt name=git\n    - local_action: ansible.builtin.command uptime\n"
        );
    }

    #[test]
    fn nested_blocks_are_converted() {
        let input = "\
- hosts: all
  tasks:
    - block:
        - name: inner
          block:
            - shell: echo one
      rescue:
        - debug:
            msg: failed
      always:
        - meta: flush_handlers
";
        let result = convert(input);
        let names: Vec<_> = result.changes.iter().map(|c| c.old_name.as_str()).collect();
        assert_eq!(names, vec!["shell", "debug", "meta"]);
        assert!(result.content.contains("            - ansible.builtin.shell: echo one\n"));
    }

    #[test]
    fn comments_and_quoting_survive() {
        let input = "# site\n- hosts: all   # every host\n  tasks:\n    # install\n    - 'apt': {name: git}  # inline\n";
        let result = convert(input);
        assert_eq!(
            result.content,
            "# site\n- hosts: all   # every host\n  tasks:\n    # install\n    - 'ansible.builtin.apt': {name: git}  # inline\n"
        );
    }

    #[test]
    fn role_task_file_without_play() {
        let input = "- name: install\n  apt:\n    name: git\n- name: start\n  service: name=x state=started\n";
        let result = convert(input);
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn flow_task_is_reported() {
        let input = "- hosts: all\n  tasks:\n    - {name: x, ping: {}}\n";
        let result = convert(input);
        assert!(result.changes.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("not a block mapping"));
    }

    #[test]
    fn malformed_document_fails_whole_file() {
        let store = store();
        let result = Converter::new(&store).convert("bad.yml", "- hosts: all\n  tasks: [\n", TaskListMode::Detect);

        assert!(!result.success);
        assert_eq!(result.changes_made, 0);
        assert_eq!(result.error_kind, Some(ErrorKind::Parse));
        assert!(result.errors[0].starts_with("Parse error"));
        assert_eq!(result.converted_content, result.original_content);
    }

    #[test]
    fn result_serializes_without_contents() {
        let store = store();
        let result = Converter::new(&store).convert("a.yml", "- ping:\n", TaskListMode::Always);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["changes_made"], 1);
        assert!(json.get("original_content").is_none());
        assert!(json.get("error_kind").is_none());
        assert!(json["processing_time"].is_number());
    }
}
