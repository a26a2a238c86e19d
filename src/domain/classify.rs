//! Task discovery and module-key classification
//!
//! Finds the task mappings of a document (plays' `tasks`/`handlers`/
//! `pre_tasks`/`post_tasks`, nested `block`/`rescue`/`always` lists, and bare
//! task-list files) and decides which key of each task names the module.
//! Only keys in task position are ever candidates; parameters inside a
//! module's arguments are never looked at.

use std::collections::HashSet;
use std::path::Path;

use super::document::{Document, Mapping, Node, NodePath, PathStep, Position, ScalarStyle};

/// Keys whose sequence values are task lists at play level
pub const TASK_SECTIONS: &[&str] = &["tasks", "handlers", "pre_tasks", "post_tasks"];

/// Keys of a block task whose sequence values are nested task lists
pub const BLOCK_SECTIONS: &[&str] = &["block", "rescue", "always"];

/// Keys that only appear on plays; a list containing them is a playbook
const PLAY_KEYS: &[&str] = &[
    "hosts",
    "import_playbook",
    "roles",
    "tasks",
    "handlers",
    "pre_tasks",
    "post_tasks",
];

/// Task keywords that mark a bare list of mappings as a task list
const TASK_SIGNALS: &[&str] = &[
    "action",
    "args",
    "async",
    "become",
    "become_user",
    "block",
    "changed_when",
    "delegate_to",
    "failed_when",
    "ignore_errors",
    "listen",
    "local_action",
    "loop",
    "loop_control",
    "no_log",
    "notify",
    "register",
    "retries",
    "run_once",
    "until",
    "when",
];

const DEFAULT_RESERVED: &[&str] = &[
    "action",
    "always",
    "any_errors_fatal",
    "args",
    "async",
    "become",
    "become_exe",
    "become_flags",
    "become_method",
    "become_user",
    "block",
    "changed_when",
    "check_mode",
    "collections",
    "connection",
    "debugger",
    "delay",
    "delegate_facts",
    "delegate_to",
    "diff",
    "environment",
    "failed_when",
    "ignore_errors",
    "ignore_unreachable",
    "listen",
    "local_action",
    "loop",
    "loop_control",
    "module_defaults",
    "name",
    "no_log",
    "notify",
    "poll",
    "port",
    "register",
    "remote_user",
    "rescue",
    "retries",
    "run_once",
    "tags",
    "throttle",
    "timeout",
    "until",
    "vars",
    "when",
    "<<",
];

/// Task-control keywords that can never be a module key
#[derive(Debug, Clone)]
pub struct ReservedKeywords {
    words: HashSet<String>,
}

impl Default for ReservedKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED.iter().copied())
    }
}

impl ReservedKeywords {
    pub fn new<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            words: words.into_iter().map(str::to_string).collect(),
        }
    }

    /// True for listed keywords and any `with_*` loop keyword
    pub fn contains(&self, key: &str) -> bool {
        self.words.contains(key) || key.starts_with("with_")
    }
}

/// How a module receives its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentForm {
    /// `module:` followed by a mapping, or nothing
    Mapping,
    /// `module: key=value ...` on one line
    Inline,
    /// `action: module key=value ...`
    Action,
}

/// The module reference found in a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleKey {
    /// Index of the entry holding the reference
    pub index: usize,
    pub name: String,
    pub form: ArgumentForm,
    pub position: Position,
}

/// Outcome of classifying one task mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Module(ModuleKey),
    /// A `block` task; its lists are visited separately
    Block,
    /// No key qualifies as a module
    NoModule,
    /// More than one key qualifies; never guessed
    Ambiguous(Vec<String>),
}

/// Identifies the module key of a task mapping.
///
/// A key is a candidate when it is not reserved and its value is a mapping or
/// empty. If there is no such key, a single non-reserved key with a scalar
/// value is taken as an inline-argument module (`shell: echo hi`). With
/// neither, an `action:`/`local_action:` plain scalar names the module in its
/// first word.
pub fn classify_task(task: &Mapping, reserved: &ReservedKeywords) -> Classification {
    let mut structured = Vec::new();
    let mut inline = Vec::new();

    for (index, entry) in task.entries().iter().enumerate() {
        if reserved.contains(entry.key.name()) {
            continue;
        }
        match &entry.value {
            value if value.is_mapping_or_null() => structured.push(index),
            Node::Scalar(_) => inline.push(index),
            _ => {}
        }
    }

    let candidates = match (structured.len(), inline.len()) {
        (1, _) => return module_key(task, structured[0], ArgumentForm::Mapping),
        (0, 1) => return module_key(task, inline[0], ArgumentForm::Inline),
        (0, 0) => return classify_without_candidates(task),
        (0, _) => inline,
        _ => structured,
    };

    Classification::Ambiguous(
        candidates
            .into_iter()
            .map(|i| task.entries()[i].key.name().to_string())
            .collect(),
    )
}

fn module_key(task: &Mapping, index: usize, form: ArgumentForm) -> Classification {
    let key = &task.entries()[index].key;
    Classification::Module(ModuleKey {
        index,
        name: key.name().to_string(),
        form,
        position: key.position(),
    })
}

fn classify_without_candidates(task: &Mapping) -> Classification {
    if task.contains_key("block") {
        return Classification::Block;
    }

    for (index, entry) in task.entries().iter().enumerate() {
        if !matches!(entry.key.name(), "action" | "local_action") {
            continue;
        }
        let Node::Scalar(scalar) = &entry.value else {
            continue;
        };
        if scalar.style() != ScalarStyle::Plain || scalar.is_multiline() {
            continue;
        }
        if let Some(module) = scalar.text().split_whitespace().next() {
            return Classification::Module(ModuleKey {
                index,
                name: module.to_string(),
                form: ArgumentForm::Action,
                position: scalar.position(),
            });
        }
    }

    Classification::NoModule
}

/// Whether a document's top-level sequence may be a bare task list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskListMode {
    /// Decide from the content of the list
    Detect,
    /// Always treat a top-level sequence as tasks (role `tasks/` files)
    Always,
}

impl TaskListMode {
    /// Files under a `tasks/` or `handlers/` directory are task lists
    pub fn for_path(path: &Path) -> Self {
        let in_task_dir = path
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .any(|c| matches!(c.as_os_str().to_str(), Some("tasks" | "handlers")));

        if in_task_dir {
            TaskListMode::Always
        } else {
            TaskListMode::Detect
        }
    }
}

/// A task mapping located in a document
#[derive(Debug, Clone)]
pub struct TaskRef {
    pub path: NodePath,
    /// Key of the list holding the task (`tasks`, `block`, ...)
    pub section: String,
    pub position: Position,
}

/// Lists every task item of the document in document order.
///
/// Items that are not block mappings (flow mappings, scalars) are included
/// so callers can report them; empty items are left out.
pub fn find_tasks(doc: &Document, mode: TaskListMode) -> Vec<TaskRef> {
    let mut tasks = Vec::new();

    for (index, root) in doc.roots().iter().enumerate() {
        let path = NodePath::root(index);
        match root {
            Node::Sequence(seq) if mode == TaskListMode::Always || looks_like_task_list(seq.items()) => {
                collect_task_list(seq.items(), &path, "tasks", &mut tasks);
            }
            _ => walk(root, &path, &mut tasks),
        }
    }

    tasks
}

fn walk(node: &Node, path: &NodePath, tasks: &mut Vec<TaskRef>) {
    match node {
        Node::Mapping(mapping) => {
            for (i, entry) in mapping.entries().iter().enumerate() {
                let child = path.child(PathStep::Entry(i));
                let section = entry.key.name();
                match &entry.value {
                    Node::Sequence(seq) if TASK_SECTIONS.contains(&section) => {
                        collect_task_list(seq.items(), &child, section, tasks);
                    }
                    value => walk(value, &child, tasks),
                }
            }
        }
        Node::Sequence(seq) => {
            for (i, item) in seq.items().iter().enumerate() {
                walk(item, &path.child(PathStep::Item(i)), tasks);
            }
        }
        Node::Scalar(_) | Node::Null(_) => {}
    }
}

fn collect_task_list(items: &[Node], path: &NodePath, section: &str, tasks: &mut Vec<TaskRef>) {
    for (i, item) in items.iter().enumerate() {
        if matches!(item, Node::Null(_)) {
            continue;
        }

        let item_path = path.child(PathStep::Item(i));
        tasks.push(TaskRef {
            path: item_path.clone(),
            section: section.to_string(),
            position: item.position(),
        });

        let Node::Mapping(task) = item else {
            continue;
        };
        for (j, entry) in task.entries().iter().enumerate() {
            let name = entry.key.name();
            if let Node::Sequence(nested) = &entry.value {
                if BLOCK_SECTIONS.contains(&name) {
                    collect_task_list(nested.items(), &item_path.child(PathStep::Entry(j)), name, tasks);
                }
            }
        }
    }
}

/// A top-level list of mappings without play keys, where at least one item
/// carries a task keyword or a mapping-valued key
fn looks_like_task_list(items: &[Node]) -> bool {
    let mappings: Vec<&Mapping> = items.iter().filter_map(Node::as_mapping).collect();
    if mappings.is_empty() {
        return false;
    }

    if mappings
        .iter()
        .any(|m| m.keys().any(|k| PLAY_KEYS.contains(&k)))
    {
        return false;
    }

    mappings.iter().any(|m| {
        m.entries().iter().any(|e| {
            let key = e.key.name();
            TASK_SIGNALS.contains(&key)
                || key.starts_with("with_")
                || (key != "vars" && e.value.is_mapping_or_null() && !matches!(e.value, Node::Null(_)))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_task(text: &str) -> Mapping {
        let doc = Document::parse(text).unwrap();
        doc.roots()[0].as_sequence().unwrap().items()[0]
            .as_mapping()
            .unwrap()
            .clone()
    }

    fn classify(text: &str) -> Classification {
        classify_task(&first_task(text), &ReservedKeywords::default())
    }

    #[test]
    fn mapping_argument_module() {
        let result = classify("- name: Install\n  package:\n    name: nginx\n  when: x\n");
        match result {
            Classification::Module(key) => {
                assert_eq!(key.name, "package");
                assert_eq!(key.index, 1);
                assert_eq!(key.form, ArgumentForm::Mapping);
                assert_eq!(key.position, Position::new(2, 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn null_argument_module() {
        match classify("- ping:\n  tags: [smoke]\n") {
            Classification::Module(key) => assert_eq!(key.name, "ping"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mapping_candidate_beats_stray_scalar() {
        match classify("- apt:\n    name: git\n  creates: /usr/bin/git\n") {
            Classification::Module(key) => assert_eq!(key.name, "apt"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn inline_argument_module() {
        match classify("- name: add\n  user: name=bob group=admin\n") {
            Classification::Module(key) => {
                assert_eq!(key.name, "user");
                assert_eq!(key.form, ArgumentForm::Inline);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn two_mapping_candidates_are_ambiguous() {
        let result = classify("- name: x\n  copy:\n    src: a\n  file:\n    path: b\n");
        assert_eq!(
            result,
            Classification::Ambiguous(vec!["copy".to_string(), "file".to_string()])
        );
    }

    #[test]
    fn two_inline_candidates_are_ambiguous() {
        let result = classify("- shell: echo hi\n  command: ls\n");
        assert!(matches!(result, Classification::Ambiguous(names) if names.len() == 2));
    }

    #[test]
    fn block_task() {
        let result = classify("- name: group\n  block:\n    - ping:\n  when: x\n");
        assert_eq!(result, Classification::Block);
    }

    #[test]
    fn only_reserved_keys() {
        let result = classify("- name: nothing\n  when: true\n  vars:\n    a: 1\n");
        assert_eq!(result, Classification::NoModule);
    }

    #[test]
    fn action_shorthand() {
        match classify("- name: legacy\n  action: apt name=git state=present\n") {
            Classification::Module(key) => {
                assert_eq!(key.name, "apt");
                assert_eq!(key.form, ArgumentForm::Action);
                assert_eq!(key.index, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn loop_keywords_are_reserved() {
        let reserved = ReservedKeywords::default();
        assert!(reserved.contains("with_items"));
        assert!(reserved.contains("with_dict"));
        assert!(reserved.contains("loop_control"));
        assert!(!reserved.contains("user"));
    }

    #[test]
    fn finds_tasks_in_plays_and_blocks() {
        let text = "- hosts: all\n  pre_tasks:\n    - ping:\n  tasks:\n    - block:\n        - debug:\n            msg: hi\n      rescue:\n        - fail:\n  handlers:\n    - service:\n        name: x\n";
        let doc = Document::parse(text).unwrap();
        let tasks = find_tasks(&doc, TaskListMode::Detect);
        let sections: Vec<_> = tasks.iter().map(|t| t.section.as_str()).collect();
        assert_eq!(sections, vec!["pre_tasks", "tasks", "block", "rescue", "handlers"]);

        let lines: Vec<_> = tasks.iter().map(|t| t.position.line).collect();
        assert_eq!(lines, vec![3, 5, 6, 9, 11]);
    }

    #[test]
    fn module_parameters_are_not_tasks() {
        let text = "- hosts: all\n  tasks:\n    - name: nested\n      include_role:\n        name: x\n        tasks_from: main\n      vars:\n        tasks:\n          - user:\n";
        let doc = Document::parse(text).unwrap();
        let tasks = find_tasks(&doc, TaskListMode::Detect);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn detects_bare_task_lists() {
        let role = Document::parse("- name: a\n  apt:\n    name: git\n").unwrap();
        assert_eq!(find_tasks(&role, TaskListMode::Detect).len(), 1);

        let data = Document::parse("- name: alice\n  group: admin\n- name: bob\n  group: dev\n").unwrap();
        assert!(find_tasks(&data, TaskListMode::Detect).is_empty());
        assert_eq!(find_tasks(&data, TaskListMode::Always).len(), 2);

        let vars = Document::parse("packages:\n  - git\n").unwrap();
        assert!(find_tasks(&vars, TaskListMode::Detect).is_empty());
    }

    #[test]
    fn task_list_mode_from_path() {
        assert_eq!(
            TaskListMode::for_path(Path::new("roles/web/tasks/main.yml")),
            TaskListMode::Always
        );
        assert_eq!(
            TaskListMode::for_path(Path::new("roles/web/handlers/main.yml")),
            TaskListMode::Always
        );
        assert_eq!(TaskListMode::for_path(Path::new("site.yml")), TaskListMode::Detect);
        assert_eq!(
            TaskListMode::for_path(Path::new("roles/web/defaults/main.yml")),
            TaskListMode::Detect
        );
    }
}
