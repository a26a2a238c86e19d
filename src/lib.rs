//! fqcn-converter - rewrites Ansible playbooks to fully-qualified module names
//!
//! Short module keys such as `apt:` are replaced by their fully-qualified
//! collection names (`ansible.builtin.apt:`) without reformatting anything
//! else in the file. A read-only validation mode scores how much of a tree
//! is already converted.

pub mod batch;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod storage;

pub use batch::{BatchCoordinator, BatchResult, Mode};
pub use domain::{ConversionResult, Converter, MappingStore, ValidationResult, Validator};
pub use storage::RunOptions;
