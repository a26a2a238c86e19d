//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `convert <paths>` | Rewrite short module names (with backups) |
//! | `validate <paths>` | Score compliance and list issues |
//! | `restore <paths>` | Undo a conversion from its backups |
//! | `mappings list`, `mappings show <name>` | Inspect the mapping table |
//!
//! ## Output Formats
//!
//! All commands support `--format`:
//! - `text` (default) - Human-readable output
//! - `json` - The batch report as JSON
//!
//! ## Verbose Mode
//!
//! `--verbose` (or `-v`) prints `[verbose:...]` lines and raises the
//! `tracing` level to `debug` unless `FQCN_LOG` is set:
//! ```bash
//! fqcn --verbose convert --dry-run playbooks/
//! ```

mod app;
mod common;
mod convert;
mod mappings;
mod output;
mod restore;
mod validate;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
