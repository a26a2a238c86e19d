//! # Storage Layer
//!
//! Everything that touches the filesystem: configuration files, discovery
//! of playbook projects, and backup plus atomic write of converted files.
//!
//! ## Files
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Global config | TOML | `<config dir>/fqcn-converter/config.toml` |
//! | Project config | TOML | `.fqcn.toml` (nearest ancestor of cwd) |
//! | Mapping overrides | YAML or JSON | named by `mappings` or `--mappings` |
//! | Backups | original bytes | `<file><backup_suffix>` next to the file |
//!
//! ## Write Safety
//!
//! - Converted content goes to a temp file locked with `fs2`, then is renamed
//!   over the original
//! - A backup is created with `create_new` and never replaced without `force`

mod backup;
mod config;
mod discovery;

pub use backup::{write_atomic, BackupWriter};
pub(crate) use backup::read_error;
pub use config::{Config, ConfigFile, OutputFormat, RunOptions, DEFAULT_BACKUP_SUFFIX, PROJECT_CONFIG_FILE};
pub use discovery::{Discovery, Project};
