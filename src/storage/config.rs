//! Configuration handling for fqcn-converter
//!
//! Run options are layered: built-in defaults, then the global
//! `config.toml` in the platform config directory, then the nearest
//! `.fqcn.toml` (or an explicit `--config` file), then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{parse_table, MappingStore};

/// Project-level configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".fqcn.toml";

/// Default suffix appended to backup files
pub const DEFAULT_BACKUP_SUFFIX: &str = ".fqcn_backup";

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Options passed by value into every batch and engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Compute conversions without writing anything
    pub dry_run: bool,

    pub create_backup: bool,

    pub backup_suffix: String,

    /// Overwrite an existing backup
    pub force: bool,

    /// Report convertible short names as errors instead of warnings
    pub strict: bool,

    pub include_patterns: Vec<String>,

    pub exclude_patterns: Vec<String>,

    /// Worker pool size; `None` uses the available parallelism
    pub max_workers: Option<usize>,

    pub continue_on_error: bool,

    pub max_discovery_depth: usize,

    /// Per-file deadline in seconds; fractions allowed
    pub unit_timeout_secs: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            create_backup: true,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            force: false,
            strict: false,
            include_patterns: vec!["*.yml".to_string(), "*.yaml".to_string()],
            exclude_patterns: vec![
                "**/.git/**".to_string(),
                "**/.tox/**".to_string(),
                "**/venv/**".to_string(),
                "**/.venv/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            max_workers: None,
            continue_on_error: true,
            max_discovery_depth: 5,
            unit_timeout_secs: None,
        }
    }
}

impl RunOptions {
    /// Effective worker count, never zero
    pub fn workers(&self) -> usize {
        match self.max_workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Deadline for one file; negative or non-finite values mean none
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_secs.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Contents of a `config.toml` or `.fqcn.toml` file.
///
/// Every field is optional so that later layers only override what they set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Default output format
    pub format: Option<OutputFormat>,

    /// Mapping override table (YAML or JSON), relative to the config file
    pub mappings: Option<PathBuf>,

    pub dry_run: Option<bool>,
    pub create_backup: Option<bool>,
    pub backup_suffix: Option<String>,
    pub force: Option<bool>,
    pub strict: Option<bool>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
    pub max_workers: Option<usize>,
    pub continue_on_error: Option<bool>,
    pub max_discovery_depth: Option<usize>,
    pub unit_timeout_secs: Option<f64>,
}

impl ConfigFile {
    /// Reads and parses a config file
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let mut file: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        if let (Some(mappings), Some(dir)) = (file.mappings.as_mut(), path.parent()) {
            if mappings.is_relative() {
                *mappings = dir.join(&*mappings);
            }
        }

        Ok(file)
    }

    /// Applies every field this file sets onto `options`
    pub fn apply(&self, options: &mut RunOptions) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    options.$field = value.clone();
                })*
            };
        }
        set!(
            dry_run,
            create_backup,
            backup_suffix,
            force,
            strict,
            include_patterns,
            exclude_patterns,
            continue_on_error,
            max_discovery_depth
        );
        if self.max_workers.is_some() {
            options.max_workers = self.max_workers;
        }
        if self.unit_timeout_secs.is_some() {
            options.unit_timeout_secs = self.unit_timeout_secs;
        }
    }
}

/// Merged configuration (defaults + global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub options: RunOptions,
    pub format: Option<OutputFormat>,
    /// Mapping override file from the last layer that named one
    pub mappings: Option<PathBuf>,
    /// Config files that were read, in load order
    pub sources: Vec<PathBuf>,
}

impl Config {
    /// Loads configuration from the default locations, or from `explicit`
    /// instead of the project file when given
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let global = Self::global_config_path().filter(|p| p.is_file());

        let project = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| Self::find_project_config(&cwd)),
        };

        Self::load_from(global.as_deref(), project.as_deref())
    }

    /// Loads the given layers on top of the defaults
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        for path in [global, project].into_iter().flatten() {
            let file = ConfigFile::read(path)?;
            file.apply(&mut config.options);
            if file.format.is_some() {
                config.format = file.format;
            }
            if file.mappings.is_some() {
                config.mappings = file.mappings;
            }
            config.sources.push(path.to_path_buf());
            tracing::debug!(path = %path.display(), "loaded config file");
        }

        Ok(config)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "fqcn", "fqcn-converter").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Finds the nearest `.fqcn.toml` walking up from `start`
    pub fn find_project_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join(PROJECT_CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Builds the mapping store, with `cli_override` taking precedence over
    /// the configured override file
    pub fn mapping_store(&self, cli_override: Option<&Path>) -> Result<MappingStore> {
        let overrides = match cli_override.or(self.mappings.as_deref()) {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read mapping overrides: {}", path.display()))?;
                parse_table(&content)
                    .with_context(|| format!("Invalid mapping overrides: {}", path.display()))?
            }
            None => Default::default(),
        };

        let store = MappingStore::with_defaults(overrides).context("Failed to load mapping table")?;
        tracing::debug!(entries = store.len(), overridden = store.overridden(), "mapping table ready");
        Ok(store)
    }
}
