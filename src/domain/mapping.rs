//! Module mapping table
//!
//! Maps short module names (`apt`) to fully-qualified collection names
//! (`ansible.builtin.apt`). The table is built once at startup from the
//! built-in asset plus optional user overrides and is read-only afterwards,
//! so it can be shared across workers behind an `Arc`.

use std::collections::{BTreeMap, HashMap};

use super::error::ConfigurationError;

/// Built-in mapping table shipped with the binary
const DEFAULT_MAPPINGS: &str = include_str!("../../data/module_mappings.yml");

/// Returns true if `name` has exactly three non-empty dot-separated segments
pub fn is_valid_fqcn(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| is_name_segment(s))
}

/// Returns true if `name` is already written in qualified form.
///
/// Anything with at least two separators and non-empty segments counts,
/// which also covers legacy deep paths like `community.general.system.ufw`.
pub fn is_already_qualified(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    segments.len() >= 3 && segments.iter().all(|s| !s.trim().is_empty())
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parses a key/value table (YAML or JSON) of short name -> FQCN
pub fn parse_table(content: &str) -> Result<HashMap<String, String>, ConfigurationError> {
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }

    serde_yaml::from_str::<HashMap<String, String>>(content)
        .map_err(|e| ConfigurationError::Parse(e.to_string()))
}

/// Immutable short name -> fully-qualified name lookup table
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    entries: HashMap<String, String>,
    overridden: usize,
}

impl MappingStore {
    /// Merges `defaults` with `overrides`; override entries win on conflict.
    ///
    /// Every override target must be a valid `namespace.collection.module`.
    pub fn load(
        defaults: HashMap<String, String>,
        overrides: HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let mut entries = defaults;
        let mut overridden = 0;

        for (short_name, target) in overrides {
            if short_name.trim().is_empty() || short_name.contains(char::is_whitespace) {
                return Err(ConfigurationError::InvalidShortName(short_name));
            }
            if !is_valid_fqcn(&target) {
                return Err(ConfigurationError::InvalidTarget { short_name, target });
            }

            if entries.insert(short_name.clone(), target).is_some() {
                overridden += 1;
            }
            tracing::debug!(module = %short_name, "applied mapping override");
        }

        Ok(Self { entries, overridden })
    }

    /// Loads the built-in table, merged with an optional override table
    pub fn with_defaults(overrides: HashMap<String, String>) -> Result<Self, ConfigurationError> {
        Self::load(Self::builtin_table()?, overrides)
    }

    /// Parses the built-in mapping asset
    pub fn builtin_table() -> Result<HashMap<String, String>, ConfigurationError> {
        parse_table(DEFAULT_MAPPINGS)
    }

    /// Exact, case-sensitive lookup
    pub fn resolve(&self, short_name: &str) -> Option<&str> {
        self.entries.get(short_name).map(String::as_str)
    }

    /// Returns true if the short name is in the table
    pub fn is_known(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }

    /// Returns true if `name` is one of the table's fully-qualified targets
    pub fn is_known_target(&self, name: &str) -> bool {
        self.entries.values().any(|v| v == name)
    }

    pub fn is_already_qualified(&self, name: &str) -> bool {
        is_already_qualified(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of built-in entries replaced by overrides
    pub fn overridden(&self) -> usize {
        self.overridden
    }

    /// All entries sorted by short name
    pub fn sorted(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}
