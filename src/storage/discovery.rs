//! Project and file discovery
//!
//! A project is the shallowest directory (within `max_discovery_depth` of a
//! root) that directly contains a file matching the include patterns. All
//! matching files beneath it belong to that project. Exclude patterns are
//! matched against paths relative to the root and prune whole directories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::backup::read_error;
use super::config::RunOptions;
use crate::domain::{ConfigurationError, FileAccessError};

/// A directory of playbooks processed as one unit of reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Compiled include/exclude patterns plus the depth limit
#[derive(Debug, Clone)]
pub struct Discovery {
    include: GlobSet,
    exclude: GlobSet,
    max_depth: usize,
}

fn build_set(patterns: &[String]) -> Result<GlobSet, ConfigurationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigurationError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigurationError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

impl Discovery {
    pub fn new(options: &RunOptions) -> Result<Self, ConfigurationError> {
        Ok(Self {
            include: build_set(&options.include_patterns)?,
            exclude: build_set(&options.exclude_patterns)?,
            max_depth: options.max_discovery_depth,
        })
    }

    /// Include patterns are matched against the file name only
    pub fn is_included(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| self.include.is_match(name))
    }

    /// Exclude patterns are matched against `relative`; a directory is also
    /// excluded when patterns of the form `dir/**` cover its contents
    pub fn is_excluded(&self, relative: &Path, is_dir: bool) -> bool {
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.exclude.is_match(relative) || (is_dir && self.exclude.is_match(relative.join("_")))
    }

    /// Finds the projects under `root`.
    ///
    /// A root that is a file becomes a single-file project and bypasses the
    /// include filter.
    pub fn discover(&self, root: &Path) -> Result<Vec<Project>, FileAccessError> {
        let meta = std::fs::metadata(root).map_err(|e| read_error(root, e))?;
        if meta.is_file() {
            return Ok(vec![Project {
                root: root.to_path_buf(),
                files: vec![root.to_path_buf()],
            }]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !self.is_excluded(relative, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable path");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_included(entry.path()) {
                files.push(entry.into_path());
            }
        }

        let holders: BTreeSet<PathBuf> = files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();

        let mut projects: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            match self.project_for(root, &file, &holders) {
                Some(project) => projects.entry(project).or_default().push(file),
                None => tracing::debug!(path = %file.display(), "file below discovery depth"),
            }
        }

        tracing::debug!(root = %root.display(), projects = projects.len(), "discovery finished");
        Ok(projects
            .into_iter()
            .map(|(root, files)| Project { root, files })
            .collect())
    }

    /// Shallowest ancestor of `file` within the depth limit that directly
    /// holds a matching file
    fn project_for(&self, root: &Path, file: &Path, holders: &BTreeSet<PathBuf>) -> Option<PathBuf> {
        let parent = file.parent()?;
        let relative = parent.strip_prefix(root).ok()?;

        let mut current = root.to_path_buf();
        if holders.contains(&current) {
            return Some(current);
        }
        for (depth, component) in relative.components().enumerate() {
            if depth + 1 > self.max_depth {
                return None;
            }
            current.push(component);
            if holders.contains(&current) {
                return Some(current);
            }
        }
        None
    }
}
