//! `fqcn restore`

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use walkdir::WalkDir;

use super::common::Session;
use super::output::Output;
use crate::storage::BackupWriter;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Converted files, or directories to search for backups
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Suffix of the backup files
    #[arg(long, value_name = "SUFFIX")]
    pub backup_suffix: Option<String>,
}

pub fn run(args: RestoreArgs, session: &Session, output: &Output) -> Result<()> {
    let suffix = args
        .backup_suffix
        .unwrap_or_else(|| session.config.options.backup_suffix.clone());
    let writer = BackupWriter::new(suffix.clone(), true, false);

    let mut targets = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            targets.extend(backed_up_files(path, &suffix));
        } else {
            targets.push(path.clone());
        }
    }
    output.verbose_ctx("restore", &format!("{} file(s) to restore", targets.len()));

    let mut restored = Vec::new();
    let mut failed = Vec::new();
    for target in targets {
        match writer.restore(&target) {
            Ok(backup) => restored.push((target, backup)),
            Err(err) => failed.push((target, err.to_string())),
        }
    }

    if output.is_json() {
        let restored: Vec<_> = restored
            .iter()
            .map(|(path, backup)| serde_json::json!({ "path": path, "backup": backup }))
            .collect();
        let failed: Vec<_> = failed
            .iter()
            .map(|(path, error)| serde_json::json!({ "path": path, "error": error }))
            .collect();
        output.data(&serde_json::json!({ "restored": restored, "failed": failed }));
    } else {
        for (path, _) in &restored {
            println!("Restored {}", path.display());
        }
        for (path, error) in &failed {
            output.error(&format!("{}: {}", path.display(), error));
        }
        if restored.is_empty() && failed.is_empty() {
            println!("No backups found.");
        }
    }

    if !failed.is_empty() {
        bail!("{} file(s) could not be restored", failed.len());
    }
    Ok(())
}

/// Originals under `dir` that have a backup next to them
fn backed_up_files(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            let original = name.strip_suffix(suffix).filter(|n| !n.is_empty())?;
            Some(e.path().with_file_name(original))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_originals_of_backups() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("roles")).unwrap();
        fs::write(dir.path().join("site.yml.fqcn_backup"), "a").unwrap();
        fs::write(dir.path().join("roles/main.yml.fqcn_backup"), "b").unwrap();
        fs::write(dir.path().join("other.yml"), "c").unwrap();

        let found = backed_up_files(dir.path(), ".fqcn_backup");
        assert_eq!(
            found,
            vec![dir.path().join("roles/main.yml"), dir.path().join("site.yml")]
        );
    }
}
