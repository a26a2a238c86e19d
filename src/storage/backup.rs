//! Backup and atomic write of converted files
//!
//! The original content is snapshotted next to the file (`site.yml` ->
//! `site.yml.fqcn_backup`) before the converted text replaces it. A backup
//! that already exists is never overwritten unless `force` is set.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::config::RunOptions;
use crate::domain::FileAccessError;

/// Writes converted files, keeping a backup of the original
#[derive(Debug, Clone)]
pub struct BackupWriter {
    suffix: String,
    create_backup: bool,
    force: bool,
}

impl BackupWriter {
    pub fn new(suffix: impl Into<String>, create_backup: bool, force: bool) -> Self {
        Self {
            suffix: suffix.into(),
            create_backup,
            force,
        }
    }

    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(options.backup_suffix.clone(), options.create_backup, options.force)
    }

    /// Backup location for `path`
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Fails if writing `path` would clobber an existing backup
    pub fn check(&self, path: &Path) -> Result<(), FileAccessError> {
        if self.create_backup && !self.force {
            let backup = self.backup_path(path);
            if backup.exists() {
                return Err(FileAccessError::BackupExists(backup));
            }
        }
        Ok(())
    }

    /// Backs up `original` and replaces `path` with `converted`.
    ///
    /// Returns the backup path when one was written. Unchanged content is
    /// not written at all, but the backup conflict check still applies.
    pub fn commit(&self, path: &Path, original: &str, converted: &str) -> Result<Option<PathBuf>, FileAccessError> {
        self.check(path)?;

        if original == converted {
            return Ok(None);
        }

        let backup = if self.create_backup {
            let backup = self.backup_path(path);
            self.write_backup(&backup, original)?;
            tracing::debug!(backup = %backup.display(), "wrote backup");
            Some(backup)
        } else {
            None
        };

        write_atomic(path, converted)?;
        Ok(backup)
    }

    fn write_backup(&self, backup: &Path, original: &str) -> Result<(), FileAccessError> {
        let mut open = OpenOptions::new();
        open.write(true);
        if self.force {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let file = open.open(backup).map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => FileAccessError::BackupExists(backup.to_path_buf()),
            _ => FileAccessError::Write {
                path: backup.to_path_buf(),
                source,
            },
        })?;

        let mut writer = BufWriter::new(&file);
        writer
            .write_all(original.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|source| FileAccessError::Write {
                path: backup.to_path_buf(),
                source,
            })
    }

    /// Puts the backup of `path` back in place and removes it
    pub fn restore(&self, path: &Path) -> Result<PathBuf, FileAccessError> {
        let backup = self.backup_path(path);
        if !backup.is_file() {
            return Err(FileAccessError::BackupMissing(backup));
        }

        let content = fs::read_to_string(&backup).map_err(|source| read_error(&backup, source))?;
        write_atomic(path, &content)?;
        fs::remove_file(&backup).map_err(|source| FileAccessError::Write {
            path: backup.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "restored from backup");
        Ok(backup)
    }
}

/// Writes `content` to `path` via a locked temp file and rename
pub fn write_atomic(path: &Path, content: &str) -> Result<(), FileAccessError> {
    let write_err = |source| FileAccessError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_name: OsString = path.as_os_str().to_owned();
    temp_name.push(".fqcn_tmp");
    let temp_path = PathBuf::from(temp_name);

    let result = (|| {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.lock_exclusive()?;

        let mut writer = BufWriter::new(&file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&temp_path, meta.permissions())?;
        }

        fs::rename(&temp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(source));
    }
    Ok(())
}

pub(crate) fn read_error(path: &Path, source: std::io::Error) -> FileAccessError {
    FileAccessError::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn commit_writes_backup_then_target() {
        let (_dir, path) = setup("old\n");
        let writer = BackupWriter::new(".fqcn_backup", true, false);

        let backup = writer.commit(&path, "old\n", "new\n").unwrap();
        let backup = backup.unwrap();
        assert_eq!(backup.file_name().unwrap(), "site.yml.fqcn_backup");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn second_commit_fails_without_force() {
        let (_dir, path) = setup("old\n");
        let writer = BackupWriter::new(".fqcn_backup", true, false);
        writer.commit(&path, "old\n", "new\n").unwrap();

        // Even with nothing left to change
        let err = writer.commit(&path, "new\n", "new\n").unwrap_err();
        assert!(matches!(err, FileAccessError::BackupExists(_)));
        assert_eq!(fs::read_to_string(writer.backup_path(&path)).unwrap(), "old\n");
    }

    #[test]
    fn force_overwrites_backup() {
        let (_dir, path) = setup("old\n");
        BackupWriter::new(".fqcn_backup", true, false)
            .commit(&path, "old\n", "new\n")
            .unwrap();

        let writer = BackupWriter::new(".fqcn_backup", true, true);
        writer.commit(&path, "new\n", "newer\n").unwrap();
        assert_eq!(fs::read_to_string(writer.backup_path(&path)).unwrap(), "new\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "newer\n");
    }

    #[test]
    fn no_backup_mode() {
        let (_dir, path) = setup("old\n");
        let writer = BackupWriter::new(".fqcn_backup", false, false);
        assert!(writer.commit(&path, "old\n", "new\n").unwrap().is_none());
        assert!(!writer.backup_path(&path).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn unchanged_content_is_not_written() {
        let (_dir, path) = setup("same\n");
        let writer = BackupWriter::new(".bak", true, false);
        assert!(writer.commit(&path, "same\n", "same\n").unwrap().is_none());
        assert!(!writer.backup_path(&path).exists());
    }

    #[test]
    fn restore_round_trip() {
        let (_dir, path) = setup("old\n");
        let writer = BackupWriter::new(".bak", true, false);
        writer.commit(&path, "old\n", "new\n").unwrap();

        writer.restore(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert!(!writer.backup_path(&path).exists());

        let err = writer.restore(&path).unwrap_err();
        assert!(matches!(err, FileAccessError::BackupMissing(_)));
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let (dir, path) = setup("a\n");
        write_atomic(&path, "b\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("site.yml")]);
    }

    #[test]
    fn write_failure_keeps_backup() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the target path makes the final rename fail
        let path = dir.path().join("site.yml");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let writer = BackupWriter::new(".bak", true, false);
        let err = writer.commit(&path, "original\n", "converted\n").unwrap_err();
        assert!(matches!(err, FileAccessError::Write { .. }));

        assert_eq!(fs::read_to_string(writer.backup_path(&path)).unwrap(), "original\n");
        assert!(!dir.path().join("site.yml.fqcn_tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("site.yml");
        let writer = BackupWriter::new(".bak", false, false);
        let err = writer.commit(&path, "a", "b").unwrap_err();
        assert!(matches!(err, FileAccessError::Write { .. }));
    }
}
