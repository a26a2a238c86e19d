//! One unit of batch work: a single file
//!
//! The engine call runs under `catch_unwind` and an optional deadline. Only
//! the pure conversion is timed; the backup and write happen afterwards on
//! the worker thread, so a timed-out unit never leaves a partial write.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;

use crate::domain::{
    ConversionError, ConversionResult, Converter, EngineError, FileAccessError, MappingStore, TaskListMode,
    TimeoutError, ValidationResult, Validator,
};
use crate::storage::{read_error, BackupWriter, RunOptions};

/// Reads a file as UTF-8 text
pub fn read_text(path: &Path) -> Result<String, FileAccessError> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|_| FileAccessError::Encoding(path.to_path_buf()))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `job`, turning panics into [`ConversionError`] and enforcing
/// `timeout` when set.
///
/// A job that outlives its deadline is abandoned on a detached thread; its
/// result is dropped.
pub fn run_bounded<T, F>(timeout: Option<Duration>, job: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    let guarded = move || {
        panic::catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|payload| Err(ConversionError(panic_message(payload)).into()))
    };

    let Some(timeout) = timeout else {
        return guarded();
    };

    let (tx, rx) = channel::bounded(1);
    thread::Builder::new()
        .name("fqcn-unit".to_string())
        .spawn(move || {
            let _ = tx.send(guarded());
        })
        .map_err(|e| ConversionError(format!("failed to spawn unit thread: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(channel::RecvTimeoutError::Timeout) => Err(TimeoutError(timeout).into()),
        Err(channel::RecvTimeoutError::Disconnected) => {
            Err(ConversionError("unit thread exited without a result".to_string()).into())
        }
    }
}

/// Converts one file and commits it unless this is a dry run
pub fn convert_file(path: &Path, store: &Arc<MappingStore>, options: &RunOptions) -> ConversionResult {
    let started = Instant::now();

    let text = match read_text(path) {
        Ok(text) => text,
        Err(err) => return ConversionResult::failed(path, String::new(), &err.into(), started.elapsed()),
    };

    let mode = TaskListMode::for_path(path);
    let job = {
        let store = Arc::clone(store);
        let text = text.clone();
        move || Converter::new(&store).convert_text(&text, mode)
    };

    let conversion = match run_bounded(options.unit_timeout(), job) {
        Ok(conversion) => conversion,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "conversion failed");
            return ConversionResult::failed(path, text, &err, started.elapsed());
        }
    };

    let mut result = ConversionResult::succeeded(path, text, conversion, started.elapsed());

    if !options.dry_run {
        let writer = BackupWriter::from_options(options);
        match writer.commit(path, &result.original_content, &result.converted_content) {
            Ok(backup) => result.backup_path = backup,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "write failed");
                result.fail_with(&err.into());
            }
        }
    }

    result.processing_time = started.elapsed();
    tracing::debug!(
        path = %path.display(),
        changes = result.changes_made,
        success = result.success,
        "converted file"
    );
    result
}

/// Validates one file; never writes
pub fn validate_file(path: &Path, store: &Arc<MappingStore>, options: &RunOptions) -> ValidationResult {
    let started = Instant::now();

    let text = match read_text(path) {
        Ok(text) => text,
        Err(err) => return ValidationResult::failed(path, &err.into(), started.elapsed()),
    };

    let mode = TaskListMode::for_path(path);
    let strict = options.strict;
    let job = {
        let store = Arc::clone(store);
        move || Validator::new(&store, strict).validate_text(&text, mode)
    };

    match run_bounded(options.unit_timeout(), job) {
        Ok(report) => {
            let result = ValidationResult::from_report(path, report, started.elapsed());
            tracing::debug!(path = %path.display(), score = result.score, "validated file");
            result
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "validation failed");
            ValidationResult::failed(path, &err, started.elapsed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const PLAY: &str = "- hosts: all\n  tasks:\n    - apt:\n        name: git\n";

    fn store() -> Arc<MappingStore> {
        Arc::new(MappingStore::with_defaults(HashMap::new()).unwrap())
    }

    #[test]
    fn run_bounded_passes_results_through() {
        let value = run_bounded(None, || Ok::<_, EngineError>(42)).unwrap();
        assert_eq!(value, 42);

        let value = run_bounded(Some(Duration::from_secs(5)), || Ok::<_, EngineError>("done")).unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn run_bounded_catches_panics() {
        let err = run_bounded(None, || -> Result<(), EngineError> { panic!("walker bug") }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(err.to_string().contains("walker bug"));
    }

    #[test]
    fn run_bounded_times_out() {
        let err = run_bounded(Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            Ok::<_, EngineError>(())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn convert_file_writes_with_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, PLAY).unwrap();

        let result = convert_file(&path, &store(), &RunOptions::default());
        assert!(result.success);
        assert_eq!(result.changes_made, 1);
        assert!(result.backup_path.is_some());
        assert!(fs::read_to_string(&path).unwrap().contains("ansible.builtin.apt:"));

        // The second run trips over the first backup
        let again = convert_file(&path, &store(), &RunOptions::default());
        assert!(!again.success);
        assert_eq!(again.error_kind, Some(ErrorKind::FileAccess));
        assert!(again.errors[0].contains("Backup already exists"));
        assert_eq!(fs::read_to_string(result.backup_path.unwrap()).unwrap(), PLAY);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, PLAY).unwrap();

        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = convert_file(&path, &store(), &options);
        assert!(result.success);
        assert!(result.converted_content.contains("ansible.builtin.apt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), PLAY);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn byte_order_mark_survives_conversion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, format!("\u{feff}{}", PLAY)).unwrap();

        let result = convert_file(&path, &store(), &RunOptions::default());
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.changes_made, 1);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with('\u{feff}'));
        assert_eq!(written, format!("\u{feff}{}", PLAY.replace("apt:", "ansible.builtin.apt:")));
        assert_eq!(
            fs::read_to_string(result.backup_path.unwrap()).unwrap(),
            format!("\u{feff}{}", PLAY)
        );
    }

    #[test]
    fn non_utf8_file_fails_with_file_access() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.yml");
        fs::write(&path, [0x2d, 0x20, 0xff, 0xfe, 0x0a]).unwrap();

        let result = convert_file(&path, &store(), &RunOptions::default());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::FileAccess));
    }

    #[test]
    fn validate_file_reports_issue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.yml");
        fs::write(&path, PLAY).unwrap();

        let result = validate_file(&path, &store(), &RunOptions::default());
        assert!(result.success);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.score, 0.0);
        assert_eq!(fs::read_to_string(&path).unwrap(), PLAY);
    }
}
