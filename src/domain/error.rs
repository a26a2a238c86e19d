//! Error taxonomy for conversion and validation
//!
//! File-local errors (parse, file access, conversion, timeout) are captured
//! into result objects by the engines. Only [`ConfigurationError`] is meant to
//! propagate, because a bad mapping table must stop a run before it starts.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed input document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    /// 1-based line, when the parser reported one
    pub line: Option<usize>,
    /// 1-based column, when the parser reported one
    pub column: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Message prefixed with the position, for result error lists
    pub fn describe(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                format!("Parse error at line {}, column {}: {}", line, column, self.message)
            }
            _ => format!("Parse error: {}", self.message),
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        match err.location() {
            Some(loc) => Self::at(err.to_string(), loc.line(), loc.column()),
            None => Self::new(err.to_string()),
        }
    }
}

/// Bad mapping or override data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid fully-qualified name for '{short_name}': '{target}' (expected namespace.collection.module)")]
    InvalidTarget { short_name: String, target: String },

    #[error("Invalid short module name: '{0}'")]
    InvalidShortName(String),

    #[error("Failed to parse mapping table: {0}")]
    Parse(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Filesystem problems local to one file
#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("Backup already exists: {0} (use --force to overwrite)")]
    BackupExists(PathBuf),

    #[error("Backup not found: {0}")]
    BackupMissing(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not valid UTF-8: {0}")]
    Encoding(PathBuf),
}

/// Unexpected internal failure while converting one file
#[derive(Debug, Error)]
#[error("Conversion failed: {0}")]
pub struct ConversionError(pub String);

/// A unit of batch work ran past its deadline
#[derive(Debug, Error)]
#[error("Timed out after {}s", .0.as_secs_f64())]
pub struct TimeoutError(pub Duration);

/// Any error that can fail a single file
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    FileAccess(#[from] FileAccessError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Parse(_) => ErrorKind::Parse,
            EngineError::FileAccess(_) => ErrorKind::FileAccess,
            EngineError::Conversion(_) => ErrorKind::Conversion,
            EngineError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Message recorded in a result's `errors` list
    pub fn describe(&self) -> String {
        match self {
            EngineError::Parse(e) => e.describe(),
            other => other.to_string(),
        }
    }
}

/// Serializable tag naming which class of error failed a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Configuration,
    FileAccess,
    Conversion,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Configuration => "configuration",
            ErrorKind::FileAccess => "file_access",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_describe_includes_position() {
        let err = ParseError::at("mapping values are not allowed", 3, 7);
        assert_eq!(
            err.describe(),
            "Parse error at line 3, column 7: mapping values are not allowed"
        );

        let err = ParseError::new("unexpected end");
        assert_eq!(err.describe(), "Parse error: unexpected end");
    }

    #[test]
    fn parse_error_from_serde_yaml_keeps_location() {
        let err = serde_yaml::from_str::<serde_yaml::Value>("a: [1, 2\nb: 3\n").unwrap_err();
        let parsed = ParseError::from(err);
        assert!(parsed.line.is_some());
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FileAccess).unwrap();
        assert_eq!(json, "\"file_access\"");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn engine_error_kinds() {
        let parse: EngineError = ParseError::at("bad indent", 2, 1).into();
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert!(parse.describe().starts_with("Parse error at line 2"));

        let timeout: EngineError = TimeoutError(Duration::from_secs(2)).into();
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(timeout.describe(), "Timed out after 2s");
    }

    #[test]
    fn backup_exists_message() {
        let err = FileAccessError::BackupExists(PathBuf::from("site.yml.fqcn_backup"));
        assert!(err.to_string().contains("Backup already exists"));
    }
}
