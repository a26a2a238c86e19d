//! Domain logic for FQCN conversion
//!
//! Parsing, classification, conversion and validation of playbook text.
//! Nothing here touches the filesystem; reading and writing files lives in
//! [`crate::storage`].

mod classify;
mod convert;
mod document;
mod error;
mod mapping;
mod validate;

pub use classify::{
    classify_task, find_tasks, ArgumentForm, Classification, ModuleKey, ReservedKeywords, TaskListMode,
    TaskRef, BLOCK_SECTIONS, TASK_SECTIONS,
};
pub use convert::{Change, Conversion, ConversionResult, Converter};
pub use document::{
    locate, Document, Entry, Key, Mapping, Node, NodePath, PathStep, Position, QuoteStyle, Scalar, ScalarStyle,
    Sequence,
};
pub use error::{
    ConfigurationError, ConversionError, EngineError, ErrorKind, FileAccessError, ParseError, TimeoutError,
};
pub use mapping::{is_already_qualified, is_valid_fqcn, parse_table, MappingStore};
pub use validate::{Report, Severity, ValidationIssue, ValidationResult, Validator};

/// Serializes a [`std::time::Duration`] as fractional seconds
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    #[allow(dead_code)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
