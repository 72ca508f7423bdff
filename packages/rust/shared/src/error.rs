//! Error types for the report pipeline.
//!
//! Library crates use [`DwhError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum DwhError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Connection, query, or timeout failure at one source.
    #[error("source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    /// A hierarchical-file record missing a required field.
    #[error("malformed record in '{source_name}': {message}")]
    MalformedRecord {
        source_name: String,
        message: String,
    },

    /// A table handed to a stage does not carry the columns that stage expects.
    #[error("schema contract violated for '{source_name}': {message}")]
    SchemaContract {
        source_name: String,
        message: String,
    },

    /// Transformed tables cannot be combined into the summary.
    #[error("aggregation failed for '{source_name}': {message}")]
    Aggregation {
        source_name: String,
        message: String,
    },

    /// The report artifact could not be produced.
    #[error("write error at {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DwhError>;

/// Pipeline stage an error belongs to, used when reporting fatal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Config,
    Extract,
    Transform,
    Aggregate,
    Load,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Aggregate => "aggregate",
            Self::Load => "load",
        };
        f.write_str(name)
    }
}

impl DwhError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a source-unavailable error for the named source.
    pub fn source_unavailable(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed-record error for the named source.
    pub fn malformed(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a schema contract violation for the named source.
    pub fn schema_contract(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaContract {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create an aggregation error for the named source.
    pub fn aggregation(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Aggregation {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a write error for the given destination.
    pub fn write(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The stage this error is attributed to when it ends a run.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config { .. } => Stage::Config,
            Self::SourceUnavailable { .. } | Self::MalformedRecord { .. } => Stage::Extract,
            Self::SchemaContract { .. } => Stage::Transform,
            Self::Aggregation { .. } => Stage::Aggregate,
            Self::Write { .. } | Self::Io { .. } => Stage::Load,
        }
    }
}
