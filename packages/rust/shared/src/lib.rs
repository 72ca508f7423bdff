//! Shared types, error model, and configuration for the report pipeline.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`DwhError`] — the unified error type
//! - Tabular data types ([`Table`], [`Schema`], [`Value`], [`RunId`])
//! - Configuration ([`AppConfig`], [`SourceDescriptor`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConnectionConfig, OracleConnection, OutputConfig, PipelineSettings, REVENUE_FIELD,
    RevenueConfig, RulesConfig, ServerConnection, SourceDescriptor, SqliteConnection,
    TransformProfile, XmlConnection, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{DwhError, Result, Stage};
pub use types::{NamedCollection, Row, RunId, Schema, SummaryRecord, Table, Value};
