//! Aggregation and orchestration of a report run.
//!
//! This crate provides:
//! - [`aggregate`] — merges transformed tables and computes the summary row
//! - [`Pipeline`] — extract → transform → aggregate → load, with per-source
//!   failure isolation and a [`RunReport`] at the end

pub mod aggregate;
pub mod pipeline;

pub use aggregate::{SummarySpec, aggregate};
pub use dwh_connectors::SourceStatus;
pub use dwh_report::ArtifactMeta;
pub use pipeline::{
    FatalError, Pipeline, PipelineState, ProgressReporter, RunReport, SilentProgress,
    SourceReport, SummaryEntry,
};
