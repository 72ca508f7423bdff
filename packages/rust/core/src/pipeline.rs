//! End-to-end run: extract → transform → aggregate → load.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use dwh_connectors::{Extraction, SourceStatus, extract};
use dwh_report::{ArtifactMeta, write_report};
use dwh_shared::{
    AppConfig, DwhError, Result, RunId, Schema, SourceDescriptor, Stage, SummaryRecord, Table,
};
use dwh_transform::{transform, transformer_for};

use crate::aggregate::{SummarySpec, aggregate};

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Where a run is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Extracting,
    TransformingAndAggregating,
    Loaded,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Extracting => "extracting",
            Self::TransformingAndAggregating => "transforming and aggregating",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        })
    }
}

/// Per-source outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub kind: String,
    pub status: SourceStatus,
    pub rows: usize,
    pub skipped_records: usize,
    pub elapsed_ms: u64,
}

/// The error that ended a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct FatalError {
    pub stage: Stage,
    pub message: String,
}

/// One summary field, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub field: String,
    pub value: String,
}

/// Everything a caller needs to know about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub state: PipelineState,
    pub sources: Vec<SourceReport>,
    pub summary: Vec<SummaryEntry>,
    pub artifact: Option<ArtifactMeta>,
    pub error: Option<FatalError>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Loaded
    }

    /// Sources that did not extract cleanly.
    pub fn degraded_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.status.is_ok())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DwhError::config(format!("serialize run report: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each source finishes extracting, in completion order.
    fn source_extracted(&self, name: &str, status: &SourceStatus, completed: usize, total: usize);
    /// Called once the run has ended, successfully or not.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_extracted(
        &self,
        _name: &str,
        _status: &SourceStatus,
        _completed: usize,
        _total: usize,
    ) {
    }
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A validated configuration, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<AppConfig>,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run once, writing the report to `destination`.
    ///
    /// Unavailable sources never fail the run; they show up as empty sheets
    /// and a non-`ok` status. Transform, aggregate and load failures end the
    /// run in [`PipelineState::Failed`] with the stage recorded.
    #[instrument(skip_all, fields(destination = %destination.display()))]
    pub async fn run(&self, destination: &Path, progress: &dyn ProgressReporter) -> RunReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            %run_id,
            %started_at,
            sources = self.config.sources.len(),
            parallel = self.config.pipeline.parallel,
            "ETL run started"
        );

        let mut state = PipelineState::Extracting;
        debug!(%state, "entering state");
        progress.phase("Extracting sources");
        let extractions = self.extract_all(progress).await;

        let sources: Vec<SourceReport> = self
            .config
            .sources
            .iter()
            .zip(&extractions)
            .map(|(descriptor, extraction)| SourceReport {
                name: descriptor.name.clone(),
                kind: descriptor.connection.kind_name().to_string(),
                status: extraction.status.clone(),
                rows: extraction.table.len(),
                skipped_records: extraction.skipped_records,
                elapsed_ms: millis(extraction.elapsed),
            })
            .collect();

        state = PipelineState::TransformingAndAggregating;
        debug!(%state, "entering state");

        let mut summary = Vec::new();
        let mut artifact = None;
        let mut fatal = None;
        match self.finish(extractions, destination, progress).await {
            Ok((record, meta)) => {
                state = PipelineState::Loaded;
                summary = record
                    .fields()
                    .iter()
                    .map(|(field, value)| SummaryEntry {
                        field: field.clone(),
                        value: value.to_string(),
                    })
                    .collect();
                artifact = Some(meta);
            }
            Err(e) => {
                let stage = e.stage();
                state = PipelineState::Failed;
                error!(%stage, error = %e, "ETL run failed");
                fatal = Some(FatalError {
                    stage,
                    message: e.to_string(),
                });
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            state,
            sources,
            summary,
            artifact,
            error: fatal,
            elapsed_ms: millis(start.elapsed()),
        };

        info!(
            run_id = %report.run_id,
            state = %report.state,
            degraded = report.degraded_sources().count(),
            elapsed_ms = report.elapsed_ms,
            finished_at = %Utc::now(),
            "ETL run finished"
        );
        progress.done(&report);
        report
    }

    /// Extract every source, returning results in configured order.
    async fn extract_all(&self, progress: &dyn ProgressReporter) -> Vec<Extraction> {
        let sources = &self.config.sources;
        let total = sources.len();
        let default_timeout = self.config.pipeline.timeout_secs;

        if !self.config.pipeline.parallel {
            let mut extractions = Vec::with_capacity(total);
            for (idx, descriptor) in sources.iter().enumerate() {
                let extraction = extract(descriptor, descriptor.timeout(default_timeout)).await;
                progress.source_extracted(&descriptor.name, &extraction.status, idx + 1, total);
                extractions.push(extraction);
            }
            return extractions;
        }

        let limit = self.config.pipeline.max_concurrency.unwrap_or(total).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (idx, descriptor) in sources.iter().enumerate() {
            let descriptor = descriptor.clone();
            let semaphore = Arc::clone(&semaphore);
            let timeout = descriptor.timeout(default_timeout);
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                (idx, extract(&descriptor, timeout).await)
            });
        }

        let mut slots: Vec<Option<Extraction>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, extraction)) => {
                    completed += 1;
                    let name = &sources[idx].name;
                    progress.source_extracted(name, &extraction.status, completed, total);
                    slots[idx] = Some(extraction);
                }
                Err(e) => warn!(error = %e, "extraction task failed"),
            }
        }

        slots
            .into_iter()
            .zip(sources)
            .map(|(slot, descriptor)| slot.unwrap_or_else(|| lost_extraction(descriptor)))
            .collect()
    }

    /// Transform, aggregate, load. Each stage is a barrier.
    ///
    /// Errors carry their own [`Stage`] via [`DwhError::stage`].
    async fn finish(
        &self,
        extractions: Vec<Extraction>,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<(SummaryRecord, ArtifactMeta)> {
        progress.phase("Transforming");
        let mut tables = Vec::with_capacity(extractions.len());
        for (descriptor, extraction) in self.config.sources.iter().zip(extractions) {
            let transformer = transformer_for(descriptor.transform, &self.config.rules);
            let table = transform(transformer.as_ref(), &descriptor.name, &extraction.table)?;
            tables.push((descriptor.name.clone(), table));
        }

        progress.phase("Aggregating");
        let spec = SummarySpec::from_config(&self.config);
        let (collection, summary) = aggregate(tables, &spec)?;

        // Encoding and file I/O are blocking.
        progress.phase("Writing report");
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || {
            write_report(&collection, &summary, &target).map(|meta| (summary, meta))
        })
        .await
        .map_err(|e| DwhError::write(destination, format!("report writer task: {e}")))?
    }
}

/// Stand-in for a source whose extraction task panicked.
fn lost_extraction(descriptor: &SourceDescriptor) -> Extraction {
    Extraction {
        table: Table::empty(Schema::new(descriptor.columns.iter().cloned())),
        status: SourceStatus::Degraded {
            reason: "extraction task failed".into(),
        },
        skipped_records: 0,
        elapsed: Duration::ZERO,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
