//! Source connectors and the extraction failure boundary.
//!
//! This crate provides:
//! - [`Connector`] — the closed set of source variants (relational dialects, XML)
//! - [`extract`] — runs one connector under a timeout and turns every failure
//!   into an empty table plus a tagged [`SourceStatus`]

pub mod relational;
pub mod xml;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use dwh_shared::{ConnectionConfig, Result, Schema, SourceDescriptor, Table};

pub use relational::{Dialect, RelationalConnector};
pub use xml::XmlConnector;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Rows read by a connector before the failure boundary is applied.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Materialized rows in the declared schema.
    pub table: Table,
    /// Records dropped because they were malformed.
    pub skipped_records: usize,
}

/// Outcome of extracting one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Degraded { reason: String },
    TimedOut { after_ms: u64 },
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
        }
    }
}

/// What the orchestrator receives for each source.
///
/// `table` always carries the declared schema; it is empty unless `status` is `Ok`.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub table: Table,
    pub status: SourceStatus,
    pub skipped_records: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// One connector variant per source kind, selected by the descriptor's `kind` tag.
#[derive(Debug, Clone)]
pub enum Connector {
    Relational(RelationalConnector),
    Xml(XmlConnector),
}

impl Connector {
    /// Pick the connector for a descriptor's connection kind.
    pub fn for_source(descriptor: &SourceDescriptor) -> Self {
        match &descriptor.connection {
            ConnectionConfig::Postgres(c) => {
                Self::Relational(RelationalConnector::Postgres(c.clone()))
            }
            ConnectionConfig::Mysql(c) => Self::Relational(RelationalConnector::Mysql(c.clone())),
            ConnectionConfig::Oracle(c) => {
                Self::Relational(RelationalConnector::Oracle(c.clone()))
            }
            ConnectionConfig::Sqlite(c) => {
                Self::Relational(RelationalConnector::Sqlite(c.clone()))
            }
            ConnectionConfig::Xml(c) => Self::Xml(XmlConnector::new(c.clone())),
        }
    }

    /// Human-readable connector name for tracing.
    pub fn name(&self) -> String {
        match self {
            Self::Relational(r) => r.dialect().to_string(),
            Self::Xml(_) => "xml".to_string(),
        }
    }

    /// Open, read everything, release. Errors are `SourceUnavailable`.
    pub async fn fetch(&self, source: &str, schema: &Schema) -> Result<Fetched> {
        match self {
            Self::Relational(r) => Ok(Fetched {
                table: r.fetch(source, schema).await?,
                skipped_records: 0,
            }),
            Self::Xml(x) => x.fetch(source, schema).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Failure boundary
// ---------------------------------------------------------------------------

/// Extract one source, never failing.
///
/// Connection, query and timeout failures yield an empty table with the
/// declared schema and a non-`Ok` status. Dropping the connector future on
/// timeout releases its connection.
#[instrument(skip_all, fields(source = %descriptor.name, kind = descriptor.connection.kind_name()))]
pub async fn extract(descriptor: &SourceDescriptor, timeout: Duration) -> Extraction {
    let schema = Schema::new(descriptor.columns.iter().cloned());
    let connector = Connector::for_source(descriptor);
    let start = Instant::now();

    let outcome = tokio::time::timeout(timeout, connector.fetch(&descriptor.name, &schema)).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(fetched)) => {
            info!(
                rows = fetched.table.len(),
                skipped = fetched.skipped_records,
                elapsed_ms = elapsed.as_millis(),
                "source extracted"
            );
            Extraction {
                table: fetched.table,
                status: SourceStatus::Ok,
                skipped_records: fetched.skipped_records,
                elapsed,
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "source unavailable, continuing with empty table");
            Extraction {
                table: Table::empty(schema),
                status: SourceStatus::Degraded {
                    reason: e.to_string(),
                },
                skipped_records: 0,
                elapsed,
            }
        }
        Err(_) => {
            let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(after_ms, "source timed out, continuing with empty table");
            Extraction {
                table: Table::empty(schema),
                status: SourceStatus::TimedOut { after_ms },
                skipped_records: 0,
                elapsed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwh_shared::{ServerConnection, TransformProfile, XmlConnection};

    fn descriptor(name: &str, connection: ConnectionConfig) -> SourceDescriptor {
        SourceDescriptor {
            name: name.into(),
            transform: TransformProfile::Passthrough,
            columns: vec!["id".into(), "name".into()],
            summary_label: None,
            timeout_secs: None,
            connection,
        }
    }

    fn postgres_at(port: u16) -> ConnectionConfig {
        ConnectionConfig::Postgres(ServerConnection {
            host: "127.0.0.1".into(),
            port: Some(port),
            database: "finance".into(),
            user: "nobody".into(),
            password_env: None,
            query: "SELECT id, name FROM t".into(),
        })
    }

    #[test]
    fn connector_selected_by_kind() {
        let pg = Connector::for_source(&descriptor("a", postgres_at(5432)));
        assert_eq!(pg.name(), "postgres");

        let xml = Connector::for_source(&descriptor(
            "b",
            ConnectionConfig::Xml(XmlConnection {
                path: "x.xml".into(),
                record_tag: "row".into(),
            }),
        ));
        assert_eq!(xml.name(), "xml");
    }

    #[tokio::test]
    async fn missing_file_degrades_to_empty_table() {
        let source = descriptor(
            "people",
            ConnectionConfig::Xml(XmlConnection {
                path: "/definitely/not/here/people.xml".into(),
                record_tag: "customer".into(),
            }),
        );

        let extraction = extract(&source, Duration::from_secs(5)).await;

        assert!(matches!(extraction.status, SourceStatus::Degraded { .. }));
        assert!(extraction.table.is_empty());
        assert_eq!(extraction.table.schema().columns(), ["id", "name"]);
    }

    #[tokio::test]
    async fn refused_connection_degrades() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let extraction =
            extract(&descriptor("tx", postgres_at(port)), Duration::from_secs(10)).await;

        match &extraction.status {
            SourceStatus::Degraded { reason } => assert!(reason.contains("'tx' unavailable")),
            other => panic!("expected degraded, got {other:?}"),
        }
        assert!(extraction.table.is_empty());
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Accepts TCP connections but never answers the startup handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let extraction =
            extract(&descriptor("tx", postgres_at(port)), Duration::from_millis(300)).await;

        assert_eq!(extraction.status, SourceStatus::TimedOut { after_ms: 300 });
        assert!(extraction.table.is_empty());
        drop(listener);
    }

    #[test]
    fn status_display() {
        assert_eq!(SourceStatus::Ok.to_string(), "ok");
        assert_eq!(
            SourceStatus::TimedOut { after_ms: 50 }.to_string(),
            "timed out after 50ms"
        );
    }
}
