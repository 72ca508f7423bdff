//! Application configuration for the report pipeline.
//!
//! User config lives at `~/.dwh-report/dwh-report.toml` unless a path is given
//! explicitly. CLI flags override config file values, which override defaults.
//! When no file exists the defaults describe the four classic sources
//! (PostgreSQL transactions, Oracle orders, MySQL invoices, XML customers).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DwhError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dwh-report.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dwh-report";

/// Summary field holding the summed revenue column.
pub const REVENUE_FIELD: &str = "total_revenue";

// ---------------------------------------------------------------------------
// Config structs (matching dwh-report.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Report destination.
    #[serde(default)]
    pub output: OutputConfig,

    /// Execution settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Business-rule parameters used by the transformers.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Which source and column feed `total_revenue`.
    #[serde(default)]
    pub revenue: RevenueConfig,

    /// Configured sources, in report order.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            pipeline: PipelineSettings::default(),
            rules: RulesConfig::default(),
            revenue: RevenueConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the `.xlsx` artifact.
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    "combined_etl_output.xlsx".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Extract sources concurrently.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Per-source connection + query timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent extractions (defaults to the source count).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parallel: true,
            timeout_secs: default_timeout_secs(),
            max_concurrency: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[rules]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Tax applied to invoice values.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Customers who signed up in or after this year are active.
    #[serde(default = "default_active_since_year")]
    pub active_since_year: i32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            active_since_year: default_active_since_year(),
        }
    }
}

fn default_tax_rate() -> Decimal {
    Decimal::new(18, 2)
}
fn default_active_since_year() -> i32 {
    2020
}

/// `[revenue]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueConfig {
    /// Source whose table is summed.
    #[serde(default = "default_revenue_source")]
    pub source: String,

    /// Column of that source's transformed table to sum.
    #[serde(default = "default_revenue_column")]
    pub column: String,
}

impl Default for RevenueConfig {
    fn default() -> Self {
        Self {
            source: default_revenue_source(),
            column: default_revenue_column(),
        }
    }
}

fn default_revenue_source() -> String {
    "invoices".into()
}
fn default_revenue_column() -> String {
    "net_value".into()
}

// ---------------------------------------------------------------------------
// Source descriptors
// ---------------------------------------------------------------------------

/// Named rule set applied to a source's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformProfile {
    Transactions,
    Orders,
    Invoices,
    Customers,
    Passthrough,
}

impl std::fmt::Display for TransformProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transactions => "transactions",
            Self::Orders => "orders",
            Self::Invoices => "invoices",
            Self::Customers => "customers",
            Self::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// `[[sources]]` entry: one source, immutable for the life of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique name; also the sheet name and the collection key.
    pub name: String,

    /// Rule set applied after extraction.
    pub transform: TransformProfile,

    /// Declared output columns, positionally matching the query result.
    pub columns: Vec<String>,

    /// Summary field name for this source's row count (default `total_<name>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_label: Option<String>,

    /// Overrides `pipeline.timeout_secs` for this source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Where and how to read the data.
    pub connection: ConnectionConfig,
}

impl SourceDescriptor {
    /// Summary field name for this source's row count.
    pub fn summary_label(&self) -> String {
        self.summary_label
            .clone()
            .unwrap_or_else(|| format!("total_{}", self.name))
    }

    /// Effective timeout, falling back to the pipeline default.
    pub fn timeout(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(default_secs))
    }
}

/// `[sources.connection]` table, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Postgres(ServerConnection),
    Mysql(ServerConnection),
    Oracle(OracleConnection),
    Sqlite(SqliteConnection),
    Xml(XmlConnection),
}

impl ConnectionConfig {
    /// The `kind` tag as written in config.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Mysql(_) => "mysql",
            Self::Oracle(_) => "oracle",
            Self::Sqlite(_) => "sqlite",
            Self::Xml(_) => "xml",
        }
    }

    /// The extraction query, for relational kinds.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Postgres(c) | Self::Mysql(c) => Some(&c.query),
            Self::Oracle(c) => Some(&c.query),
            Self::Sqlite(c) => Some(&c.query),
            Self::Xml(_) => None,
        }
    }
}

/// Network database parameters (PostgreSQL, MySQL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConnection {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    pub user: String,
    /// Name of the env var holding the password (never store the password itself).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    pub query: String,
}

impl ServerConnection {
    /// Read the password from the configured env var, if any.
    pub fn password(&self) -> Option<String> {
        read_password(self.password_env.as_deref())
    }
}

/// Oracle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConnection {
    /// Easy-connect string or TNS alias, e.g. `localhost/XE`.
    pub connect_string: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    pub query: String,
}

impl OracleConnection {
    pub fn password(&self) -> Option<String> {
        read_password(self.password_env.as_deref())
    }
}

/// Local SQLite / libSQL database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConnection {
    pub path: String,
    pub query: String,
}

/// Hierarchical XML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlConnection {
    pub path: String,
    /// Tag of the repeated child elements under the root.
    #[serde(default = "default_record_tag")]
    pub record_tag: String,
}

fn default_record_tag() -> String {
    "customer".into()
}

fn read_password(var_name: Option<&str>) -> Option<String> {
    let var_name = var_name?;
    match std::env::var(var_name) {
        Ok(val) => Some(val),
        Err(_) => {
            tracing::warn!(var = var_name, "password variable not set, connecting without one");
            None
        }
    }
}

fn default_sources() -> Vec<SourceDescriptor> {
    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| (*c).to_string()).collect()
    }

    vec![
        SourceDescriptor {
            name: "transactions".into(),
            transform: TransformProfile::Transactions,
            columns: columns(&["id", "customer_name", "amount", "transaction_date"]),
            summary_label: Some("total_transactions".into()),
            timeout_secs: None,
            connection: ConnectionConfig::Postgres(ServerConnection {
                host: "localhost".into(),
                port: Some(5432),
                database: "finance".into(),
                user: "postgres_user".into(),
                password_env: Some("DWH_POSTGRES_PASSWORD".into()),
                query: "SELECT id, customer_name, amount, transaction_date FROM transactions"
                    .into(),
            }),
        },
        SourceDescriptor {
            name: "orders".into(),
            transform: TransformProfile::Orders,
            columns: columns(&["order_id", "product_name", "quantity", "order_date"]),
            summary_label: Some("total_orders".into()),
            timeout_secs: None,
            connection: ConnectionConfig::Oracle(OracleConnection {
                connect_string: "localhost/XE".into(),
                user: "oracle_user".into(),
                password_env: Some("DWH_ORACLE_PASSWORD".into()),
                query: "SELECT order_id, product_name, quantity, order_date FROM orders".into(),
            }),
        },
        SourceDescriptor {
            name: "invoices".into(),
            transform: TransformProfile::Invoices,
            columns: columns(&["invoice_id", "region", "total_value", "invoice_date"]),
            summary_label: Some("total_invoices".into()),
            timeout_secs: None,
            connection: ConnectionConfig::Mysql(ServerConnection {
                host: "localhost".into(),
                port: Some(3306),
                database: "sales".into(),
                user: "mysql_user".into(),
                password_env: Some("DWH_MYSQL_PASSWORD".into()),
                query: "SELECT invoice_id, region, total_value, invoice_date FROM invoices"
                    .into(),
            }),
        },
        SourceDescriptor {
            name: "customers".into(),
            transform: TransformProfile::Customers,
            columns: columns(&["id", "name", "country", "signup_date"]),
            summary_label: Some("total_customers".into()),
            timeout_secs: None,
            connection: ConnectionConfig::Xml(XmlConnection {
                path: "customers.xml".into(),
                record_tag: default_record_tag(),
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.output.path.trim().is_empty() {
            return Err(DwhError::config("output.path must not be empty"));
        }
        if self.pipeline.timeout_secs == 0 {
            return Err(DwhError::config("pipeline.timeout_secs must be positive"));
        }
        if self.pipeline.max_concurrency == Some(0) {
            return Err(DwhError::config("pipeline.max_concurrency must be positive"));
        }
        if self.rules.tax_rate.is_sign_negative() {
            return Err(DwhError::config(format!(
                "rules.tax_rate must not be negative (got {})",
                self.rules.tax_rate
            )));
        }
        if self.sources.is_empty() {
            return Err(DwhError::config("at least one source must be configured"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(DwhError::config("source name must not be empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(DwhError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.columns.is_empty() {
                return Err(DwhError::config(format!(
                    "source '{}' declares no columns",
                    source.name
                )));
            }
            let mut columns = HashSet::new();
            if let Some(dup) = source.columns.iter().find(|c| !columns.insert(c.as_str())) {
                return Err(DwhError::config(format!(
                    "source '{}' declares column '{dup}' twice",
                    source.name
                )));
            }
            if let Some(query) = source.connection.query() {
                if query.trim().is_empty() {
                    return Err(DwhError::config(format!(
                        "source '{}' has an empty query",
                        source.name
                    )));
                }
            }
            if source.timeout_secs == Some(0) {
                return Err(DwhError::config(format!(
                    "source '{}' timeout_secs must be positive",
                    source.name
                )));
            }
        }

        let mut labels = HashSet::from([REVENUE_FIELD.to_string()]);
        for source in &self.sources {
            let label = source.summary_label();
            if !labels.insert(label.clone()) {
                return Err(DwhError::config(format!(
                    "summary label '{label}' of source '{}' is already in use",
                    source.name
                )));
            }
        }

        if !names.contains(self.revenue.source.as_str()) {
            return Err(DwhError::config(format!(
                "revenue source '{}' is not a configured source",
                self.revenue.source
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dwh-report/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DwhError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dwh-report/dwh-report.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DwhError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DwhError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path` (or the home config location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| DwhError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| DwhError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DwhError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
