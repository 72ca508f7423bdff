//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use dwh_core::{Pipeline, ProgressReporter, RunReport, SilentProgress, SourceStatus};
use dwh_shared::{AppConfig, config_file_path, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// dwh-report: one report from many warehouses.
#[derive(Parser)]
#[command(
    name = "dwh-report",
    version,
    about = "Extract tables from several data sources, apply business rules, and write one multi-sheet Excel report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.dwh-report/dwh-report.toml).
    #[arg(long, global = true, env = "DWH_REPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract every source and write the report.
    Run {
        /// Report path (overrides output.path from the config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Extract sources one at a time.
        #[arg(long)]
        sequential: bool,

        /// Also write the run report as JSON to this path.
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Hide the progress spinner.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check the configuration without connecting to anything.
    Validate,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dwh=info",
        1 => "dwh=debug",
        _ => "dwh=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run {
            out,
            sequential,
            report_json,
            quiet,
        } => {
            cmd_run(
                config_path.as_deref(),
                out.as_deref(),
                sequential,
                report_json.as_deref(),
                quiet,
            )
            .await
        }
        Command::Validate => cmd_validate(config_path.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(config_path.as_deref(), force),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// Load from `--config` when given, else the home config (or defaults).
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    out: Option<&Path>,
    sequential: bool,
    report_json: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if sequential {
        config.pipeline.parallel = false;
    }
    let destination = match out {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(&config.output.path),
    };

    let pipeline = Pipeline::new(config)?;
    info!(destination = %destination.display(), "starting report run");

    let report = if quiet {
        pipeline.run(&destination, &SilentProgress).await
    } else {
        let reporter = CliProgress::new();
        pipeline.run(&destination, &reporter).await
    };

    print_report(&report);

    if let Some(path) = report_json {
        std::fs::write(path, report.to_json()?)
            .wrap_err_with(|| format!("writing run report to {}", path.display()))?;
        info!(path = %path.display(), "run report written");
    }

    match &report.error {
        Some(fatal) => Err(eyre!(
            "run failed at {} stage: {}",
            fatal.stage,
            fatal.message
        )),
        None => Ok(()),
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!(
        "  Run {}  {}  ({:.1}s)",
        report.run_id,
        report.state,
        report.elapsed_ms as f64 / 1000.0
    );
    println!();
    println!(
        "  {:<20} {:<9} {:>8} {:>8}  STATUS",
        "SOURCE", "KIND", "ROWS", "SKIPPED"
    );
    for source in &report.sources {
        println!(
            "  {:<20} {:<9} {:>8} {:>8}  {}",
            source.name, source.kind, source.rows, source.skipped_records, source.status
        );
    }

    if !report.summary.is_empty() {
        println!();
        println!("  Summary:");
        for entry in &report.summary {
            println!("    {:<24} {}", entry.field, entry.value);
        }
    }

    if let Some(artifact) = &report.artifact {
        println!();
        println!("  Report: {}", artifact.path.display());
        println!("  SHA256: {}", artifact.sha256);
        println!("  Size:   {} bytes", artifact.size_bytes);
    }
    println!();
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    config.validate()?;

    println!("Configuration OK: {} source(s)", config.sources.len());
    for source in &config.sources {
        println!(
            "  {:<20} {:<9} {:<13} -> {}",
            source.name,
            source.connection.kind_name(),
            source.transform.to_string(),
            source.summary_label()
        );
    }
    println!(
        "  revenue: {}.{}  output: {}",
        config.revenue.source, config.revenue.column, config.output.path
    );
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = match config_path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if target.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            target.display()
        ));
    }
    let path = init_config(Some(&target))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_extracted(&self, name: &str, status: &SourceStatus, completed: usize, total: usize) {
        self.spinner
            .set_message(format!("Extracted [{completed}/{total}] {name}: {status}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
