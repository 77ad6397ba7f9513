//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use seoenrich_core::{Collaborators, ExportTable, ProgressReporter, RepairSource};
use seoenrich_shared::{
    AppConfig, init_config, load_config, load_config_from, secondary_key_present,
    validate_api_key, validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// seoenrich: generate and repair SEO titles and meta descriptions.
#[derive(Parser)]
#[command(
    name = "seoenrich",
    version,
    about = "Fill in and quality-check SEO titles and meta descriptions for a page table.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.seoenrich/seoenrich.toml.
    #[arg(long, global = true, env = "SEOENRICH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Table selector for `export`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum TableArg {
    Pages,
    Qc,
    Clean,
}

impl From<TableArg> for ExportTable {
    fn from(table: TableArg) -> Self {
        match table {
            TableArg::Pages => ExportTable::Pages,
            TableArg::Qc => ExportTable::Qc,
            TableArg::Clean => ExportTable::Clean,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate titles and descriptions for every unprocessed row.
    Enrich {
        /// Concurrent workers (overrides run.workers).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Maximum rows to claim this run (overrides run.max_rows).
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Quality-check processed rows, regenerate failures, write the QC table.
    Repair {
        /// Read rows from the QC table of an earlier pass instead of the input table.
        #[arg(long)]
        from_qc: bool,
    },

    /// Strip wrapping quotes from the QC table into the clean table.
    Finalize,

    /// Load rows from a JSON Lines file into the input table.
    Import {
        /// JSON Lines file, one row object per line.
        path: PathBuf,

        /// Replace the table instead of appending.
        #[arg(long)]
        replace: bool,
    },

    /// Write a table to a JSON Lines file.
    Export {
        /// Output file.
        out: PathBuf,

        /// Which table to export.
        #[arg(long, value_enum, default_value = "pages")]
        table: TableArg,
    },

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
    Init,
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
        0 => "seoenrich=info",
        1 => "seoenrich=debug",
        _ => "seoenrich=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Enrich { workers, max_rows } => cmd_enrich(config_path, workers, max_rows).await,
        Command::Repair { from_qc } => {
            let source = if from_qc {
                RepairSource::Qc
            } else {
                RepairSource::Input
            };
            cmd_repair(config_path, source).await
        }
        Command::Finalize => cmd_finalize(config_path).await,
        Command::Import { path, replace } => cmd_import(config_path, &path, replace).await,
        Command::Export { out, table } => cmd_export(config_path, &out, table.into()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Fail early when the API key is missing, before any table is touched.
fn collaborators(config: &AppConfig) -> Result<Collaborators> {
    let api_key = validate_api_key(config)?;
    Ok(Collaborators::from_config(config, api_key)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    config_path: Option<&Path>,
    workers: Option<usize>,
    max_rows: Option<usize>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(workers) = workers {
        config.run.workers = workers;
    }
    if let Some(max_rows) = max_rows {
        config.run.max_rows = max_rows;
    }
    validate_config(&config)?;
    let collaborators = collaborators(&config)?;

    info!(
        input = %config.paths.input_db,
        workers = config.run.workers,
        max_rows = config.run.max_rows,
        "enriching rows"
    );

    let reporter = CliProgress::new()?;
    let result = seoenrich_core::run_enrich(&config, &collaborators, &reporter).await?;
    let stats = &result.stats;

    println!();
    println!("  Enrichment finished.");
    println!("  Rows:         {}", result.total_rows);
    println!("  Completed:    {}", stats.completed);
    println!("  Fetch failed: {}", stats.fetch_failed);
    println!("  Over limit:   {}", stats.skipped_budget);
    println!("  Out of calls: {}", stats.skipped_call_limit);
    println!("  Gen failures: {}", stats.generation_failures);
    if stats.worker_failures > 0 {
        println!("  Crashed:      {}", stats.worker_failures);
    }
    println!("  API calls:    {}", result.calls);
    println!("  Time:         {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_repair(config_path: Option<&Path>, source: RepairSource) -> Result<()> {
    let config = resolve_config(config_path)?;
    let collaborators = collaborators(&config)?;

    info!(
        input = %config.paths.input_db,
        output = %config.paths.qc_output_db,
        ?source,
        "repairing rows"
    );

    let reporter = CliProgress::new()?;
    let result = seoenrich_core::run_repair(&config, &collaborators, source, &reporter).await?;
    let stats = &result.stats;

    println!();
    println!("  Repair pass finished.");
    println!("  Checked:   {}", stats.checked);
    println!("  Clean:     {}", stats.clean);
    println!("  Repaired:  {}", stats.repaired);
    println!("  Failed:    {}", stats.failed);
    println!("  Deferred:  {}", stats.deferred);
    println!("  Tag pages: {}", stats.exempt);
    println!("  API calls: {}", result.calls);
    println!("  Output:    {}", result.output.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    for url in &stats.failed_urls {
        println!("    could not re-fetch {url}");
    }
    println!();

    Ok(())
}

async fn cmd_finalize(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;

    let reporter = CliProgress::new()?;
    let result = seoenrich_core::run_finalize(&config, &reporter).await?;

    println!();
    println!("  Rows:    {}", result.rows);
    println!("  Changed: {}", result.changed);
    println!("  Output:  {}", result.output.display());
    println!();

    Ok(())
}

async fn cmd_import(config_path: Option<&Path>, path: &Path, replace: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    if !path.exists() {
        return Err(eyre!("no such file: {}", path.display()));
    }

    let result = seoenrich_core::import_rows(&config, path, replace).await?;
    println!(
        "Imported {} rows ({} duplicate URLs skipped), {} in table.",
        result.imported, result.duplicates, result.total
    );
    Ok(())
}

async fn cmd_export(config_path: Option<&Path>, out: &Path, table: ExportTable) -> Result<()> {
    let config = resolve_config(config_path)?;
    let count = seoenrich_core::export_rows(&config, table, out).await?;
    println!("Wrote {count} rows to {}", out.display());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    let set = |present: bool| if present { "set" } else { "not set" };
    println!(
        "# {}: {}",
        config.generator.api_key_env,
        set(validate_api_key(&config).is_ok())
    );
    println!(
        "# {}: {}",
        config.generator.secondary_key_env,
        set(secondary_key_present(&config))
    );
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
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_done(&self, current: usize, total: usize, url: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {url}"));
    }

    fn done(&self, summary: &str) {
        self.spinner.finish_with_message(summary.to_string());
    }
}
