//! End-to-end stages: `enrich`, `repair`, `finalize`, plus row import/export.
//!
//! Each stage loads a whole table, works on it in memory, and writes it back
//! with one atomic rewrite. Generative calls are counted against a per-day
//! ceiling persisted in the input database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};
use uuid::Uuid;

use seoenrich_fetcher::{FetcherOptions, HttpFetcher, PageFetcher};
use seoenrich_llm::{CompletionClient, OpenAiClient, OpenAiOptions};
use seoenrich_shared::{AppConfig, QcRow, Result, Row, SeoEnrichError};
use seoenrich_storage::{Storage, read_jsonl, write_jsonl};

use crate::finalize::finalize_rows;
use crate::generator::{ContentGenerator, GeneratorSettings};
use crate::processor::RowProcessor;
use crate::progress::ProgressReporter;
use crate::repair::{RepairLoop, RepairStats};
use crate::scheduler::{RunStats, Scheduler, SchedulerOptions};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External services a stage depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub completions: Arc<dyn CompletionClient>,
}

impl Collaborators {
    /// HTTP fetcher and OpenAI-compatible client built from `config`.
    pub fn from_config(config: &AppConfig, api_key: String) -> Result<Self> {
        let fetcher = HttpFetcher::new(&FetcherOptions {
            timeout_secs: config.run.request_timeout_secs,
            ..FetcherOptions::default()
        })?;
        let completions = OpenAiClient::new(OpenAiOptions {
            base_url: config.generator.base_url.clone(),
            api_key,
            timeout_secs: config.run.request_timeout_secs,
        })?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            completions: Arc::new(completions),
        })
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of the `enrich` stage.
#[derive(Debug)]
pub struct EnrichResult {
    pub total_rows: usize,
    pub stats: RunStats,
    /// Generative calls made by this run.
    pub calls: u64,
    pub elapsed: Duration,
}

/// Result of the `repair` stage.
#[derive(Debug)]
pub struct RepairResult {
    pub stats: RepairStats,
    pub calls: u64,
    /// Where the QC table was written.
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Result of the `finalize` stage.
#[derive(Debug)]
pub struct FinalizeResult {
    pub rows: usize,
    /// Rows with at least one field unquoted.
    pub changed: usize,
    pub output: PathBuf,
}

/// Result of a JSON Lines import.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported: usize,
    /// Records dropped because their URL was already present.
    pub duplicates: usize,
    /// Row count after the import.
    pub total: usize,
}

/// Table the `repair` stage reads its rows from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairSource {
    /// Processed rows of the input `pages` table.
    #[default]
    Input,
    /// The QC table written by an earlier repair pass, for chained passes.
    Qc,
}

/// Table selected for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTable {
    /// The input `pages` table with the `processed` flag.
    Pages,
    /// Output of `repair`.
    Qc,
    /// Output of `finalize`.
    Clean,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Run the scheduler over the input table and persist the result.
#[instrument(skip_all, fields(input = %config.paths.input_db))]
pub async fn run_enrich(
    config: &AppConfig,
    collaborators: &Collaborators,
    progress: &dyn ProgressReporter,
) -> Result<EnrichResult> {
    let start = Instant::now();

    progress.phase("Loading rows");
    let storage = Storage::open(Path::new(&config.paths.input_db)).await?;
    let rows = storage.load_rows().await?;
    let total_rows = rows.len();

    let day = today();
    let call_limit = remaining_calls(&storage, config, &day).await?;
    let processor = build_processor(config, collaborators, call_limit);

    progress.phase("Enriching rows");
    let scheduler = Scheduler::new(processor.clone(), SchedulerOptions::from(&config.run));
    let (rows, stats) = scheduler.run(rows, progress).await;

    progress.phase("Saving rows");
    storage.replace_rows(&rows).await?;
    let calls = processor.generator().calls_made();
    storage.record_calls(&day, calls).await?;

    let result = EnrichResult {
        total_rows,
        stats,
        calls,
        elapsed: start.elapsed(),
    };
    progress.done(&format!(
        "{} of {} rows enriched",
        result.stats.completed, result.total_rows
    ));
    info!(
        completed = result.stats.completed,
        calls = result.calls,
        elapsed_ms = result.elapsed.as_millis(),
        "enrich complete"
    );
    Ok(result)
}

/// Check processed rows, regenerate failing ones, and write the QC table.
///
/// Rows come from `source`. The input `pages` table is never rewritten; with
/// [`RepairSource::Qc`] the QC table is read and then replaced in place.
#[instrument(
    skip_all,
    fields(
        input = %config.paths.input_db,
        output = %config.paths.qc_output_db,
        source = ?source
    )
)]
pub async fn run_repair(
    config: &AppConfig,
    collaborators: &Collaborators,
    source: RepairSource,
    progress: &dyn ProgressReporter,
) -> Result<RepairResult> {
    let start = Instant::now();
    let output = PathBuf::from(&config.paths.qc_output_db);
    if output == Path::new(&config.paths.input_db) {
        return Err(SeoEnrichError::config(
            "qc_output_db must differ from input_db",
        ));
    }

    progress.phase("Loading rows");
    let storage = Storage::open(Path::new(&config.paths.input_db)).await?;
    let rows = match source {
        RepairSource::Input => storage.load_rows().await?,
        RepairSource::Qc => {
            let qc_storage = Storage::open_readonly(&output).await?;
            let qc_rows = qc_storage.load_qc_rows().await?;
            qc_rows.into_iter().map(Row::from).collect()
        }
    };

    let day = today();
    let call_limit = remaining_calls(&storage, config, &day).await?;
    let processor = build_processor(config, collaborators, call_limit);

    progress.phase("Checking quality");
    let repair = RepairLoop::new(
        processor.clone(),
        Duration::from_millis(config.run.rate_limit_ms),
    );
    let (rows, stats) = repair.repair_pass(rows, progress).await;

    progress.phase("Saving QC table");
    let qc_rows: Vec<QcRow> = rows.iter().map(Row::to_qc_row).collect();
    let qc_storage = Storage::open(&output).await?;
    qc_storage.replace_qc_rows(&qc_rows).await?;

    let calls = processor.generator().calls_made();
    storage.record_calls(&day, calls).await?;

    let result = RepairResult {
        stats,
        calls,
        output,
        elapsed: start.elapsed(),
    };
    progress.done(&format!(
        "{} repaired, {} clean, {} failed",
        result.stats.repaired, result.stats.clean, result.stats.failed
    ));
    info!(
        repaired = result.stats.repaired,
        failed = result.stats.failed,
        deferred = result.stats.deferred,
        calls = result.calls,
        elapsed_ms = result.elapsed.as_millis(),
        "repair complete"
    );
    Ok(result)
}

/// Strip wrapping quotes from the QC table and write the clean table.
#[instrument(
    skip_all,
    fields(input = %config.paths.qc_output_db, output = %config.paths.clean_output_db)
)]
pub async fn run_finalize(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<FinalizeResult> {
    progress.phase("Loading QC table");
    let qc_storage = Storage::open_readonly(Path::new(&config.paths.qc_output_db)).await?;
    let rows = qc_storage.load_qc_rows().await?;

    progress.phase("Stripping quotes");
    let (rows, changed) = finalize_rows(rows);

    let output = PathBuf::from(&config.paths.clean_output_db);
    let clean_storage = Storage::open(&output).await?;
    clean_storage.replace_qc_rows(&rows).await?;

    let result = FinalizeResult {
        rows: rows.len(),
        changed,
        output,
    };
    progress.done(&format!("{} of {} rows unquoted", changed, result.rows));
    info!(rows = result.rows, changed, "finalize complete");
    Ok(result)
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

/// Load rows from a JSON Lines file into the input table.
///
/// With `replace` the table is overwritten; otherwise records are appended
/// and URLs already present are skipped. Missing ids get a fresh UUID v7.
#[instrument(skip(config))]
pub async fn import_rows(config: &AppConfig, path: &Path, replace: bool) -> Result<ImportResult> {
    let records: Vec<Row> = read_jsonl(path)?;
    let storage = Storage::open(Path::new(&config.paths.input_db)).await?;

    let mut rows = if replace {
        Vec::new()
    } else {
        storage.load_rows().await?
    };
    let mut seen: std::collections::HashSet<String> =
        rows.iter().map(|r| r.url.clone()).collect();

    let mut result = ImportResult::default();
    for mut record in records {
        if record.url.trim().is_empty() {
            return Err(SeoEnrichError::validation(format!(
                "{}: record without url",
                path.display()
            )));
        }
        if !seen.insert(record.url.clone()) {
            result.duplicates += 1;
            continue;
        }
        if record.id.is_empty() {
            record.id = Uuid::now_v7().to_string();
        }
        rows.push(record);
        result.imported += 1;
    }

    storage.replace_rows(&rows).await?;
    result.total = rows.len();
    info!(
        imported = result.imported,
        duplicates = result.duplicates,
        total = result.total,
        "import complete"
    );
    Ok(result)
}

/// Write one table to a JSON Lines file. Returns the row count.
#[instrument(skip(config))]
pub async fn export_rows(config: &AppConfig, table: ExportTable, out: &Path) -> Result<usize> {
    let count = match table {
        ExportTable::Pages => {
            let storage = Storage::open_readonly(Path::new(&config.paths.input_db)).await?;
            let rows = storage.load_rows().await?;
            write_jsonl(out, &rows)?;
            rows.len()
        }
        ExportTable::Qc | ExportTable::Clean => {
            let db = match table {
                ExportTable::Qc => &config.paths.qc_output_db,
                _ => &config.paths.clean_output_db,
            };
            let storage = Storage::open_readonly(Path::new(db)).await?;
            let rows = storage.load_qc_rows().await?;
            write_jsonl(out, &rows)?;
            rows.len()
        }
    };

    info!(rows = count, out = %out.display(), "export complete");
    Ok(count)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_processor(
    config: &AppConfig,
    collaborators: &Collaborators,
    call_limit: u64,
) -> Arc<RowProcessor> {
    let generator = ContentGenerator::new(
        collaborators.completions.clone(),
        GeneratorSettings::from(config),
        call_limit,
    );
    Arc::new(RowProcessor::new(
        collaborators.fetcher.clone(),
        Arc::new(generator),
    ))
}

/// Current UTC day, the key of the usage counter.
fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

async fn remaining_calls(storage: &Storage, config: &AppConfig, day: &str) -> Result<u64> {
    let used = storage.calls_on(day).await?;
    let remaining = config.run.daily_call_limit.saturating_sub(used);
    info!(
        day,
        used,
        limit = config.run.daily_call_limit,
        remaining,
        "daily call budget"
    );
    Ok(remaining)
}
