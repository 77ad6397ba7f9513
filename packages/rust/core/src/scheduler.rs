//! Bounded worker pool over unprocessed rows.
//!
//! Eligible rows up to the run ceiling each get their own task; a semaphore
//! caps how many run at once. Workers never touch the table: they send a
//! [`RowResult`] back over a channel and the coordinator applies it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use seoenrich_shared::{Row, RunConfig};

use crate::processor::{ProcessOutcome, RowProcessor};
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// WorkBudget
// ---------------------------------------------------------------------------

/// Ceiling on rows claimed for processing in one run.
#[derive(Debug)]
pub struct WorkBudget {
    ceiling: usize,
    claimed: Mutex<usize>,
}

impl WorkBudget {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            claimed: Mutex::new(0),
        }
    }

    /// Claim one unit. Returns `false` once the ceiling is reached.
    pub fn try_claim(&self) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if *claimed >= self.ceiling {
            return false;
        }
        *claimed += 1;
        true
    }

    pub fn claimed(&self) -> usize {
        *self.claimed.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn remaining(&self) -> usize {
        self.ceiling.saturating_sub(self.claimed())
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Pool sizing and pacing.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Concurrent workers.
    pub workers: usize,
    /// Delay each worker waits after claiming, before any network call.
    pub rate_limit: Duration,
    /// [`WorkBudget`] ceiling.
    pub max_rows: usize,
}

impl From<&RunConfig> for SchedulerOptions {
    fn from(run: &RunConfig) -> Self {
        Self {
            workers: run.workers,
            rate_limit: Duration::from_millis(run.rate_limit_ms),
            max_rows: run.max_rows,
        }
    }
}

/// Counters for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Rows that won a budget claim.
    pub claimed: usize,
    /// Rows marked processed.
    pub completed: usize,
    /// Rows left untouched because the page could not be fetched.
    pub fetch_failed: usize,
    /// Rows skipped because the row ceiling was reached.
    pub skipped_budget: usize,
    /// Rows left untouched because the daily call limit was reached.
    pub skipped_call_limit: usize,
    /// Completed rows holding at least one sentinel field.
    pub generation_failures: usize,
    /// Worker tasks that panicked; their rows stay unprocessed.
    pub worker_failures: usize,
}

/// Message from a worker to the coordinator.
#[derive(Debug)]
struct RowResult {
    index: usize,
    outcome: WorkerOutcome,
}

#[derive(Debug)]
enum WorkerOutcome {
    Processed(ProcessOutcome),
    BudgetExhausted,
    CallLimitReached,
}

/// Dispatches unprocessed rows to a bounded pool of workers.
pub struct Scheduler {
    processor: Arc<RowProcessor>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(processor: Arc<RowProcessor>, options: SchedulerOptions) -> Self {
        Self { processor, options }
    }

    /// Process every row with `processed == false`, returning the updated
    /// table and run counters. Processed rows are never dispatched.
    #[instrument(skip_all, fields(rows = rows.len(), workers = self.options.workers))]
    pub async fn run(
        &self,
        mut rows: Vec<Row>,
        progress: &dyn ProgressReporter,
    ) -> (Vec<Row>, RunStats) {
        let eligible: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.processed)
            .map(|(index, _)| index)
            .collect();
        let (dispatch, overflow) = eligible.split_at(eligible.len().min(self.options.max_rows));
        let total = dispatch.len();

        info!(
            eligible = eligible.len(),
            max_rows = self.options.max_rows,
            rate_limit_ms = self.options.rate_limit.as_millis() as u64,
            "starting run"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let budget = Arc::new(WorkBudget::new(self.options.max_rows));
        let (tx, mut rx) = mpsc::channel::<RowResult>(self.options.workers.max(1) * 2);
        let mut workers = JoinSet::new();

        for &index in dispatch {
            let row = rows[index].clone();
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let budget = budget.clone();
            let processor = self.processor.clone();
            let rate_limit = self.options.rate_limit;

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let outcome = if processor.generator().calls_remaining() == 0 {
                    WorkerOutcome::CallLimitReached
                } else if budget.try_claim() {
                    if !rate_limit.is_zero() {
                        tokio::time::sleep(rate_limit).await;
                    }
                    WorkerOutcome::Processed(processor.process(&row).await)
                } else {
                    WorkerOutcome::BudgetExhausted
                };

                // Receiver only goes away if the coordinator is gone.
                let _ = tx.send(RowResult { index, outcome }).await;
            });
        }
        drop(tx);

        let mut stats = RunStats {
            skipped_budget: overflow.len(),
            ..RunStats::default()
        };
        let mut handled = 0;

        while let Some(RowResult { index, outcome }) = rx.recv().await {
            handled += 1;
            let row = &mut rows[index];

            match outcome {
                WorkerOutcome::Processed(ProcessOutcome::Completed(fields)) => {
                    stats.claimed += 1;
                    stats.completed += 1;
                    if fields.has_sentinel() {
                        stats.generation_failures += 1;
                    }
                    row.apply(fields);
                    row.processed = true;
                    debug!(url = %row.url, "row completed");
                }
                WorkerOutcome::Processed(ProcessOutcome::FetchFailed(reason)) => {
                    stats.claimed += 1;
                    stats.fetch_failed += 1;
                    warn!(url = %row.url, %reason, "row left unprocessed");
                }
                WorkerOutcome::Processed(ProcessOutcome::CallLimitReached)
                | WorkerOutcome::CallLimitReached => {
                    stats.skipped_call_limit += 1;
                }
                WorkerOutcome::BudgetExhausted => {
                    stats.skipped_budget += 1;
                }
            }

            progress.row_done(handled, total, &row.url);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker task failed, row left unprocessed");
                stats.worker_failures += 1;
            }
        }

        if stats.skipped_budget > 0 {
            info!(
                skipped = stats.skipped_budget,
                "row ceiling reached, remaining rows left for a later run"
            );
        }
        if stats.skipped_call_limit > 0 {
            info!(
                skipped = stats.skipped_call_limit,
                "daily call limit reached, remaining rows left for a later run"
            );
        }
        info!(
            claimed = stats.claimed,
            completed = stats.completed,
            fetch_failed = stats.fetch_failed,
            generation_failures = stats.generation_failures,
            worker_failures = stats.worker_failures,
            "run completed"
        );

        (rows, stats)
    }
}
