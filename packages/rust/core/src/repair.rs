//! Quality check and single-pass regeneration of processed rows.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use seoenrich_shared::Row;

use crate::generator::Field;
use crate::processor::{ProcessOutcome, RowProcessor, tag_index_name};
use crate::progress::ProgressReporter;
use crate::quality::{self, Violation};

/// Counters for one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Processed, non-tag rows examined.
    pub checked: usize,
    /// Rows with no violations in either field.
    pub clean: usize,
    /// Rows regenerated with the revision prompts.
    pub repaired: usize,
    /// Rows whose re-fetch failed; left unchanged.
    pub failed: usize,
    /// Failing rows left unchanged because the daily call limit was reached.
    pub deferred: usize,
    /// Tag-index rows, never checked.
    pub exempt: usize,
    /// URLs of the failed rows.
    pub failed_urls: Vec<String>,
}

/// Violations found in one field of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssues {
    pub field: Field,
    pub violations: Vec<Violation>,
}

/// Check both generated fields of `row`; only failing fields are returned.
pub fn inspect(row: &Row) -> Vec<FieldIssues> {
    [
        (Field::MetaDescription, row.meta_description.as_str()),
        (Field::SeoTitle, row.seo_title.as_str()),
    ]
    .into_iter()
    .filter_map(|(field, text)| {
        let violations = quality::check(text);
        (!violations.is_empty()).then_some(FieldIssues { field, violations })
    })
    .collect()
}

/// Sequential repair over processed rows.
pub struct RepairLoop {
    processor: Arc<RowProcessor>,
    rate_limit: Duration,
}

impl RepairLoop {
    pub fn new(processor: Arc<RowProcessor>, rate_limit: Duration) -> Self {
        Self {
            processor,
            rate_limit,
        }
    }

    /// One pass: every failing row is regenerated at most once, and the
    /// revision is accepted without re-checking.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub async fn repair_pass(
        &self,
        mut rows: Vec<Row>,
        progress: &dyn ProgressReporter,
    ) -> (Vec<Row>, RepairStats) {
        let mut stats = RepairStats::default();
        let total = rows.len();

        for (index, row) in rows.iter_mut().enumerate() {
            if !row.processed {
                progress.row_done(index + 1, total, &row.url);
                continue;
            }
            if tag_index_name(&row.url).is_some() {
                stats.exempt += 1;
                progress.row_done(index + 1, total, &row.url);
                continue;
            }

            stats.checked += 1;
            let issues = inspect(row);
            if issues.is_empty() {
                stats.clean += 1;
                progress.row_done(index + 1, total, &row.url);
                continue;
            }

            for issue in &issues {
                warn!(
                    row = index,
                    field = issue.field.as_str(),
                    url = %row.url,
                    issues = %quality::describe(&issue.violations),
                    "quality check failed"
                );
            }

            if !self.rate_limit.is_zero() {
                tokio::time::sleep(self.rate_limit).await;
            }

            match self.processor.repair(row).await {
                ProcessOutcome::Completed(fields) => {
                    row.apply(fields);
                    stats.repaired += 1;
                }
                ProcessOutcome::FetchFailed(reason) => {
                    warn!(url = %row.url, %reason, "repair skipped, row unchanged");
                    stats.failed += 1;
                    stats.failed_urls.push(row.url.clone());
                }
                ProcessOutcome::CallLimitReached => {
                    warn!(url = %row.url, "daily call limit reached, row unchanged");
                    stats.deferred += 1;
                }
            }
            progress.row_done(index + 1, total, &row.url);
        }

        info!(
            checked = stats.checked,
            clean = stats.clean,
            repaired = stats.repaired,
            failed = stats.failed,
            deferred = stats.deferred,
            exempt = stats.exempt,
            "repair pass completed"
        );

        (rows, stats)
    }
}
