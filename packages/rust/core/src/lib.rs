//! Enrichment, quality-check, and repair pipeline for page SEO metadata.
//!
//! This crate ties the page fetcher and completion client together into
//! per-row processing, schedules it over a bounded worker pool, and runs the
//! `enrich`, `repair`, and `finalize` stages against the page tables.

pub mod finalize;
pub mod generator;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod quality;
pub mod repair;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use pipeline::{
    Collaborators, EnrichResult, ExportTable, FinalizeResult, ImportResult, RepairResult,
    RepairSource, export_rows, import_rows, run_enrich, run_finalize, run_repair,
};
pub use progress::{ProgressReporter, SilentProgress};
