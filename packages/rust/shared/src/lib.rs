//! Shared types, error model, and configuration for seoenrich.
//!
//! This crate is the foundation depended on by all other seoenrich crates.
//! It provides:
//! - [`SeoEnrichError`]: the unified error type
//! - Domain types ([`Row`], [`RowFields`], [`QcRow`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeneratorConfig, PathsConfig, RunConfig, SiteConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, secondary_key_present, validate_api_key,
    validate_config,
};
pub use error::{Result, SeoEnrichError};
pub use types::{GENERATION_SENTINEL, QcRow, Row, RowFields};
