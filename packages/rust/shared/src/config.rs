//! Application configuration for seoenrich.
//!
//! User config lives at `~/.seoenrich/seoenrich.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeoEnrichError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "seoenrich.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".seoenrich";

// ---------------------------------------------------------------------------
// Config structs (matching seoenrich.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduling and pacing.
    #[serde(default)]
    pub run: RunConfig,

    /// Table locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Site identity used in prompts and tag-index text.
    #[serde(default)]
    pub site: SiteConfig,

    /// Generative-text service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of concurrent row workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum rows claimed for first-pass processing per run.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Pause before each claimed row, in milliseconds.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Maximum generative calls per UTC day.
    #[serde(default = "default_daily_call_limit")]
    pub daily_call_limit: u64,

    /// Timeout applied to every outbound HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_rows: default_max_rows(),
            rate_limit_ms: default_rate_limit(),
            daily_call_limit: default_daily_call_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_workers() -> usize {
    3
}
fn default_max_rows() -> usize {
    1000
}
fn default_rate_limit() -> u64 {
    500
}
fn default_daily_call_limit() -> u64 {
    8000
}
fn default_request_timeout() -> u64 {
    30
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Input page table, rewritten in place by `enrich`.
    #[serde(default = "default_input_db")]
    pub input_db: String,

    /// Output of the repair pass.
    #[serde(default = "default_qc_output_db")]
    pub qc_output_db: String,

    /// Output of the finalize pass.
    #[serde(default = "default_clean_output_db")]
    pub clean_output_db: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_db: default_input_db(),
            qc_output_db: default_qc_output_db(),
            clean_output_db: default_clean_output_db(),
        }
    }
}

fn default_input_db() -> String {
    "data/pages.db".into()
}
fn default_qc_output_db() -> String {
    "data/pages-qc.db".into()
}
fn default_clean_output_db() -> String {
    "data/pages-clean.db".into()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Publication name.
    #[serde(default = "default_site_name")]
    pub name: String,

    /// Editorial themes woven into prompts.
    #[serde(default = "default_themes")]
    pub themes: Vec<String>,

    /// Region the publication covers.
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            themes: default_themes(),
            region: default_region(),
        }
    }
}

fn default_site_name() -> String {
    "RVA Magazine".into()
}
fn default_themes() -> Vec<String> {
    ["art", "music", "culture", "food", "nightlife", "politics"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_region() -> String {
    "Richmond, Virginia".into()
}

/// `[generator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the secondary service key.
    #[serde(default = "default_secondary_key_env")]
    pub secondary_key_env: String,

    /// Model for first-pass generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model for the repair pass.
    #[serde(default = "default_revision_model")]
    pub revision_model: String,

    /// Output token budget for meta descriptions.
    #[serde(default = "default_description_max_tokens")]
    pub description_max_tokens: u32,

    /// Output token budget for SEO titles.
    #[serde(default = "default_title_max_tokens")]
    pub title_max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            secondary_key_env: default_secondary_key_env(),
            model: default_model(),
            revision_model: default_revision_model(),
            description_max_tokens: default_description_max_tokens(),
            title_max_tokens: default_title_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_secondary_key_env() -> String {
    "WP_API_KEY".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_revision_model() -> String {
    "gpt-4".into()
}
fn default_description_max_tokens() -> u32 {
    150
}
fn default_title_max_tokens() -> u32 {
    50
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.seoenrich/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SeoEnrichError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.seoenrich/seoenrich.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SeoEnrichError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SeoEnrichError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the scheduler cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.run.workers == 0 {
        return Err(SeoEnrichError::config("run.workers must be at least 1"));
    }
    if config.run.request_timeout_secs == 0 {
        return Err(SeoEnrichError::config(
            "run.request_timeout_secs must be at least 1",
        ));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SeoEnrichError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SeoEnrichError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SeoEnrichError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the generative-text API key from its configured env var.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.generator.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SeoEnrichError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Whether the secondary service key is present. It is optional.
pub fn secondary_key_present(config: &AppConfig) -> bool {
    std::env::var(&config.generator.secondary_key_env)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("input_db"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("WP_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.run.workers, 3);
        assert_eq!(parsed.run.max_rows, 1000);
        assert_eq!(parsed.run.rate_limit_ms, 500);
        assert_eq!(parsed.run.daily_call_limit, 8000);
        assert_eq!(parsed.generator.description_max_tokens, 150);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[run]
workers = 5

[site]
name = "Example Weekly"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.run.workers, 5);
        assert_eq!(config.run.max_rows, 1000);
        assert_eq!(config.site.name, "Example Weekly");
        assert_eq!(config.site.themes.len(), 6);
        assert_eq!(config.generator.revision_model, "gpt-4");
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.run.workers = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn load_from_file() {
        let name = format!("seoenrich-cfg-{}.toml", uuid::Uuid::now_v7());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, "[run]\nmax_rows = 10\n").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.run.max_rows, 10);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.generator.api_key_env = "SEOENRICH_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn missing_secondary_key_is_not_an_error() {
        let mut config = AppConfig::default();
        config.generator.secondary_key_env = "SEOENRICH_TEST_NONEXISTENT_SECONDARY".into();
        assert!(!secondary_key_present(&config));
    }
}
