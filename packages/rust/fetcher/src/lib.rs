//! Page fetch-and-extract primitive.
//!
//! This crate provides:
//! - [`PageFetcher`]: the trait the pipeline depends on
//! - [`HttpFetcher`]: a `reqwest` implementation sending a browser user agent
//! - [`extract`]: `<title>` and visible `<body>` text extraction
//!
//! There is no retry here. A failed fetch is retried by a later run.

pub mod extract;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use seoenrich_shared::{Result, SeoEnrichError};

/// Browser User-Agent; some sites reject non-browser agents outright.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// PageContent
// ---------------------------------------------------------------------------

/// Title and body text extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub body_text: String,
}

impl PageContent {
    /// Nothing usable was extracted.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.body_text.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Fetches a page and extracts its title and body text.
///
/// Implementations return `Err` on non-2xx responses and when neither a
/// title nor any body text could be extracted.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageContent>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Options for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Timeout for each request in seconds.
    pub timeout_secs: u64,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build the HTTP client.
    pub fn new(opts: &FetcherOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(opts.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SeoEnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<PageContent> {
        let parsed = Url::parse(url)
            .map_err(|e| SeoEnrichError::validation(format!("invalid URL '{url}': {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SeoEnrichError::validation(format!(
                "unsupported scheme '{}' in {url}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| SeoEnrichError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SeoEnrichError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SeoEnrichError::Network(format!("{url}: body read failed: {e}")))?;

        let content = parse_page(&body);
        if content.is_empty() {
            return Err(SeoEnrichError::parse(format!(
                "{url}: no title or body text found"
            )));
        }

        debug!(
            title = %content.title,
            body_chars = content.body_text.chars().count(),
            "page fetched"
        );
        Ok(content)
    }
}

/// Parse raw HTML into [`PageContent`].
pub fn parse_page(html: &str) -> PageContent {
    let doc = Html::parse_document(html);
    PageContent {
        title: extract::extract_title(&doc),
        body_text: extract::extract_body_text(&doc),
    }
}
