//! Per-row enrichment: fetch the page, then generate both fields.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use seoenrich_fetcher::{PageContent, PageFetcher};
use seoenrich_shared::{Row, RowFields};

use crate::generator::{
    ContentGenerator, DESCRIPTION_EXCERPT_CHARS, PromptVariant, TITLE_EXCERPT_CHARS, excerpt,
};

/// Path segment marking a tag listing page.
const TAG_SEGMENT: &str = "/tags/";

/// Completion calls for a fetched page: description and title.
const PAGE_CALLS: u64 = 2;

/// Completion calls for a tag listing page: title only.
const TAG_CALLS: u64 = 1;

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// All three fields were produced (generated ones may hold the sentinel).
    Completed(RowFields),
    /// The page yielded nothing usable; the row must not be updated.
    FetchFailed(String),
    /// The daily call budget cannot cover this row. Nothing was fetched or
    /// generated and the row must not be updated.
    CallLimitReached,
}

/// Tag name of a tag-index URL (`.../tags/music` → `music`), if it is one.
pub fn tag_index_name(url: &str) -> Option<String> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    let start = path.rfind(TAG_SEGMENT)? + TAG_SEGMENT.len();
    let tag = path[start..].trim_end_matches('/');
    (!tag.is_empty()).then(|| tag.to_string())
}

/// Composes fetching and generation for a single row.
pub struct RowProcessor {
    fetcher: Arc<dyn PageFetcher>,
    generator: Arc<ContentGenerator>,
}

impl RowProcessor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, generator: Arc<ContentGenerator>) -> Self {
        Self { fetcher, generator }
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    /// First-pass enrichment of `row`.
    pub async fn process(&self, row: &Row) -> ProcessOutcome {
        if let Some(tag) = tag_index_name(&row.url) {
            if !self.generator.try_reserve(TAG_CALLS) {
                return ProcessOutcome::CallLimitReached;
            }
            return ProcessOutcome::Completed(self.tag_index_fields(row, &tag).await);
        }

        self.fetch_and_generate(row, PromptVariant::Initial).await
    }

    /// Re-scrape and regenerate with the revision prompts.
    pub async fn repair(&self, row: &Row) -> ProcessOutcome {
        self.fetch_and_generate(row, PromptVariant::Revision).await
    }

    async fn fetch_and_generate(&self, row: &Row, variant: PromptVariant) -> ProcessOutcome {
        if !self.generator.try_reserve(PAGE_CALLS) {
            debug!(url = %row.url, "daily call limit reached, row deferred");
            return ProcessOutcome::CallLimitReached;
        }

        match self.fetch(&row.url).await {
            Some(page) => ProcessOutcome::Completed(self.generate_fields(page, variant).await),
            None => {
                self.generator.release(PAGE_CALLS);
                ProcessOutcome::FetchFailed(format!("could not fetch {}", row.url))
            }
        }
    }

    /// Tag listing pages get a templated description; only the title is generated.
    async fn tag_index_fields(&self, row: &Row, tag: &str) -> RowFields {
        let site = &self.generator.settings().site.name;
        let synthesized = format!("Articles related to {tag} on {site}");
        let seo_title = self
            .generator
            .generate_title(&row.title, &synthesized, PromptVariant::Initial)
            .await;

        debug!(url = %row.url, tag, "tag index row");
        RowFields {
            title: format!("Tagged: {tag}"),
            seo_title,
            meta_description: format!("Explore articles related to {tag} on {site}."),
        }
    }

    async fn fetch(&self, url: &str) -> Option<PageContent> {
        match self.fetcher.fetch(url).await {
            Ok(page) if !page.is_empty() => Some(page),
            Ok(_) => {
                warn!(url, "page had no title or body text");
                None
            }
            Err(e) => {
                warn!(url, error = %e, "fetch failed");
                None
            }
        }
    }

    async fn generate_fields(&self, page: PageContent, variant: PromptVariant) -> RowFields {
        let meta_description = self
            .generator
            .generate_description(
                &page.title,
                excerpt(&page.body_text, DESCRIPTION_EXCERPT_CHARS),
                variant,
            )
            .await;
        let seo_title = self
            .generator
            .generate_title(
                &page.title,
                excerpt(&page.body_text, TITLE_EXCERPT_CHARS),
                variant,
            )
            .await;

        RowFields {
            title: page.title,
            seo_title,
            meta_description,
        }
    }
}
