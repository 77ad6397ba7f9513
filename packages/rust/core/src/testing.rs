//! In-memory collaborators for core tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use seoenrich_fetcher::{PageContent, PageFetcher};
use seoenrich_llm::{CompletionClient, CompletionRequest};
use seoenrich_shared::{Result, SeoEnrichError};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Completion client answering from a closure and recording every request.
pub(crate) struct MockCompletions {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletions {
    pub(crate) fn new(
        responder: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `description` for description prompts, `title` for everything else.
    pub(crate) fn fixed(description: &str, title: &str) -> Self {
        let description = description.to_string();
        let title = title.to_string();
        Self::new(move |request| {
            if is_description_request(request) {
                Ok(description.clone())
            } else {
                Ok(title.clone())
            }
        })
    }

    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(SeoEnrichError::Generation("HTTP 500".into())))
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn description_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| is_description_request(r))
            .count()
    }
}

pub(crate) fn is_description_request(request: &CompletionRequest) -> bool {
    request.prompt.contains("meta description")
}

#[async_trait]
impl CompletionClient for MockCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// Fetcher serving fixed pages; unknown URLs fail like a 404.
#[derive(Default)]
pub(crate) struct MockFetcher {
    pages: HashMap<String, PageContent>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: &str, title: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            PageContent {
                title: title.to_string(),
                body_text: body.to_string(),
            },
        );
        self
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(page) if !page.is_empty() => Ok(page.clone()),
            Some(_) => Err(SeoEnrichError::parse(format!("{url}: no title or body text found"))),
            None => Err(SeoEnrichError::Network(format!("{url}: HTTP 404 Not Found"))),
        }
    }
}
