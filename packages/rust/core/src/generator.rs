//! Meta description and SEO title generation.
//!
//! Builds the instruction prompts, makes one completion call per field, and
//! turns any failure into [`GENERATION_SENTINEL`] so a bad call never stops
//! the row or the batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use seoenrich_llm::{CompletionClient, CompletionRequest};
use seoenrich_shared::{AppConfig, GENERATION_SENTINEL, SiteConfig};

/// Body characters passed to the description prompt.
pub const DESCRIPTION_EXCERPT_CHARS: usize = 1000;

/// Body characters passed to the title prompt.
pub const TITLE_EXCERPT_CHARS: usize = 500;

/// Stand-in for an empty excerpt.
const NO_INFO: &str = "No Info Provided";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which generated field a call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    MetaDescription,
    SeoTitle,
}

impl Field {
    /// Column name, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaDescription => "meta_description",
            Self::SeoTitle => "seo_title",
        }
    }
}

/// Prompt wording: first pass or repair of a rejected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Initial,
    Revision,
}

/// Result of one generation call before sentinel substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated(String),
    Failed(String),
}

impl GenerationOutcome {
    /// The generated text, or the sentinel on failure.
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::Failed(_) => GENERATION_SENTINEL.to_string(),
        }
    }
}

/// Model and token settings per call site.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub model: String,
    pub revision_model: String,
    pub description_max_tokens: u32,
    pub title_max_tokens: u32,
    pub site: SiteConfig,
}

impl From<&AppConfig> for GeneratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.generator.model.clone(),
            revision_model: config.generator.revision_model.clone(),
            description_max_tokens: config.generator.description_max_tokens,
            title_max_tokens: config.generator.title_max_tokens,
            site: config.site.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// CallBudget
// ---------------------------------------------------------------------------

/// Generative calls allowed today. Callers reserve the calls a unit of work
/// needs before starting it, so work is never begun that cannot finish.
#[derive(Debug)]
pub struct CallBudget {
    limit: u64,
    reserved: AtomicU64,
}

impl CallBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            reserved: AtomicU64::new(0),
        }
    }

    /// Reserve `calls` at once. Returns `false`, reserving nothing, if that
    /// would exceed the limit.
    pub fn try_reserve(&self, calls: u64) -> bool {
        self.reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |reserved| {
                reserved
                    .checked_add(calls)
                    .filter(|total| *total <= self.limit)
            })
            .is_ok()
    }

    /// Hand back calls reserved for work that was abandoned.
    pub fn release(&self, calls: u64) {
        let _ = self
            .reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |reserved| {
                Some(reserved.saturating_sub(calls))
            });
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.reserved.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// ContentGenerator
// ---------------------------------------------------------------------------

/// Produces meta descriptions and SEO titles through a [`CompletionClient`].
pub struct ContentGenerator {
    client: Arc<dyn CompletionClient>,
    settings: GeneratorSettings,
    budget: CallBudget,
    calls_made: AtomicU64,
}

impl ContentGenerator {
    /// `call_limit` caps the completion calls this generator may reserve.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        settings: GeneratorSettings,
        call_limit: u64,
    ) -> Self {
        Self {
            client,
            settings,
            budget: CallBudget::new(call_limit),
            calls_made: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Completion calls actually sent so far.
    pub fn calls_made(&self) -> u64 {
        self.calls_made.load(Ordering::SeqCst)
    }

    /// Calls still available for reservation.
    pub fn calls_remaining(&self) -> u64 {
        self.budget.remaining()
    }

    /// Reserve `calls` from the daily budget. See [`CallBudget::try_reserve`].
    pub fn try_reserve(&self, calls: u64) -> bool {
        self.budget.try_reserve(calls)
    }

    /// Return an unused reservation.
    pub fn release(&self, calls: u64) {
        self.budget.release(calls);
    }

    /// Generate a meta description. Returns the sentinel on failure.
    pub async fn generate_description(
        &self,
        title: &str,
        text: &str,
        variant: PromptVariant,
    ) -> String {
        let prompt = description_prompt(&self.settings.site, title, text, variant);
        self.generate(Field::MetaDescription, prompt, variant)
            .await
            .into_text()
    }

    /// Generate an SEO title. Returns the sentinel on failure.
    pub async fn generate_title(&self, title: &str, text: &str, variant: PromptVariant) -> String {
        let prompt = title_prompt(&self.settings.site, title, text, variant);
        self.generate(Field::SeoTitle, prompt, variant)
            .await
            .into_text()
    }

    /// One completion call with explicit success/failure.
    ///
    /// The call must already be covered by a reservation.
    pub async fn generate(
        &self,
        field: Field,
        prompt: String,
        variant: PromptVariant,
    ) -> GenerationOutcome {
        let model = match variant {
            PromptVariant::Initial => &self.settings.model,
            PromptVariant::Revision => &self.settings.revision_model,
        };
        let max_tokens = match field {
            Field::MetaDescription => self.settings.description_max_tokens,
            Field::SeoTitle => self.settings.title_max_tokens,
        };
        let request = CompletionRequest {
            model: model.clone(),
            prompt,
            max_tokens,
        };

        self.calls_made.fetch_add(1, Ordering::SeqCst);
        let outcome = match self.client.complete(&request).await {
            Ok(text) if text.trim().is_empty() => {
                GenerationOutcome::Failed("empty completion".into())
            }
            Ok(text) => GenerationOutcome::Generated(text.trim().to_string()),
            Err(e) => GenerationOutcome::Failed(e.to_string()),
        };

        match &outcome {
            GenerationOutcome::Generated(text) => {
                debug!(field = field.as_str(), ?variant, result = %text, "generation result");
            }
            GenerationOutcome::Failed(reason) => {
                warn!(
                    field = field.as_str(),
                    ?variant,
                    %reason,
                    "generation failed, writing sentinel"
                );
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// "art, music, and politics" style list.
fn join_themes(themes: &[String]) -> String {
    match themes {
        [] => "local news".to_string(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

fn page_block(title: &str, text: &str) -> String {
    let text = if text.trim().is_empty() { NO_INFO } else { text };
    format!("\n{title}\n{text}")
}

/// Prompt for a meta description of at most 150 characters.
pub fn description_prompt(
    site: &SiteConfig,
    title: &str,
    text: &str,
    variant: PromptVariant,
) -> String {
    let themes = join_themes(&site.themes);
    let name = &site.name;
    let region = &site.region;

    let instructions = match variant {
        PromptVariant::Initial => format!(
            "You write meta descriptions for {name}'s website. Use plain English with \
             standard sentence structure. Avoid phrases like 'Join us'; use 'Check out', \
             'Discover', 'Look out for', 'Don't miss' or 'Explore' instead, since events \
             are often hosted by other groups. Make each description unique and true to \
             the content and tone of the page, with {name}'s focus on {themes} in {region}. \
             In one or two complete sentences with a maximum length of 150 characters, \
             write a professional, concise meta description for this page:"
        ),
        PromptVariant::Revision => format!(
            "The meta description previously written for this {name} page did not meet \
             our standards. It may have had incorrect grammar, bad formatting, too much \
             length, or more than one line of text. Write a replacement meta description \
             that summarizes the article in plain English, with no special characters and \
             no surrounding quotation marks, and that reflects {name}'s coverage of \
             {themes} in {region}. Use one or two complete sentences on a single line, \
             strictly no longer than 150 characters. The page title and text follow:"
        ),
    };

    format!("{instructions}{}", page_block(title, text))
}

/// Prompt for an SEO title of at most 60 characters.
pub fn title_prompt(site: &SiteConfig, title: &str, text: &str, variant: PromptVariant) -> String {
    let themes = join_themes(&site.themes);
    let name = &site.name;
    let region = &site.region;

    let instructions = match variant {
        PromptVariant::Initial => format!(
            "You write SEO titles for {name}'s website. Using the page title and text \
             below, write one short SEO title with a strict maximum of 60 characters. \
             Do not put quotes around the title. Avoid phrases like 'Join us'; use \
             'Check out' instead, since events are often hosted by other groups. Make the \
             title unique and reflective of the content, with {name}'s focus on {themes} \
             in {region}. The page title and text start here:"
        ),
        PromptVariant::Revision => format!(
            "The SEO title previously written for this {name} page was rejected: it may \
             have been badly formatted, unfocused, or missed the point of the page. \
             Write one revised SEO title that is engaging, precise, relevant to readers \
             interested in {themes} in {region}, and limited to 60 characters. Do not put \
             quotes around the title and keep it on one line. The page title and text \
             start here:"
        ),
    };

    format!("{instructions}{}", page_block(title, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompletions;

    fn settings() -> GeneratorSettings {
        GeneratorSettings::from(&AppConfig::default())
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(excerpt(&text, 3), "ééé");
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("", 5), "");
    }

    #[test]
    fn themes_are_joined_naturally() {
        let themes: Vec<String> = ["art", "music", "food"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_themes(&themes), "art, music, and food");
        assert_eq!(join_themes(&themes[..2]), "art and music");
    }

    #[test]
    fn prompts_embed_title_and_text() {
        let site = SiteConfig::default();
        let prompt = description_prompt(&site, "A Concert", "Long body...", PromptVariant::Initial);
        assert!(prompt.ends_with("\nA Concert\nLong body..."));
        assert!(prompt.contains("150 characters"));
        assert!(prompt.contains("RVA Magazine"));

        let prompt = title_prompt(&site, "A Concert", "", PromptVariant::Initial);
        assert!(prompt.contains("60 characters"));
        assert!(prompt.ends_with("\nNo Info Provided"));
    }

    #[test]
    fn revision_prompts_differ_from_initial() {
        let site = SiteConfig::default();
        let initial = description_prompt(&site, "T", "x", PromptVariant::Initial);
        let revision = description_prompt(&site, "T", "x", PromptVariant::Revision);
        assert_ne!(initial, revision);
        assert!(revision.contains("did not meet"));
        let title = title_prompt(&site, "T", "x", PromptVariant::Revision);
        assert!(!title.contains("meta description"));
    }

    #[tokio::test]
    async fn uses_model_and_budget_per_call_site() {
        let mock = Arc::new(MockCompletions::fixed("Fresh description.", "Fresh Title"));
        let generator = ContentGenerator::new(mock.clone(), settings(), 10);

        let description = generator
            .generate_description("T", "body", PromptVariant::Initial)
            .await;
        let title = generator
            .generate_title("T", "body", PromptVariant::Revision)
            .await;

        assert_eq!(description, "Fresh description.");
        assert_eq!(title, "Fresh Title");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "gpt-3.5-turbo");
        assert_eq!(requests[0].max_tokens, 150);
        assert_eq!(requests[1].model, "gpt-4");
        assert_eq!(requests[1].max_tokens, 50);
        assert_eq!(generator.calls_made(), 2);
    }

    #[tokio::test]
    async fn service_failure_yields_sentinel() {
        let mock = Arc::new(MockCompletions::failing());
        let generator = ContentGenerator::new(mock, settings(), 10);

        let text = generator
            .generate_description("T", "body", PromptVariant::Initial)
            .await;
        assert_eq!(text, GENERATION_SENTINEL);
    }

    #[tokio::test]
    async fn empty_completion_is_a_failure() {
        let mock = Arc::new(MockCompletions::fixed("   ", "   "));
        let generator = ContentGenerator::new(mock, settings(), 10);

        let outcome = generator
            .generate(Field::SeoTitle, "p".into(), PromptVariant::Initial)
            .await;
        assert!(matches!(outcome, GenerationOutcome::Failed(_)));
    }

    #[test]
    fn reservation_is_all_or_nothing() {
        let budget = CallBudget::new(3);
        assert!(budget.try_reserve(2));
        assert!(!budget.try_reserve(2));
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_reserve(1));
        assert_eq!(budget.remaining(), 0);
        assert!(!budget.try_reserve(1));
    }

    #[test]
    fn released_calls_can_be_reserved_again() {
        let budget = CallBudget::new(2);
        assert!(budget.try_reserve(2));
        budget.release(2);
        assert_eq!(budget.remaining(), 2);
        budget.release(5);
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn zero_limit_refuses_everything() {
        let budget = CallBudget::new(0);
        assert!(!budget.try_reserve(1));
        assert!(budget.try_reserve(0));
    }

    #[test]
    fn concurrent_reservations_never_exceed_limit() {
        let budget = Arc::new(CallBudget::new(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || (0..10).filter(|_| budget.try_reserve(2)).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 5);
        assert_eq!(budget.remaining(), 0);
    }

    #[tokio::test]
    async fn calls_made_counts_sent_requests() {
        let mock = Arc::new(MockCompletions::failing());
        let generator = ContentGenerator::new(mock.clone(), settings(), 5);
        assert!(generator.try_reserve(2));

        generator.generate_title("T", "x", PromptVariant::Initial).await;
        assert_eq!(generator.calls_made(), 1);
        assert_eq!(generator.calls_remaining(), 3);
    }
}
