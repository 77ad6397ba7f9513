//! Generative-text completion client.
//!
//! This crate provides:
//! - [`CompletionClient`]: one prompt in, one text out
//! - [`OpenAiClient`]: an OpenAI-compatible `/chat/completions` implementation

mod openai;

use async_trait::async_trait;
use seoenrich_shared::Result;

pub use openai::{DEFAULT_BASE_URL, OpenAiClient, OpenAiOptions};

/// A single completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model identifier sent to the service.
    pub model: String,
    /// The full user prompt.
    pub prompt: String,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Calls a generative-text service once per request.
///
/// Implementations return the trimmed completion text, or `Err` on any
/// transport, HTTP, or response-shape failure.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
