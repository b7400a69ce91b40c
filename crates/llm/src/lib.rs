//! Suite Gateway LLM
//!
//! Provides a unified interface for interacting with AI backends that speak
//! incompatible wire formats:
//! - OpenAI-style chat completions (OpenAI, DeepSeek, OpenRouter, Groq, Kimi, ...)
//! - Gemini-style `generateContent`
//!
//! Also includes the provider error taxonomy and the HTTP client factory.

pub mod gemini;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;

// Re-export main types
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{
    capped_tools, missing_api_key_error, parse_http_error, parse_retry_after, with_retry_after,
    LlmProvider,
};
pub use types::*;

/// Create the provider for a descriptor, selected by its wire format.
pub fn build_provider(
    descriptor: ProviderDescriptor,
    client: reqwest::Client,
) -> Arc<dyn LlmProvider> {
    match descriptor.wire {
        WireFormat::OpenAI => Arc::new(OpenAIProvider::new(descriptor, client)),
        WireFormat::Gemini => Arc::new(GeminiProvider::new(descriptor, client)),
    }
}
