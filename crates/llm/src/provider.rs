//! LLM Provider Trait
//!
//! Defines the common interface for all AI backends, plus the HTTP status
//! classification every provider shares.

use async_trait::async_trait;
use tracing::warn;

use super::types::{
    CanonicalMessage, CompletionOptions, GatewayResult, LlmError, LlmResult, ProviderDescriptor,
    ToolDefinition,
};

/// Trait that all LLM providers must implement.
///
/// A provider owns exactly one request builder and one response parser for its
/// wire format. It does not retry: retry and fallback policy belong to the
/// orchestrator driving the cascade.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Static descriptor this provider was built from.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Send one completion request and normalize the response.
    ///
    /// `api_key` is resolved by the caller (session override or environment).
    async fn complete(
        &self,
        messages: &[CanonicalMessage],
        options: &CompletionOptions,
        api_key: &str,
    ) -> LlmResult<GatewayResult>;
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

const MAX_ERROR_BODY_CHARS: usize = 500;

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut out: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        out.push_str("...");
        out
    }
}

/// Helper function to parse HTTP error status codes
///
/// 402 is quota exhaustion. 429 is a rate limit unless the body says the
/// account is out of quota (OpenAI-compatible APIs report `insufficient_quota`
/// with a 429).
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    let message = format!("{}: {}", provider, truncate_body(body));
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        402 => LlmError::TokenExhausted { message },
        429 => {
            let lowered = body.to_lowercase();
            if lowered.contains("insufficient_quota") || lowered.contains("insufficient balance") {
                LlmError::TokenExhausted { message }
            } else {
                LlmError::RateLimited {
                    message,
                    retry_after: None,
                }
            }
        }
        408 => LlmError::Timeout { timeout_ms: 0 },
        400 | 404 | 413 | 422 => LlmError::InvalidRequest { message },
        500..=599 => LlmError::ServerError {
            message,
            status: Some(status),
        },
        _ => LlmError::ServerError {
            message: format!("{} (HTTP {})", message, status),
            status: Some(status),
        },
    }
}

/// `Retry-After` header value in delta-seconds. HTTP-date values yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Attach a server-supplied retry hint to a rate-limit error.
pub fn with_retry_after(err: LlmError, retry_after: Option<u32>) -> LlmError {
    match err {
        LlmError::RateLimited { message, .. } if retry_after.is_some() => {
            LlmError::RateLimited {
                message,
                retry_after,
            }
        }
        other => other,
    }
}

/// Tool definitions clipped to the provider's `max_tools` cap.
///
/// Truncates instead of failing; the first `max_tools` definitions are kept.
pub fn capped_tools<'a>(
    descriptor: &ProviderDescriptor,
    tools: &'a [ToolDefinition],
) -> &'a [ToolDefinition] {
    match descriptor.max_tools {
        Some(max) if tools.len() > max => {
            warn!(
                provider = %descriptor.name,
                offered = tools.len(),
                max_tools = max,
                "Truncating tool definitions to provider limit"
            );
            &tools[..max]
        }
        _ => tools,
    }
}
