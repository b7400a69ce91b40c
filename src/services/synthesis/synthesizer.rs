//! Result Synthesizer
//!
//! Converts raw tool outputs into a natural-language answer with exactly one
//! bounded AI call. When that call fails, a templated `"{tool}: {snippet}"`
//! concatenation is returned instead, so an answer always exists once any
//! tool ran.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use suite_gateway_core::{ExecutionContext, RequestContext};
use suite_gateway_llm::{CanonicalMessage, CompletionOptions, ToolCallMode};
use suite_gateway_tools::truncate_chars;

use crate::services::fallback::FallbackOrchestrator;
use crate::services::tools::ExecutedTool;

const SNIPPET_CHARS: usize = 300;
const PROMPT_RESULT_CHARS: usize = 2_000;

/// Synthesized answer and who produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub text: String,
    /// Provider that wrote the text; `None` for the template
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl Synthesis {
    fn templated(executed: &[ExecutedTool]) -> Self {
        Self {
            text: template_summary(executed),
            provider: None,
            model: None,
        }
    }

    pub fn is_templated(&self) -> bool {
        self.provider.is_none()
    }
}

pub struct ResultSynthesizer {
    orchestrator: Arc<FallbackOrchestrator>,
    max_tokens: u32,
    timeout: Duration,
}

impl ResultSynthesizer {
    pub fn new(orchestrator: Arc<FallbackOrchestrator>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            orchestrator,
            max_tokens,
            timeout,
        }
    }

    /// One call against `provider`, else the template. Without a provider
    /// the template is used directly.
    pub async fn synthesize(
        &self,
        ctx: &RequestContext,
        provider: Option<&str>,
        query: &str,
        executed: &[ExecutedTool],
    ) -> Synthesis {
        let Some(provider) = provider else {
            return Synthesis::templated(executed);
        };
        if executed.is_empty() {
            return Synthesis::templated(executed);
        }

        let messages = synthesis_messages(query, executed);
        let options = CompletionOptions {
            tool_call_mode: ToolCallMode::None,
            ..CompletionOptions::default()
        }
        .with_max_tokens(self.max_tokens);

        let call = self
            .orchestrator
            .execute_single(ctx, provider, &messages, &options);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => match result.text() {
                Some(text) => {
                    info!(provider, request_id = ctx.request_id(), "Synthesized tool results");
                    Synthesis {
                        text: text.to_string(),
                        provider: Some(result.provider.clone()),
                        model: Some(result.model.clone()),
                    }
                }
                None => {
                    warn!(provider, "Synthesis returned no text, using template");
                    Synthesis::templated(executed)
                }
            },
            Ok(Err(e)) => {
                warn!(provider, error = %e, "Synthesis call failed, using template");
                Synthesis::templated(executed)
            }
            Err(_) => {
                warn!(
                    provider,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Synthesis call timed out, using template"
                );
                Synthesis::templated(executed)
            }
        }
    }
}

fn synthesis_messages(query: &str, executed: &[ExecutedTool]) -> Vec<CanonicalMessage> {
    let results = executed
        .iter()
        .map(|t| {
            format!(
                "### {}\n{}",
                t.result.tool_name,
                truncate_chars(&t.result.to_content(), PROMPT_RESULT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        CanonicalMessage::system(
            "You turn live tool results into a short answer for a dashboard user. \
             Use only the data provided, quote concrete numbers, and mention failed \
             tools in one sentence. Do not request further tools.",
        ),
        CanonicalMessage::user(format!(
            "## Question\n{}\n\n## Tool Results\n{}",
            if query.is_empty() { "(no question text)" } else { query },
            results
        )),
    ]
}

/// Deterministic `"{tool}: {snippet}"` lines, one per result.
pub fn template_summary(executed: &[ExecutedTool]) -> String {
    if executed.is_empty() {
        return "No tool results are available for this request.".to_string();
    }
    executed
        .iter()
        .map(|t| {
            let snippet = if t.result.success {
                t.result
                    .result
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "null".to_string())
            } else {
                format!("error: {}", t.result.error.as_deref().unwrap_or("unknown error"))
            };
            format!("{}: {}", t.result.tool_name, truncate_chars(&snippet, SNIPPET_CHARS))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
