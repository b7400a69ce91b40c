//! Chat Pipeline
//!
//! The per-request agentic loop:
//!
//! ```text
//! START -> cascade -> tools present? -> execute (in order) -> follow-up ... -> DONE
//!            |                                  (at most max_tool_iterations)
//!            +-> all exhausted, no tools yet -> emergency fallback -> DONE
//!            +-> all exhausted after tools   -> synthesis          -> DONE
//!            +-> no credentials anywhere     -> HARD_FAIL
//! ```
//!
//! The whole loop is raced against the outer request timeout.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use suite_gateway_core::{ExecutionContext, RequestContext};
use suite_gateway_llm::{CanonicalMessage, CompletionOptions, FailureKind, GatewayResult};
use suite_gateway_tools::{extract_text_without_tool_calls, format_tool_result};

use super::enricher::ContextEnricher;
use super::types::{ChatReply, ChatRequest, EMERGENCY_PROVIDER};
use crate::config::{ExecutiveConfig, PipelineSettings};
use crate::services::fallback::{CascadeError, FallbackOrchestrator};
use crate::services::synthesis::{EmergencyFallback, ResultSynthesizer};
use crate::services::tools::{ExecutedTool, Extraction, ToolCallExtractor, ToolExecutor};

/// Confidence reported for emergency-fallback answers.
pub const EMERGENCY_CONFIDENCE: u8 = 30;

/// Failures that reach the end user.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// Pre-flight: no provider has an API key
    #[error("No API credentials configured for any AI provider")]
    NoCredentials,

    /// Every provider failed and the emergency fallback is disabled
    #[error("AI providers unavailable: {message}")]
    ProvidersUnavailable { kind: FailureKind, message: String },

    /// Outer request timeout hit and the emergency fallback is disabled
    #[error("Request exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl PipelineError {
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            PipelineError::NoCredentials => None,
            PipelineError::ProvidersUnavailable { kind, .. } => Some(*kind),
            PipelineError::Timeout { .. } => Some(FailureKind::Timeout),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// 95 for the first provider, minus 10 per fallback step, floor 50.
pub fn confidence_for_attempt(fallback_attempt: usize) -> u8 {
    let steps = fallback_attempt.saturating_sub(1).min(10) as u8;
    95u8.saturating_sub(steps * 10).max(50)
}

pub struct ChatPipeline {
    orchestrator: Arc<FallbackOrchestrator>,
    executor: Arc<ToolExecutor>,
    extractor: ToolCallExtractor,
    enricher: ContextEnricher,
    synthesizer: ResultSynthesizer,
    emergency: EmergencyFallback,
    settings: PipelineSettings,
    request_timeout: Duration,
}

impl ChatPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Arc<FallbackOrchestrator>,
        executor: Arc<ToolExecutor>,
        extractor: ToolCallExtractor,
        enricher: ContextEnricher,
        synthesizer: ResultSynthesizer,
        emergency: EmergencyFallback,
        settings: PipelineSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            executor,
            extractor,
            enricher,
            synthesizer,
            emergency,
            settings,
            request_timeout,
        }
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub fn emergency(&self) -> &EmergencyFallback {
        &self.emergency
    }

    /// Handle one chat request for `executive`.
    pub async fn respond(
        &self,
        ctx: &RequestContext,
        executive: &ExecutiveConfig,
        request: &ChatRequest,
    ) -> PipelineResult<ChatReply> {
        match tokio::time::timeout(self.request_timeout, self.run(ctx, executive, request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let timeout_ms = self.request_timeout.as_millis() as u64;
                warn!(
                    request_id = ctx.request_id(),
                    timeout_ms, "Request timed out before the pipeline finished"
                );
                if !self.settings.emergency_fallback {
                    return Err(PipelineError::Timeout { timeout_ms });
                }
                let query = request.latest_user_query().unwrap_or_default();
                Ok(self.emergency_reply(ctx, executive, query).await)
            }
        }
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        executive: &ExecutiveConfig,
        request: &ChatRequest,
    ) -> PipelineResult<ChatReply> {
        let tools = self.executor.registry().definitions();
        let mut messages = self.enricher.build(executive, request, &tools);
        let query = request.latest_user_query().unwrap_or_default().to_string();

        let mut prefer = executive.prefer_provider.clone();
        let mut executed: Vec<ExecutedTool> = Vec::new();
        let mut last_success: Option<GatewayResult> = None;
        // Providers that answered 402/429 get no second call in this request.
        let mut fast_failed: Vec<String> = Vec::new();

        for iteration in 1..=self.settings.max_tool_iterations {
            let mut options = CompletionOptions::default()
                .with_tools(tools.clone())
                .excluding(fast_failed.iter().cloned());
            options.prefer_provider = prefer.clone();

            let result = match self.orchestrator.execute(ctx, &messages, &options).await {
                Ok((result, log)) => {
                    note_fast_failures(
                        &mut fast_failed,
                        log.attempts
                            .iter()
                            .filter(|a| a.failure_kind.is_some_and(|k| k.is_fast_fail()))
                            .map(|a| a.provider.as_str()),
                    );
                    result
                }
                Err(CascadeError::NoCredentials) => return Err(PipelineError::NoCredentials),
                Err(err) if executed.is_empty() => {
                    return self.exhausted(ctx, executive, &query, err).await;
                }
                Err(err) => {
                    note_fast_failures(
                        &mut fast_failed,
                        err.failures()
                            .iter()
                            .filter(|f| f.attempted && f.kind.is_fast_fail())
                            .map(|f| f.provider.as_str()),
                    );
                    warn!(
                        request_id = ctx.request_id(),
                        error = %err,
                        "Follow-up cascade failed, synthesizing from tool results"
                    );
                    break;
                }
            };

            // After tools ran, only explicit calls continue the loop.
            let extraction = if executed.is_empty() {
                self.extractor
                    .extract(result.content.as_deref(), &result.tool_calls)
            } else {
                self.extractor
                    .extract_explicit(result.content.as_deref(), &result.tool_calls)
            };
            let Some(extraction) = extraction else {
                info!(
                    request_id = ctx.request_id(),
                    provider = %result.provider,
                    iteration,
                    tools = executed.len(),
                    "Pipeline finished"
                );
                let text = result.text().unwrap_or_default().to_string();
                return Ok(self.reply(executive, text, &result, &executed));
            };

            debug!(
                iteration,
                source = ?extraction.source,
                count = extraction.calls.len(),
                "Executing tool calls"
            );
            let batch = self.executor.execute_all(ctx, &extraction.calls).await;
            append_tool_turn(&mut messages, &result, &extraction, &batch);
            executed.extend(batch);
            prefer = Some(result.provider.clone());
            last_success = Some(result);
        }

        // Iteration cap reached, or a follow-up failed after tools ran.
        let Some(last) = last_success else {
            return Err(PipelineError::ProvidersUnavailable {
                kind: FailureKind::ServiceUnavailable,
                message: "no provider completed a turn".to_string(),
            });
        };
        let synthesis_provider = if fast_failed.contains(&last.provider) {
            debug!(provider = %last.provider, "Provider fast-failed this request, using template");
            None
        } else {
            Some(last.provider.as_str())
        };
        let synthesis = self
            .synthesizer
            .synthesize(ctx, synthesis_provider, &query, &executed)
            .await;
        let mut reply = self.reply(executive, synthesis.text, &last, &executed);
        if let (Some(provider), Some(model)) = (synthesis.provider, synthesis.model) {
            reply.provider = provider;
            reply.model = model;
        }
        Ok(reply)
    }

    async fn exhausted(
        &self,
        ctx: &RequestContext,
        executive: &ExecutiveConfig,
        query: &str,
        err: CascadeError,
    ) -> PipelineResult<ChatReply> {
        if self.settings.emergency_fallback {
            warn!(request_id = ctx.request_id(), error = %err, "Using emergency fallback");
            return Ok(self.emergency_reply(ctx, executive, query).await);
        }
        error!(request_id = ctx.request_id(), error = %err, "All providers exhausted");
        Err(PipelineError::ProvidersUnavailable {
            kind: err.dominant_kind().unwrap_or(FailureKind::ServiceUnavailable),
            message: err.to_string(),
        })
    }

    async fn emergency_reply(
        &self,
        ctx: &RequestContext,
        executive: &ExecutiveConfig,
        query: &str,
    ) -> ChatReply {
        let report = self.emergency.respond(ctx, query).await;
        ChatReply {
            response: report.response,
            has_tool_calls: !report.executed.is_empty(),
            tool_calls_executed: report.executed.len(),
            provider: EMERGENCY_PROVIDER.to_string(),
            model: "none".to_string(),
            executive: executive.name.clone(),
            confidence: Some(EMERGENCY_CONFIDENCE),
        }
    }

    fn reply(
        &self,
        executive: &ExecutiveConfig,
        response: String,
        result: &GatewayResult,
        executed: &[ExecutedTool],
    ) -> ChatReply {
        ChatReply {
            response,
            has_tool_calls: !executed.is_empty(),
            tool_calls_executed: executed.len(),
            provider: result.provider.clone(),
            model: result.model.clone(),
            executive: executive.name.clone(),
            confidence: Some(confidence_for_attempt(result.metadata.fallback_attempt)),
        }
    }
}

fn note_fast_failures<'a>(seen: &mut Vec<String>, providers: impl Iterator<Item = &'a str>) {
    for provider in providers {
        if !seen.iter().any(|p| p == provider) {
            seen.push(provider.to_string());
        }
    }
}

/// Feed a tool round back into the conversation, preserving call order.
///
/// Native calls use the structured assistant/tool message pair; calls
/// recovered from text are answered with one user message, since the model
/// never produced call ids the provider would recognise.
fn append_tool_turn(
    messages: &mut Vec<CanonicalMessage>,
    result: &GatewayResult,
    extraction: &Extraction,
    batch: &[ExecutedTool],
) {
    if extraction.source.is_native() {
        messages.push(CanonicalMessage::assistant_tool_calls(
            result.content.clone().unwrap_or_default(),
            extraction.calls.clone(),
        ));
        for executed in batch {
            messages.push(CanonicalMessage::tool_result(
                executed.call.id.clone(),
                executed.call.name(),
                executed.result.to_content(),
            ));
        }
        return;
    }

    let spoken = result
        .content
        .as_deref()
        .map(extract_text_without_tool_calls)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            let names: Vec<&str> = extraction.calls.iter().map(|c| c.name()).collect();
            format!("Calling tools: {}", names.join(", "))
        });
    messages.push(CanonicalMessage::assistant(spoken));

    let results = batch
        .iter()
        .map(|executed| {
            format_tool_result(
                executed.call.name(),
                &executed.call.id,
                &executed.result.to_content(),
                !executed.result.success,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    messages.push(CanonicalMessage::user(format!(
        "{}\n\nUse these results to answer my previous question.",
        results
    )));
}
