//! Provider Fallback Chain
//!
//! Drives the cascade across registered providers. Providers are attempted
//! strictly one after another in priority order (a caller-preferred provider
//! first), each under its own hard timeout. A provider is attempted at most
//! once per cascade: quota and rate-limit signals move on immediately, and no
//! other failure kind is retried either.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use suite_gateway_core::{ExecutionContext, RequestContext};
use suite_gateway_llm::{
    CanonicalMessage, CompletionOptions, FailureKind, GatewayMetadata, GatewayResult, LlmError,
    LlmResult,
};

use super::circuit_breaker::CircuitBreaker;
use super::credentials::CredentialResolver;
use super::rate_limit::RateLimiter;
use super::registry::{ProviderRegistry, RegistryEntry};

/// Why one provider did not answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub message: String,
    /// False when the provider was skipped without a network call
    pub attempted: bool,
}

impl ProviderFailure {
    fn skipped(provider: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            message: message.into(),
            attempted: false,
        }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.provider, self.kind, self.message)
    }
}

/// Errors from cascade execution
#[derive(Debug, Clone, Error)]
pub enum CascadeError {
    /// Pre-flight: not a single provider has an API key
    #[error("No API credentials configured for any provider")]
    NoCredentials,

    #[error("All providers exhausted: {}", summarize(.failures))]
    AllProvidersExhausted { failures: Vec<ProviderFailure> },

    #[error("Provider '{0}' is not registered")]
    UnknownProvider(String),
}

fn summarize(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers registered".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CascadeError {
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            CascadeError::AllProvidersExhausted { failures } => failures,
            _ => &[],
        }
    }

    /// Failure kind that best describes the whole cascade to an end user.
    ///
    /// Only attempted providers count; quota beats rate limit beats timeout.
    pub fn dominant_kind(&self) -> Option<FailureKind> {
        let attempted: Vec<FailureKind> = self
            .failures()
            .iter()
            .filter(|f| f.attempted)
            .map(|f| f.kind)
            .collect();
        if attempted.is_empty() {
            return None;
        }
        if attempted.iter().all(|k| *k == FailureKind::TokenExhausted) {
            Some(FailureKind::TokenExhausted)
        } else if attempted.iter().any(|k| k.is_fast_fail()) {
            Some(FailureKind::RateLimited)
        } else if attempted.iter().all(|k| *k == FailureKind::Timeout) {
            Some(FailureKind::Timeout)
        } else {
            Some(FailureKind::ServiceUnavailable)
        }
    }
}

/// Result type for cascade operations
pub type CascadeResult<T> = Result<T, CascadeError>;

/// Record of a single provider attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackAttempt {
    pub provider: String,
    pub success: bool,
    pub failure_kind: Option<FailureKind>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    /// RFC 3339 start time
    pub started_at: String,
}

impl FallbackAttempt {
    pub fn success(provider: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            success: true,
            failure_kind: None,
            error_message: None,
            duration_ms,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        kind: FailureKind,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            failure_kind: Some(kind),
            error_message: Some(error.into()),
            duration_ms,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Log of every attempt in one cascade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackExecutionLog {
    pub attempts: Vec<FallbackAttempt>,
    pub total_duration_ms: u64,
    pub successful_provider: Option<String>,
    pub overall_success: bool,
}

impl FallbackExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_attempt(&mut self, attempt: FallbackAttempt) {
        self.total_duration_ms += attempt.duration_ms;
        if attempt.success {
            self.successful_provider = Some(attempt.provider.clone());
            self.overall_success = true;
        }
        self.attempts.push(attempt);
    }

    pub fn failed_attempts_count(&self) -> usize {
        self.attempts.iter().filter(|a| !a.success).count()
    }

    /// Providers in the order they were attempted
    pub fn attempted_providers(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.provider.as_str()).collect()
    }
}

/// Provider fallback orchestrator.
///
/// Holds the process-wide provider state (registry flags, breaker counters,
/// rate windows). Construct one per process and share it behind an `Arc`.
pub struct FallbackOrchestrator {
    registry: Arc<ProviderRegistry>,
    breaker: Arc<CircuitBreaker>,
    limiter: RateLimiter,
    credentials: Arc<dyn CredentialResolver>,
}

impl FallbackOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breaker: Arc<CircuitBreaker>,
        limiter: RateLimiter,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            registry,
            breaker,
            limiter,
            credentials,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run the cascade. Fails only when every eligible provider failed, or
    /// pre-flight when no provider has credentials.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        messages: &[CanonicalMessage],
        options: &CompletionOptions,
    ) -> CascadeResult<(GatewayResult, FallbackExecutionLog)> {
        let start_time = Instant::now();
        let order: Vec<(&RegistryEntry, Option<String>)> = self
            .registry
            .ordered(options.prefer_provider.as_deref())
            .into_iter()
            .map(|entry| {
                let key = self.credentials.resolve(entry.descriptor(), ctx);
                (entry, key)
            })
            .collect();

        if order.iter().all(|(_, key)| key.is_none()) {
            error!(request_id = ctx.request_id(), "No provider has credentials configured");
            return Err(CascadeError::NoCredentials);
        }

        let mut log = FallbackExecutionLog::new();
        let mut failures = Vec::new();
        let mut attempted = 0usize;

        for (entry, key) in order {
            let name = entry.name();
            if options.is_excluded(name) {
                debug!(provider = name, "Skipping provider that fast-failed earlier in this request");
                failures.push(ProviderFailure::skipped(
                    name,
                    FailureKind::RateLimited,
                    "already fast-failed in this request",
                ));
                continue;
            }
            let Some(api_key) = key else {
                debug!(provider = name, "Skipping provider without credentials");
                failures.push(ProviderFailure::skipped(
                    name,
                    FailureKind::Authentication,
                    "no API key configured",
                ));
                continue;
            };
            if let Some(skip) = self.admission_failure(entry) {
                failures.push(skip);
                continue;
            }

            attempted += 1;
            info!(
                provider = name,
                attempt = attempted,
                request_id = ctx.request_id(),
                "Attempting provider"
            );
            let attempt_start = Instant::now();

            match self.attempt(entry, messages, options, &api_key).await {
                Ok(mut result) => {
                    let duration_ms = attempt_start.elapsed().as_millis() as u64;
                    self.breaker.record_success(name);
                    info!(provider = name, duration_ms, "Provider succeeded");
                    log.add_attempt(FallbackAttempt::success(name, duration_ms));
                    result.metadata = GatewayMetadata {
                        execution_time_ms: start_time.elapsed().as_millis() as u64,
                        request_id: ctx.request_id().to_string(),
                        fallback_attempt: attempted,
                    };
                    return Ok((result, log));
                }
                Err(err) => {
                    let duration_ms = attempt_start.elapsed().as_millis() as u64;
                    let failure = self.record_attempt_failure(name, &err);
                    log.add_attempt(FallbackAttempt::failure(
                        name,
                        failure.kind,
                        &failure.message,
                        duration_ms,
                    ));
                    failures.push(failure);
                }
            }
        }

        error!(
            request_id = ctx.request_id(),
            attempted,
            "All providers in the cascade failed"
        );
        Err(CascadeError::AllProvidersExhausted { failures })
    }

    /// Exactly one attempt against a named provider, through the same
    /// breaker, rate-limit, and credential gates as the cascade.
    pub async fn execute_single(
        &self,
        ctx: &RequestContext,
        provider: &str,
        messages: &[CanonicalMessage],
        options: &CompletionOptions,
    ) -> CascadeResult<GatewayResult> {
        let entry = self
            .registry
            .get(provider)
            .ok_or_else(|| CascadeError::UnknownProvider(provider.to_string()))?;
        if options.is_excluded(provider) {
            return Err(CascadeError::AllProvidersExhausted {
                failures: vec![ProviderFailure::skipped(
                    provider,
                    FailureKind::RateLimited,
                    "already fast-failed in this request",
                )],
            });
        }
        let Some(api_key) = self.credentials.resolve(entry.descriptor(), ctx) else {
            return Err(CascadeError::NoCredentials);
        };
        if let Some(skip) = self.admission_failure(entry) {
            return Err(CascadeError::AllProvidersExhausted {
                failures: vec![skip],
            });
        }

        let start_time = Instant::now();
        match self.attempt(entry, messages, options, &api_key).await {
            Ok(mut result) => {
                self.breaker.record_success(provider);
                result.metadata = GatewayMetadata {
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                    request_id: ctx.request_id().to_string(),
                    fallback_attempt: 1,
                };
                Ok(result)
            }
            Err(err) => Err(CascadeError::AllProvidersExhausted {
                failures: vec![self.record_attempt_failure(provider, &err)],
            }),
        }
    }

    /// Gates checked before spending a network call on a provider.
    fn admission_failure(&self, entry: &RegistryEntry) -> Option<ProviderFailure> {
        let name = entry.name();
        if !self.registry.is_available(name) {
            debug!(provider = name, "Skipping provider marked unavailable");
            return Some(ProviderFailure::skipped(
                name,
                FailureKind::TokenExhausted,
                "marked unavailable after token exhaustion",
            ));
        }
        if !self.breaker.is_available(name) {
            debug!(provider = name, "Skipping provider with open circuit");
            return Some(ProviderFailure::skipped(
                name,
                FailureKind::ServiceUnavailable,
                "circuit breaker open",
            ));
        }
        if !self
            .limiter
            .try_acquire(name, entry.descriptor().rate_limit_per_minute)
        {
            debug!(provider = name, "Skipping provider at its local rate limit");
            return Some(ProviderFailure::skipped(
                name,
                FailureKind::RateLimited,
                "local rate limit reached",
            ));
        }
        None
    }

    /// One call under the provider's hard timeout. A 2xx without usable
    /// content is a failure like any other.
    async fn attempt(
        &self,
        entry: &RegistryEntry,
        messages: &[CanonicalMessage],
        options: &CompletionOptions,
        api_key: &str,
    ) -> LlmResult<GatewayResult> {
        let descriptor = entry.descriptor();
        let call = entry.provider().complete(messages, options, api_key);
        match tokio::time::timeout(descriptor.timeout(), call).await {
            Ok(Ok(result)) if result.is_usable() => Ok(result),
            Ok(Ok(_)) => Err(LlmError::malformed(format!(
                "{} returned neither content nor tool calls",
                descriptor.name
            ))),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: descriptor.timeout_ms,
            }),
        }
    }

    fn record_attempt_failure(&self, provider: &str, err: &LlmError) -> ProviderFailure {
        let kind = err.kind();
        warn!(provider, kind = %kind, error = %err, "Provider failed");
        self.breaker.record_failure(provider);
        if kind == FailureKind::TokenExhausted {
            self.registry.mark_unavailable(provider);
        }
        if kind.is_fast_fail() {
            debug!(provider, "Fast-fail: moving to next provider without retry");
        }
        ProviderFailure {
            provider: provider.to_string(),
            kind,
            message: err.to_string(),
            attempted: true,
        }
    }
}
