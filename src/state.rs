//! Application State
//!
//! Process-wide services shared by every request: the provider registry,
//! circuit breaker and rate windows behind the orchestrator, the validated
//! tool registry, and the chat pipeline. Built once at startup; tests build
//! their own with mock providers and tools.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use suite_gateway_core::{CoreError, CoreResult, SharedClock, SystemClock};
use suite_gateway_llm::{build_http_client, build_provider, LlmProvider};
use suite_gateway_tools::ToolRegistry;

use crate::config::GatewayConfig;
use crate::services::chat::{ChatPipeline, ContextEnricher};
use crate::services::fallback::{
    CircuitBreaker, CredentialResolver, EnvCredentialResolver, FallbackOrchestrator,
    ProviderRegistry, RateLimiter,
};
use crate::services::synthesis::{default_emergency_rules, EmergencyFallback, ResultSynthesizer};
use crate::services::tools::{
    default_intent_rules, default_routes, register_routes, AuditSink, HttpAuditSink,
    HttpServiceRouter, ServiceRouter, ToolCallExtractor, ToolExecutor, TracingAuditSink,
    UnroutedServices,
};

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub pipeline: Arc<ChatPipeline>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the pipeline from already-built collaborators.
    pub fn assemble(
        config: GatewayConfig,
        providers: Vec<Arc<dyn LlmProvider>>,
        tools: ToolRegistry,
        audit: Arc<dyn AuditSink>,
        credentials: Arc<dyn CredentialResolver>,
        clock: SharedClock,
    ) -> Self {
        let reset_window = chrono::Duration::seconds(config.breaker.reset_window_secs as i64);
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker.failure_threshold,
            reset_window,
            clock.clone(),
        ));
        let registry = Arc::new(ProviderRegistry::new(providers, clock.clone(), reset_window));
        let orchestrator = Arc::new(FallbackOrchestrator::new(
            registry,
            breaker,
            RateLimiter::new(clock),
            credentials,
        ));

        let tools = Arc::new(tools);
        let executor = Arc::new(ToolExecutor::new(
            tools.clone(),
            audit,
            Duration::from_millis(config.pipeline.tool_timeout_ms),
        ));
        let extractor = ToolCallExtractor::new(tools.names(), default_intent_rules());
        let enricher =
            ContextEnricher::new(config.executives.clone(), config.pipeline.history_limit);
        let synthesizer = ResultSynthesizer::new(
            orchestrator.clone(),
            config.pipeline.synthesis_max_tokens,
            Duration::from_millis(config.pipeline.synthesis_timeout_ms),
        );
        let emergency = EmergencyFallback::new(executor.clone(), default_emergency_rules());

        let pipeline = ChatPipeline::new(
            orchestrator,
            executor,
            extractor,
            enricher,
            synthesizer,
            emergency,
            config.pipeline.clone(),
            Duration::from_millis(config.server.request_timeout_ms),
        );

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Production wiring: HTTP providers, routed tools, configured audit sink.
    pub fn from_config(config: GatewayConfig) -> CoreResult<Self> {
        config.validate()?;

        let client = build_http_client(config.services.proxy.as_deref())
            .map_err(|e| CoreError::config(e.to_string()))?;

        let providers: Vec<Arc<dyn LlmProvider>> = config
            .providers
            .iter()
            .cloned()
            .map(|descriptor| build_provider(descriptor, client.clone()))
            .collect();

        let service_key = config
            .services
            .service_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.trim().is_empty());

        let router: Arc<dyn ServiceRouter> = match config.services.base_url.as_deref() {
            Some(base_url) => Arc::new(HttpServiceRouter::new(
                client.clone(),
                base_url,
                service_key.clone(),
                Duration::from_millis(config.pipeline.tool_timeout_ms),
            )),
            None => {
                warn!("services.base_url is not set; every tool call will fail");
                Arc::new(UnroutedServices)
            }
        };

        let routes = if config.services.routes.is_empty() {
            default_routes()
        } else {
            config.services.routes.clone()
        };
        let mut tools = ToolRegistry::new();
        register_routes(&mut tools, &routes, router)
            .map_err(|e| CoreError::config(e.to_string()))?;

        let emergency_rules = default_emergency_rules();
        tools
            .require(
                emergency_rules.iter().map(|r| r.tool.as_str()),
                "emergency fallback",
            )
            .map_err(|e| CoreError::config(e.to_string()))?;

        let audit: Arc<dyn AuditSink> = match config.services.audit_endpoint.as_deref() {
            Some(endpoint) => Arc::new(HttpAuditSink::new(client, endpoint, service_key)),
            None => Arc::new(TracingAuditSink),
        };

        info!(
            providers = config.providers.len(),
            tools = tools.len(),
            executives = config.executives.len(),
            "Gateway state initialized"
        );

        Ok(Self::assemble(
            config,
            providers,
            tools,
            audit,
            Arc::new(EnvCredentialResolver),
            Arc::new(SystemClock),
        ))
    }
}
