//! Shared fixtures: scripted providers, recording tools, in-memory audit.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use suite_gateway::config::GatewayConfig;
use suite_gateway::services::fallback::CredentialResolver;
use suite_gateway::services::tools::{AuditRecord, AuditSink};
use suite_gateway::AppState;
use suite_gateway_core::{Identity, ManualClock, RequestContext, SharedClock};
use suite_gateway_llm::{
    CanonicalMessage, CompletionOptions, GatewayResult, LlmError, LlmProvider, LlmResult,
    ParameterSchema, ProviderDescriptor, ToolCall, WireFormat,
};
use suite_gateway_tools::{FunctionTool, ToolRegistry};

/// One recorded provider call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<CanonicalMessage>,
    pub options: CompletionOptions,
}

/// Provider that replays a script, then repeats its fallback reply.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    script: Mutex<VecDeque<LlmResult<GatewayResult>>>,
    fallback: Mutex<Option<LlmResult<GatewayResult>>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    order: Option<Arc<Mutex<Vec<String>>>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(name, WireFormat::OpenAI, "http://mock", format!("{}-model", name), priority),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            delay: None,
            calls: Mutex::new(Vec::new()),
            order: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.descriptor = self.descriptor.with_timeout_ms(timeout_ms);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append every attempt's provider name to a shared log.
    pub fn with_order_log(mut self, order: Arc<Mutex<Vec<String>>>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn then(self, reply: LlmResult<GatewayResult>) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn always(self, reply: LlmResult<GatewayResult>) -> Self {
        *self.fallback.lock().unwrap() = Some(reply);
        self
    }

    pub fn then_text(self, text: &str) -> Self {
        let reply = Ok(self.text(text));
        self.then(reply)
    }

    pub fn then_tools(self, calls: Vec<ToolCall>) -> Self {
        let reply = Ok(self.tools(calls));
        self.then(reply)
    }

    pub fn text(&self, text: &str) -> GatewayResult {
        self.result(Some(text.to_string()), Vec::new())
    }

    pub fn tools(&self, calls: Vec<ToolCall>) -> GatewayResult {
        self.result(None, calls)
    }

    pub fn result(&self, content: Option<String>, tool_calls: Vec<ToolCall>) -> GatewayResult {
        GatewayResult {
            content,
            tool_calls,
            provider: self.descriptor.name.clone(),
            model: self.descriptor.model.clone(),
            stop_reason: Default::default(),
            usage: Default::default(),
            metadata: Default::default(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn model(&self) -> &str {
        &self.descriptor.model
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn complete(
        &self,
        messages: &[CanonicalMessage],
        options: &CompletionOptions,
        _api_key: &str,
    ) -> LlmResult<GatewayResult> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.descriptor.name.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or_else(|| {
                Err(LlmError::ServerError {
                    message: "script exhausted".to_string(),
                    status: Some(500),
                })
            })
    }
}

pub fn quota() -> LlmError {
    LlmError::TokenExhausted {
        message: "insufficient credits".to_string(),
    }
}

pub fn rate_limited() -> LlmError {
    LlmError::RateLimited {
        message: "slow down".to_string(),
        retry_after: Some(30),
    }
}

pub fn server_error() -> LlmError {
    LlmError::ServerError {
        message: "upstream 502".to_string(),
        status: Some(502),
    }
}

/// Resolver that has a key for the listed providers only (all when empty).
pub struct StaticKeys(pub HashSet<String>);

impl StaticKeys {
    pub fn all() -> Arc<Self> {
        Arc::new(Self(HashSet::new()))
    }

    pub fn none() -> Arc<Self> {
        Arc::new(Self(["__nobody__".to_string()].into_iter().collect()))
    }
}

impl CredentialResolver for StaticKeys {
    fn resolve(&self, descriptor: &ProviderDescriptor, ctx: &RequestContext) -> Option<String> {
        if let Some(key) = ctx.session_credential(&descriptor.name) {
            return Some(key.to_string());
        }
        if self.0.is_empty() || self.0.contains(&descriptor.name) {
            Some("test-key".to_string())
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct MemoryAudit(pub Mutex<Vec<AuditRecord>>);

impl AuditSink for MemoryAudit {
    fn record(&self, record: AuditRecord) {
        self.0.lock().unwrap().push(record);
    }
}

/// Dashboard tools that append their name to `log` when invoked.
pub fn dashboard_tools(log: Arc<Mutex<Vec<String>>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let fixtures = [
        ("get_mining_stats", json!({"hashrate": 1500, "activeWorkers": 3})),
        ("get_system_status", json!({"status": "healthy", "services": 12})),
        ("list_agents", json!([{"name": "scout"}, {"name": "builder"}])),
        ("list_tasks", json!([{"title": "rotate keys"}])),
    ];
    for (name, output) in fixtures {
        let log = log.clone();
        registry
            .register(Arc::new(FunctionTool::new(
                name,
                format!("{} fixture", name),
                ParameterSchema::empty_object(),
                move |_ctx, _args| {
                    let log = log.clone();
                    let output = output.clone();
                    Box::pin(async move {
                        log.lock().unwrap().push(name.to_string());
                        Ok(output)
                    })
                },
            )))
            .unwrap();
    }

    let log_py = log.clone();
    registry
        .register(Arc::new(FunctionTool::new(
            "execute_python",
            "Run Python in a sandbox",
            ParameterSchema::object(
                None,
                [
                    ("code".to_string(), ParameterSchema::string(Some("source"))),
                    ("purpose".to_string(), ParameterSchema::string(Some("why"))),
                ]
                .into_iter()
                .collect::<HashMap<_, _>>(),
                vec!["code".to_string()],
            ),
            move |_ctx, args| {
                let log = log_py.clone();
                Box::pin(async move {
                    log.lock().unwrap().push("execute_python".to_string());
                    Ok(json!({"stdout": format!("ran {}", args["code"])}))
                })
            },
        )))
        .unwrap();
    registry
}

pub struct Harness {
    pub state: AppState,
    pub tool_log: Arc<Mutex<Vec<String>>>,
    pub audit: Arc<MemoryAudit>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.request_timeout_ms = 5_000;
    config.pipeline.tool_timeout_ms = 1_000;
    config.pipeline.synthesis_timeout_ms = 1_000;
    config
}

pub fn harness(providers: Vec<Arc<ScriptedProvider>>) -> Harness {
    harness_with(test_config(), providers, StaticKeys::all())
}

pub fn harness_with(
    config: GatewayConfig,
    providers: Vec<Arc<ScriptedProvider>>,
    credentials: Arc<dyn CredentialResolver>,
) -> Harness {
    let tool_log = Arc::new(Mutex::new(Vec::new()));
    let audit = Arc::new(MemoryAudit::default());
    let clock = Arc::new(ManualClock::starting_now());
    let providers: Vec<Arc<dyn LlmProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn LlmProvider>)
        .collect();
    let state = AppState::assemble(
        config,
        providers,
        dashboard_tools(tool_log.clone()),
        audit.clone(),
        credentials,
        clock.clone() as SharedClock,
    );
    Harness {
        state,
        tool_log,
        audit,
        clock,
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::new(Identity::new("cso"))
}

pub fn logged(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}
