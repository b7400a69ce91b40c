//! Gateway Configuration
//!
//! `GatewayConfig` is loaded once at startup from a TOML file. Every field has
//! a serde default so a partial (or missing) file still yields a runnable
//! gateway; `validate()` rejects configurations the cascade cannot run with.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use suite_gateway_core::{CoreError, CoreResult};
use suite_gateway_llm::types::{AuthStyle, ProviderDescriptor, WireFormat};

use crate::services::tools::router::ToolRoute;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SUITE_GATEWAY_CONFIG";
/// Config file used when `SUITE_GATEWAY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderDescriptor>,
    #[serde(default = "default_executives")]
    pub executives: Vec<ExecutiveConfig>,
    #[serde(default)]
    pub services: ServicesSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            breaker: BreakerSettings::default(),
            pipeline: PipelineSettings::default(),
            providers: default_providers(),
            executives: default_executives(),
            services: ServicesSettings::default(),
        }
    }
}

/// HTTP listener and outer request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for one whole chat request, cascade and tools included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    55_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_window_secs() -> u64 {
    300
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_window_secs: default_reset_window_secs(),
        }
    }
}

/// Agentic loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Model turns allowed per request (tool round trips included)
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    #[serde(default = "default_synthesis_timeout_ms")]
    pub synthesis_timeout_ms: u64,
    /// Hard timeout for one tool dispatch
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    /// Conversation history turns kept when building the prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Executive used by `POST /chat`
    #[serde(default = "default_executive")]
    pub default_executive: String,
    /// Answer from tools directly when every provider fails
    #[serde(default = "default_true")]
    pub emergency_fallback: bool,
}

fn default_max_tool_iterations() -> usize {
    5
}

fn default_synthesis_max_tokens() -> u32 {
    1024
}

fn default_synthesis_timeout_ms() -> u64 {
    20_000
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

fn default_history_limit() -> usize {
    20
}

fn default_executive() -> String {
    "cso".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            synthesis_timeout_ms: default_synthesis_timeout_ms(),
            tool_timeout_ms: default_tool_timeout_ms(),
            history_limit: default_history_limit(),
            default_executive: default_executive(),
            emergency_fallback: true,
        }
    }
}

/// One executive persona served by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveConfig {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub persona: String,
    /// Provider moved to the front of the cascade for this executive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_provider: Option<String>,
}

impl ExecutiveConfig {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            persona: String::new(),
            prefer_provider: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_prefer_provider(mut self, provider: impl Into<String>) -> Self {
        self.prefer_provider = Some(provider.into());
        self
    }
}

/// Downstream collaborators: tool routing and audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesSettings {
    /// Base URL of the tool-routing service, e.g. `https://x.functions.example/v1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the service key sent to routed services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key_env: Option<String>,
    /// Where audit records are POSTed. Unset logs them instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_endpoint: Option<String>,
    /// Proxy for all outbound HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Tool routing table. Empty uses the built-in routes.
    #[serde(default)]
    pub routes: Vec<ToolRoute>,
}

fn default_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::new(
            "gemini",
            WireFormat::Gemini,
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent",
            "gemini-2.0-flash",
            1,
        )
        .with_timeout_ms(15_000)
        .with_api_key_env("GEMINI_API_KEY")
        .with_auth(AuthStyle::Header("x-goog-api-key".to_string())),
        ProviderDescriptor::new(
            "deepseek",
            WireFormat::OpenAI,
            "https://api.deepseek.com/chat/completions",
            "deepseek-chat",
            2,
        )
        .with_timeout_ms(20_000)
        .with_api_key_env("DEEPSEEK_API_KEY"),
        ProviderDescriptor::new(
            "openrouter",
            WireFormat::OpenAI,
            "https://openrouter.ai/api/v1/chat/completions",
            "meta-llama/llama-3.3-70b-instruct",
            3,
        )
        .with_timeout_ms(25_000)
        .with_api_key_env("OPENROUTER_API_KEY")
        .with_max_tools(64),
        ProviderDescriptor::new(
            "kimi",
            WireFormat::OpenAI,
            "https://api.moonshot.ai/v1/chat/completions",
            "kimi-k2-0711-preview",
            4,
        )
        .with_timeout_ms(25_000)
        .with_api_key_env("KIMI_API_KEY")
        .with_max_tools(128),
    ]
}

fn default_executives() -> Vec<ExecutiveConfig> {
    vec![
        ExecutiveConfig::new("cso", "Chief Strategy Officer").with_persona(
            "You coordinate the suite: you answer general questions, summarize mining and \
             agent activity, and delegate work to agents through tasks.",
        ),
        ExecutiveConfig::new("cto", "Chief Technology Officer")
            .with_persona(
                "You own the technical stack: code, infrastructure health, and running \
                 analyses with execute_python.",
            )
            .with_prefer_provider("deepseek"),
        ExecutiveConfig::new("cio", "Chief Information Officer")
            .with_persona("You handle knowledge, documents, and image or data interpretation.")
            .with_prefer_provider("gemini"),
        ExecutiveConfig::new("cao", "Chief Analytics Officer").with_persona(
            "You analyze metrics: mining performance, task throughput, and trends.",
        ),
    ]
}

impl GatewayConfig {
    /// Load from `$SUITE_GATEWAY_CONFIG` (or `gateway.toml`), then apply
    /// `HOST`/`PORT` overrides and validate.
    pub fn load_from_env() -> CoreResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_env_overrides(
            std::env::var("HOST").ok().as_deref(),
            std::env::var("PORT").ok().as_deref(),
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> CoreResult<Self> {
        toml::from_str(raw).map_err(|e| CoreError::parse(format!("invalid gateway config: {}", e)))
    }

    /// Container-style `HOST`/`PORT` overrides.
    pub fn apply_env_overrides(&mut self, host: Option<&str>, port: Option<&str>) -> CoreResult<()> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| CoreError::config(format!("invalid PORT '{}': {}", port, e)))?;
        }
        Ok(())
    }

    /// Reject configurations the cascade cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.providers.is_empty() {
            return Err(CoreError::validation("at least one provider must be configured"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(CoreError::validation("provider name must not be empty"));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(CoreError::validation(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            if provider.timeout_ms == 0 {
                return Err(CoreError::validation(format!(
                    "provider '{}' has a zero timeout",
                    provider.name
                )));
            }
        }

        if self.server.request_timeout_ms == 0 {
            return Err(CoreError::validation("server.request_timeout_ms must be positive"));
        }
        if self.pipeline.max_tool_iterations == 0 {
            return Err(CoreError::validation("pipeline.max_tool_iterations must be positive"));
        }

        let mut executives = HashSet::new();
        for executive in &self.executives {
            if !executives.insert(executive.name.as_str()) {
                return Err(CoreError::validation(format!(
                    "duplicate executive '{}'",
                    executive.name
                )));
            }
            if let Some(preferred) = &executive.prefer_provider {
                if !seen.contains(preferred.as_str()) {
                    return Err(CoreError::validation(format!(
                        "executive '{}' prefers unknown provider '{}'",
                        executive.name, preferred
                    )));
                }
            }
        }
        if !executives.contains(self.pipeline.default_executive.as_str()) {
            return Err(CoreError::validation(format!(
                "default executive '{}' is not configured",
                self.pipeline.default_executive
            )));
        }

        Ok(())
    }

    pub fn executive(&self, name: &str) -> Option<&ExecutiveConfig> {
        self.executives.iter().find(|e| e.name == name)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
