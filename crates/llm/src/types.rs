//! LLM Types
//!
//! Provider-agnostic types for the gateway: the canonical message shape that every
//! codec converts to and from, provider descriptors, the final `GatewayResult`
//! envelope, and the provider error taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Provider descriptors
// ============================================================================

/// Request/response shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `choices[0].message.{content,tool_calls}`
    OpenAI,
    /// `candidates[0].content.parts`
    Gemini,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self::OpenAI
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::OpenAI => write!(f, "openai"),
            WireFormat::Gemini => write!(f, "gemini"),
        }
    }
}

/// How the API key is attached to outbound requests.
///
/// Serialized as `"bearer"`, `"header:<name>"` or `"query:<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// A named header carrying the raw key (e.g. `x-goog-api-key`)
    Header(String),
    /// A query-string parameter carrying the key (e.g. `?key=`)
    Query(String),
}

impl Default for AuthStyle {
    fn default() -> Self {
        Self::Bearer
    }
}

impl TryFrom<String> for AuthStyle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("bearer") {
            return Ok(AuthStyle::Bearer);
        }
        match trimmed.split_once(':') {
            Some((kind, name)) if !name.trim().is_empty() => {
                match kind.trim().to_lowercase().as_str() {
                    "header" => Ok(AuthStyle::Header(name.trim().to_string())),
                    "query" => Ok(AuthStyle::Query(name.trim().to_string())),
                    other => Err(format!("unknown auth style '{}'", other)),
                }
            }
            _ => Err(format!(
                "invalid auth style '{}': expected bearer, header:<name> or query:<name>",
                value
            )),
        }
    }
}

impl From<AuthStyle> for String {
    fn from(style: AuthStyle) -> String {
        match style {
            AuthStyle::Bearer => "bearer".to_string(),
            AuthStyle::Header(name) => format!("header:{}", name),
            AuthStyle::Query(name) => format!("query:{}", name),
        }
    }
}

/// Static description of one AI backend.
///
/// Immutable for the life of the process; the registry tracks the mutable
/// `available` flag separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name (e.g. "gemini", "deepseek")
    pub name: String,
    /// Wire format used by the codec
    #[serde(default)]
    pub wire: WireFormat,
    /// Completion endpoint. Gemini endpoints may contain `{model}`.
    pub endpoint: String,
    /// Model identifier sent to the provider
    pub model: String,
    /// Lower is tried first
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Hard timeout for one call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Requests allowed per rolling minute (process-local). None = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// How the key is attached
    #[serde(default)]
    pub auth: AuthStyle,
    /// Maximum number of tool definitions the provider accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tools: Option<usize>,
    /// Hard cap on requested output tokens
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,
    /// Output tokens requested when the caller does not say
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    /// Temperature used when the caller does not say
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    /// Extra static headers (e.g. attribution headers some gateways require)
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_priority() -> u32 {
    100
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_tokens_cap() -> u32 {
    8192
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderDescriptor {
    /// Minimal descriptor with defaults for everything optional.
    pub fn new(
        name: impl Into<String>,
        wire: WireFormat,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            wire,
            endpoint: endpoint.into(),
            model: model.into(),
            priority,
            timeout_ms: default_timeout_ms(),
            rate_limit_per_minute: None,
            api_key_env: None,
            auth: AuthStyle::default(),
            max_tools: None,
            max_tokens_cap: default_max_tokens_cap(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            extra_headers: HashMap::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_api_key_env(mut self, env: impl Into<String>) -> Self {
        self.api_key_env = Some(env.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthStyle) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_max_tools(mut self, max_tools: usize) -> Self {
        self.max_tools = Some(max_tools);
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = Some(per_minute);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Endpoint with `{model}` substituted.
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint.replace("{model}", &self.model)
    }

    /// Effective max tokens for a request, respecting the hard cap.
    pub fn effective_max_tokens(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_tokens)
            .min(self.max_tokens_cap)
            .max(1)
    }

    /// Effective temperature, clamped to the range every provider accepts.
    pub fn effective_temperature(&self, requested: Option<f32>) -> f32 {
        requested
            .unwrap_or(self.default_temperature)
            .clamp(0.0, 2.0)
    }
}

// ============================================================================
// Canonical messages
// ============================================================================

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Base64 image attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

impl ImageAttachment {
    /// Parse `data:<media>;base64,<payload>`.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("data:")?;
        let (meta, data) = rest.split_once(',')?;
        let media_type = meta.strip_suffix(";base64")?;
        if media_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(Self {
            media_type: media_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Provider-agnostic conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Tool calls made by an assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For `Role::Tool`: the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `Role::Tool`: the tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

impl CanonicalMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            images: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested tools.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::text(Role::Assistant, content)
        }
    }

    /// Result of one tool call, fed back to the model.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::text(Role::Tool, content)
        }
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map_or(false, |c| !c.is_empty())
    }
}

// ============================================================================
// Tools
// ============================================================================

/// JSON Schema for tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    fn scalar(schema_type: &str, description: Option<&str>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
            enum_values: None,
        }
    }

    /// Create a string schema
    pub fn string(description: Option<&str>) -> Self {
        Self::scalar("string", description)
    }

    /// Create an integer schema
    pub fn integer(description: Option<&str>) -> Self {
        Self::scalar("integer", description)
    }

    /// Create a number schema
    pub fn number(description: Option<&str>) -> Self {
        Self::scalar("number", description)
    }

    /// Create a boolean schema
    pub fn boolean(description: Option<&str>) -> Self {
        Self::scalar("boolean", description)
    }

    /// Create an object schema
    pub fn object(
        description: Option<&str>,
        properties: HashMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::scalar("object", description)
        }
    }

    /// Object schema with no parameters.
    pub fn empty_object() -> Self {
        Self::object(None, HashMap::new(), vec![])
    }

    /// Create an array schema
    pub fn array(description: Option<&str>, items: ParameterSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::scalar("array", description)
        }
    }

    /// Required property names, empty when none are declared.
    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }
}

/// Definition of a tool that can be called by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ParameterSchema,
}

/// Function name and raw argument text of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON text. Kept as text until the executor parses it, so malformed
    /// model output survives transport.
    #[serde(default)]
    pub arguments: String,
}

/// A tool call requested by the model, in OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// New call with a generated id.
    pub fn generated(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

/// `call_<32 hex>` id for synthetic tool calls.
pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Tool calling mode preference for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// Provider chooses when to call tools.
    Auto,
    /// Provider should require tool calls when tools are available.
    Required,
    /// Disable tool calling for this request.
    None,
}

impl Default for ToolCallMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Per-request options shared by every codec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Tools offered to the model
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_call_mode: ToolCallMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider to move to the front of the cascade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_provider: Option<String>,
    /// Providers the cascade must not call (already fast-failed in this request)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_providers: Vec<String>,
}

impl CompletionOptions {
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn prefer(mut self, provider: impl Into<String>) -> Self {
        self.prefer_provider = Some(provider.into());
        self
    }

    pub fn excluding(mut self, providers: impl IntoIterator<Item = String>) -> Self {
        self.exclude_providers.extend(providers);
        self
    }

    pub fn is_excluded(&self, provider: &str) -> bool {
        self.exclude_providers.iter().any(|p| p == provider)
    }

    /// Tools that should actually be sent (none when tool calling is disabled).
    pub fn effective_tools(&self) -> &[ToolDefinition] {
        if self.tool_call_mode == ToolCallMode::None {
            &[]
        } else {
            &self.tools
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Stop reason for the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    ContentFilter,
    Other(String),
}

impl Default for StopReason {
    fn default() -> Self {
        Self::EndTurn
    }
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            "safety" | "content_filter" | "recitation" | "blocklist" => StopReason::ContentFilter,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Bookkeeping attached by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMetadata {
    pub execution_time_ms: u64,
    pub request_id: String,
    /// 1-based position of the provider that answered within the cascade
    pub fallback_attempt: usize,
}

/// Normalized completion, identical for every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub stop_reason: StopReason,
    #[serde(default)]
    pub usage: UsageStats,
    #[serde(default)]
    pub metadata: GatewayMetadata,
}

impl GatewayResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Non-empty text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// A 2xx body with neither text nor tool calls is not usable.
    pub fn is_usable(&self) -> bool {
        self.text().is_some() || self.has_tool_calls()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Classification of a provider-local failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TokenExhausted,
    RateLimited,
    Timeout,
    ServiceUnavailable,
    MalformedResponse,
    Authentication,
    InvalidRequest,
    Network,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::TokenExhausted => "token_exhausted",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::ServiceUnavailable => "service_unavailable",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Authentication => "authentication",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Network => "network",
        };
        write!(f, "{}", s)
    }
}

impl FailureKind {
    /// Quota and rate signals: never retry the same provider in this cascade.
    pub fn is_fast_fail(&self) -> bool {
        matches!(self, FailureKind::TokenExhausted | FailureKind::RateLimited)
    }
}

/// Error types for provider operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Credits or token quota exhausted (HTTP 402)
    TokenExhausted { message: String },
    /// Rate limit exceeded (HTTP 429)
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    /// Call exceeded its hard timeout
    Timeout { timeout_ms: u64 },
    /// Server error from the provider (HTTP 5xx)
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// 2xx with no usable content or tool field
    MalformedResponse { message: String },
    /// Authentication failed (invalid API key)
    AuthenticationFailed { message: String },
    /// Invalid request (bad parameters, unknown model)
    InvalidRequest { message: String },
    /// Network/connection error
    NetworkError { message: String },
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::TokenExhausted { .. } => FailureKind::TokenExhausted,
            LlmError::RateLimited { .. } => FailureKind::RateLimited,
            LlmError::Timeout { .. } => FailureKind::Timeout,
            LlmError::ServerError { .. } => FailureKind::ServiceUnavailable,
            LlmError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            LlmError::AuthenticationFailed { .. } => FailureKind::Authentication,
            LlmError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            LlmError::NetworkError { .. } => FailureKind::Network,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        LlmError::MalformedResponse {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::TokenExhausted { message } => write!(f, "Token quota exhausted: {}", message),
            LlmError::RateLimited {
                message,
                retry_after: Some(secs),
            } => write!(f, "Rate limited: {} (retry after {}s)", message, secs),
            LlmError::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            LlmError::Timeout { timeout_ms } => write!(f, "Timed out after {}ms", timeout_ms),
            LlmError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            LlmError::MalformedResponse { message } => write!(f, "Malformed response: {}", message),
            LlmError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            LlmError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            LlmError::NetworkError { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Result type for provider operations
pub type LlmResult<T> = Result<T, LlmError>;
