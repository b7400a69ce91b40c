//! OpenAI-style Provider
//!
//! Codec and provider for every backend speaking the chat-completions shape
//! (OpenAI, DeepSeek, OpenRouter, Groq, Mistral, Kimi, ...).
//! Responses carry `choices[0].message.{content,tool_calls}` and pass through
//! nearly verbatim.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{capped_tools, LlmProvider};
use super::types::{
    generate_call_id, CanonicalMessage, CompletionOptions, GatewayResult, LlmError, LlmResult,
    ProviderDescriptor, Role, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};
use crate::http_client::post_json;

/// OpenAI-style provider
pub struct OpenAIProvider {
    descriptor: ProviderDescriptor,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new provider sharing the given HTTP client
    pub fn new(descriptor: ProviderDescriptor, client: reqwest::Client) -> Self {
        Self { descriptor, client }
    }
}

/// Build the request body for the API
pub fn build_request(
    descriptor: &ProviderDescriptor,
    messages: &[CanonicalMessage],
    options: &CompletionOptions,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": descriptor.model,
        "max_tokens": descriptor.effective_max_tokens(options.max_tokens),
        "temperature": descriptor.effective_temperature(options.temperature),
        "stream": false,
    });

    let openai_messages: Vec<serde_json::Value> = messages.iter().map(message_to_openai).collect();
    body["messages"] = serde_json::json!(openai_messages);

    let tools = capped_tools(descriptor, options.effective_tools());
    if !tools.is_empty() {
        let openai_tools: Vec<serde_json::Value> = tools.iter().map(tool_to_openai).collect();
        body["tools"] = serde_json::json!(openai_tools);
        if matches!(options.tool_call_mode, ToolCallMode::Required) {
            body["tool_choice"] = serde_json::json!("required");
        }
    }

    body
}

/// Convert a CanonicalMessage to OpenAI API format
fn message_to_openai(message: &CanonicalMessage) -> serde_json::Value {
    match message.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        Role::Assistant if message.has_tool_calls() => {
            let mut msg = serde_json::json!({
                "role": "assistant",
                "tool_calls": message.tool_calls,
            });
            // Some compatible APIs reject a missing content field on tool-call turns.
            msg["content"] = if message.content.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::json!(message.content)
            };
            msg
        }
        _ if !message.images.is_empty() => {
            let mut parts = vec![serde_json::json!({
                "type": "text",
                "text": message.content,
            })];
            parts.extend(message.images.iter().map(|img| {
                serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": img.to_data_uri() }
                })
            }));
            serde_json::json!({
                "role": message.role.to_string(),
                "content": parts,
            })
        }
        _ => serde_json::json!({
            "role": message.role.to_string(),
            "content": message.content,
        }),
    }
}

/// Convert a ToolDefinition to OpenAI API format
fn tool_to_openai(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema
        }
    })
}

/// Parse a response body from an OpenAI-style API
///
/// A 2xx body with neither text nor tool calls is a `MalformedResponse`.
pub fn parse_response(descriptor: &ProviderDescriptor, body: &str) -> LlmResult<GatewayResult> {
    let response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::malformed(format!("{}: {}", descriptor.name, e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::malformed(format!("{}: no choices in response", descriptor.name)))?;

    let mut content = None;
    let mut tool_calls = Vec::new();

    if let Some(msg) = choice.message {
        content = msg.content.and_then(content_to_text);
        for tc in msg.tool_calls.unwrap_or_default() {
            let arguments = match tc.function.arguments {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            let id = tc.id.filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id);
            tool_calls.push(ToolCall::new(id, tc.function.name, arguments));
        }
    }

    let stop_reason = choice
        .finish_reason
        .as_deref()
        .map(StopReason::from)
        .unwrap_or_default();

    let usage = response
        .usage
        .map(|u| UsageStats {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let result = GatewayResult {
        content,
        tool_calls,
        provider: descriptor.name.clone(),
        model: response.model.unwrap_or_else(|| descriptor.model.clone()),
        stop_reason,
        usage,
        metadata: Default::default(),
    };

    if !result.is_usable() {
        return Err(LlmError::malformed(format!(
            "{}: response has neither content nor tool calls",
            descriptor.name
        )));
    }
    Ok(result)
}

/// Content is usually a string; a few compatible APIs return text parts.
fn content_to_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(parts) => {
            let text: Vec<String> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()).map(String::from))
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(text.join(""))
            }
        }
        _ => None,
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
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
        api_key: &str,
    ) -> LlmResult<GatewayResult> {
        let body = build_request(&self.descriptor, messages, options);
        let text = post_json(&self.client, &self.descriptor, &body, api_key).await?;
        parse_response(&self.descriptor, &text)
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<serde_json::Value>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
