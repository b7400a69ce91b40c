//! Gemini-style Provider
//!
//! Codec and provider for Google's `generateContent` API. Responses carry
//! `candidates[0].content.parts`: text parts are concatenated into `content`
//! and each `functionCall` part becomes a synthetic tool call with a generated
//! id and JSON-stringified arguments.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::provider::{capped_tools, LlmProvider};
use super::types::{
    CanonicalMessage, CompletionOptions, GatewayResult, LlmError, LlmResult, ProviderDescriptor,
    Role, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};
use crate::http_client::post_json;

/// Gemini provider
pub struct GeminiProvider {
    descriptor: ProviderDescriptor,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new provider sharing the given HTTP client
    pub fn new(descriptor: ProviderDescriptor, client: reqwest::Client) -> Self {
        Self { descriptor, client }
    }
}

/// Build the `generateContent` request body
pub fn build_request(
    descriptor: &ProviderDescriptor,
    messages: &[CanonicalMessage],
    options: &CompletionOptions,
) -> serde_json::Value {
    let system_text: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System && !m.content.is_empty())
        .map(|m| m.content.as_str())
        .collect();

    let mut contents: Vec<serde_json::Value> = Vec::new();
    let mut previous_was_tool = false;

    for msg in messages.iter().filter(|m| m.role != Role::System) {
        if msg.role == Role::Tool {
            let part = function_response_part(msg);
            // Consecutive tool results answer one model turn and share one content entry.
            if previous_was_tool {
                if let Some(parts) = contents
                    .last_mut()
                    .and_then(|c| c.get_mut("parts"))
                    .and_then(|p| p.as_array_mut())
                {
                    parts.push(part);
                    continue;
                }
            }
            contents.push(serde_json::json!({ "role": "user", "parts": [part] }));
            previous_was_tool = true;
            continue;
        }
        previous_was_tool = false;
        contents.push(message_to_gemini(msg));
    }

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "temperature": descriptor.effective_temperature(options.temperature),
            "maxOutputTokens": descriptor.effective_max_tokens(options.max_tokens),
        }
    });

    if !system_text.is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": system_text.join("\n\n") }]
        });
    }

    let tools = capped_tools(descriptor, options.effective_tools());
    if !tools.is_empty() {
        let declarations: Vec<serde_json::Value> = tools.iter().map(tool_to_gemini).collect();
        body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        if matches!(options.tool_call_mode, ToolCallMode::Required) {
            body["toolConfig"] = serde_json::json!({
                "functionCallingConfig": { "mode": "ANY" }
            });
        }
    }

    body
}

fn message_to_gemini(msg: &CanonicalMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::Assistant => "model",
        _ => "user",
    };

    let mut parts: Vec<serde_json::Value> = Vec::new();
    if !msg.content.is_empty() {
        parts.push(serde_json::json!({ "text": msg.content }));
    }
    for img in &msg.images {
        parts.push(serde_json::json!({
            "inline_data": { "mime_type": img.media_type, "data": img.data }
        }));
    }
    for call in msg.tool_calls.iter().flatten() {
        parts.push(serde_json::json!({
            "functionCall": { "name": call.name(), "args": arguments_object(call) }
        }));
    }
    if parts.is_empty() {
        parts.push(serde_json::json!({ "text": "" }));
    }

    serde_json::json!({ "role": role, "parts": parts })
}

/// Gemini wants arguments as an object; malformed text degrades to `{}`.
fn arguments_object(call: &ToolCall) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(call.arguments()) {
        Ok(v @ serde_json::Value::Object(_)) => v,
        _ => serde_json::json!({}),
    }
}

fn function_response_part(msg: &CanonicalMessage) -> serde_json::Value {
    let response = match serde_json::from_str::<serde_json::Value>(&msg.content) {
        Ok(v @ serde_json::Value::Object(_)) => v,
        Ok(other) => serde_json::json!({ "content": other }),
        Err(_) => serde_json::json!({ "content": msg.content }),
    };
    serde_json::json!({
        "functionResponse": {
            "name": msg.name.clone().unwrap_or_default(),
            "response": response,
        }
    })
}

/// Convert a ToolDefinition to a Gemini function declaration
///
/// Gemini rejects OBJECT schemas with no properties, so parameterless tools
/// omit `parameters` entirely.
fn tool_to_gemini(tool: &ToolDefinition) -> serde_json::Value {
    let mut decl = serde_json::json!({
        "name": tool.name,
        "description": tool.description,
    });
    let has_properties = tool
        .input_schema
        .properties
        .as_ref()
        .map_or(false, |p| !p.is_empty());
    if has_properties {
        decl["parameters"] = serde_json::json!(tool.input_schema);
    }
    decl
}

/// Parse a `generateContent` response body
pub fn parse_response(descriptor: &ProviderDescriptor, body: &str) -> LlmResult<GatewayResult> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::malformed(format!("{}: {}", descriptor.name, e)))?;

    let candidate = match response.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::malformed(format!("{}: {}", descriptor.name, reason)));
        }
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(fc) = part.function_call {
            let arguments = match fc.args {
                None | Some(serde_json::Value::Null) => "{}".to_string(),
                Some(args) => args.to_string(),
            };
            tool_calls.push(ToolCall::generated(fc.name, arguments));
        }
    }

    let stop_reason = if !tool_calls.is_empty() {
        StopReason::ToolUse
    } else {
        candidate
            .finish_reason
            .as_deref()
            .map(StopReason::from)
            .unwrap_or_default()
    };

    let usage = response
        .usage_metadata
        .map(|u| UsageStats {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let result = GatewayResult {
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        provider: descriptor.name.clone(),
        model: response
            .model_version
            .unwrap_or_else(|| descriptor.model.clone()),
        stop_reason,
        usage,
        metadata: Default::default(),
    };

    if !result.is_usable() {
        warn!(provider = %descriptor.name, "Gemini candidate carried no text or function call");
        return Err(LlmError::malformed(format!(
            "{}: candidate has neither text nor functionCall parts",
            descriptor.name
        )));
    }
    Ok(result)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
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

/// Gemini API response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCallPart>,
}

#[derive(Debug, Deserialize)]
struct FunctionCallPart {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthStyle, ImageAttachment, ParameterSchema, WireFormat};
    use std::collections::HashMap;

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new(
            "gemini",
            WireFormat::Gemini,
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent",
            "gemini-2.0-flash",
            1,
        )
        .with_auth(AuthStyle::Header("x-goog-api-key".to_string()))
    }

    #[test]
    fn test_function_call_normalizes_to_tool_call() {
        let body = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"get_mining_stats","args":{}}}]}}]}"#;
        let result = parse_response(&descriptor(), body).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].function.name, "get_mining_stats");
        assert_eq!(result.tool_calls[0].function.arguments, "{}");
        assert_eq!(result.tool_calls[0].call_type, "function");
        assert!(!result.tool_calls[0].id.is_empty());
        assert!(result.content.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["toolCalls"][0]["function"]["name"], "get_mining_stats");
        assert_eq!(json["toolCalls"][0]["function"]["arguments"], "{}");
    }

    #[test]
    fn test_text_parts_are_concatenated() {
        let body = r#"{
            "candidates":[{"content":{"role":"model","parts":[{"text":"Hash"},{"text":"rate ok"}]},"finishReason":"STOP"}],
            "usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":3},
            "modelVersion":"gemini-2.0-flash-001"
        }"#;
        let result = parse_response(&descriptor(), body).unwrap();
        assert_eq!(result.content.as_deref(), Some("Hashrate ok"));
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.usage.input_tokens, 7);
        assert_eq!(result.model, "gemini-2.0-flash-001");
    }

    #[test]
    fn test_multiple_function_calls_get_distinct_ids() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"functionCall":{"name":"a","args":{"x":1}}},
            {"functionCall":{"name":"b"}}
        ]}}]}"#;
        let result = parse_response(&descriptor(), body).unwrap();
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].arguments(), r#"{"x":1}"#);
        assert_eq!(result.tool_calls[1].arguments(), "{}");
        assert_ne!(result.tool_calls[0].id, result.tool_calls[1].id);
    }

    #[test]
    fn test_blocked_prompt_is_malformed() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        match parse_response(&descriptor(), body).unwrap_err() {
            LlmError::MalformedResponse { message } => assert!(message.contains("SAFETY")),
            other => panic!("unexpected {:?}", other),
        }

        let body = r#"{"candidates":[{"content":{"parts":[]},"finishReason":"MAX_TOKENS"}]}"#;
        assert!(matches!(
            parse_response(&descriptor(), body).unwrap_err(),
            LlmError::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_build_request_shape() {
        let messages = vec![
            CanonicalMessage::system("You are the CFO."),
            CanonicalMessage::user("show mining stats"),
            CanonicalMessage::assistant_tool_calls(
                "",
                vec![
                    ToolCall::new("c1", "get_mining_stats", "{}"),
                    ToolCall::new("c2", "get_system_status", "not json"),
                ],
            ),
            CanonicalMessage::tool_result("c1", "get_mining_stats", r#"{"hashrate":120}"#),
            CanonicalMessage::tool_result("c2", "get_system_status", "all green"),
        ];
        let body = build_request(&descriptor(), &messages, &CompletionOptions::default());

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are the CFO.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_mining_stats");
        assert_eq!(contents[1]["parts"][1]["functionCall"]["args"], serde_json::json!({}));

        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["functionResponse"]["response"]["hashrate"], 120);
        assert_eq!(responses[1]["functionResponse"]["response"]["content"], "all green");

        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_build_request_tools_and_images() {
        let mut props = HashMap::new();
        props.insert("code".to_string(), ParameterSchema::string(Some("Python code")));
        let tools = vec![
            ToolDefinition {
                name: "execute_python".into(),
                description: "Run Python".into(),
                input_schema: ParameterSchema::object(None, props, vec!["code".into()]),
            },
            ToolDefinition {
                name: "list_agents".into(),
                description: "List agents".into(),
                input_schema: ParameterSchema::empty_object(),
            },
        ];
        let img = ImageAttachment::from_data_uri("data:image/png;base64,QUJD").unwrap();
        let messages = vec![CanonicalMessage::user("look").with_images(vec![img])];
        let options = CompletionOptions::default().with_tools(tools);

        let body = build_request(&descriptor(), &messages, &options);
        let decls = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0]["parameters"]["required"][0], "code");
        assert!(decls[1].get("parameters").is_none());

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
    }
}
