//! Prompt-Based Tool Calling Fallback
//!
//! Many providers accept tool definitions but emit the call as text instead of
//! a native `tool_calls` field. This module injects text-format tool calling
//! instructions into the system prompt and parses the calls models actually
//! produce:
//! - labeled code fences (```` ```tool_call ```` or ```` ```json ````)
//! - vendor delimiter tokens (DeepSeek `<｜tool▁call▁begin｜>`, Kimi
//!   `<|tool_call_begin|>`, Hermes/Qwen `<tool_call>` blocks)

use serde::{Deserialize, Serialize};
use tracing::warn;

use suite_gateway_llm::types::ToolDefinition;

/// A tool call parsed from the LLM's text response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedToolCall {
    /// The name of the tool to call
    pub tool_name: String,
    /// The arguments as JSON text
    pub arguments: String,
    /// The raw text block that was parsed
    pub raw_text: String,
}

/// Build the prompt-based tool calling instructions to inject into the system prompt.
///
/// This instructs the LLM to output tool calls in a specific parseable format.
pub fn build_tool_call_instructions(tools: &[ToolDefinition]) -> String {
    let mut tool_descriptions = String::new();

    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n", tool.name));
        tool_descriptions.push_str(&format!("{}\n", tool.description));

        if let Some(properties) = tool.input_schema.properties.as_ref() {
            if !properties.is_empty() {
                tool_descriptions.push_str("Parameters:\n");
                let required = tool.input_schema.required_names();
                let mut names: Vec<&String> = properties.keys().collect();
                names.sort();
                for name in names {
                    let schema = &properties[name];
                    let req_marker = if required.contains(name) {
                        " (required)"
                    } else {
                        " (optional)"
                    };
                    let desc = schema.description.as_deref().unwrap_or("");
                    tool_descriptions.push_str(&format!(
                        "  - `{}` ({}{}): {}\n",
                        name, schema.schema_type, req_marker, desc
                    ));
                }
            }
        }
        tool_descriptions.push('\n');
    }

    format!(
        r#"## Tool Calling

If native function calling is unavailable, request a tool by emitting a block in this EXACT format:

```tool_call
{{"tool": "tool_name", "arguments": {{"param1": "value1"}}}}
```

Rules:
- The block MUST start with ```tool_call and end with ```
- The JSON MUST be valid
- You can make multiple tool calls in a single response
- After making tool calls, STOP and WAIT for the real results before continuing
- NEVER invent tool results or say you "checked" something you did not call
- Only use tools from the list below

## Available Tools

{tool_descriptions}## Examples

Fetch mining statistics:
```tool_call
{{"tool": "get_mining_stats", "arguments": {{}}}}
```

Run a calculation:
```tool_call
{{"tool": "execute_python", "arguments": {{"code": "print(2 ** 10)", "purpose": "compute 2^10"}}}}
```

When you receive a tool result, analyze it and decide whether to call more tools or give your final answer."#,
        tool_descriptions = tool_descriptions,
    )
}

/// Parse fenced tool call blocks.
///
/// Accepts ```` ```tool_call ```` and ```` ```json ```` fences whose payload is a
/// call-shaped object (`{"tool"|"name": ..., "arguments"|"args"|"parameters": ...}`),
/// an array of such objects, or `{"tool_calls": [...]}`.
pub fn parse_fenced_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    // (offset of the fence, call) so mixed labels come back in text order
    let mut found: Vec<(usize, ParsedToolCall)> = Vec::new();

    for label in ["```tool_call", "```json"] {
        let mut cursor = 0;
        while let Some(relative) = text[cursor..].find(label) {
            let start = cursor + relative;
            let body_start = start + label.len();
            let Some(end) = text[body_start..].find("```") else {
                break;
            };
            let block_content = text[body_start..body_start + end].trim();
            let raw_text = format!("{}\n{}\n```", label, block_content);
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(block_content) {
                // A ```json fence is often plain data; only explicit call shapes count.
                let strict = label == "```json";
                for (tool_name, arguments) in call_shaped_objects(&json, strict) {
                    found.push((
                        start,
                        ParsedToolCall {
                            tool_name,
                            arguments,
                            raw_text: raw_text.clone(),
                        },
                    ));
                }
            }
            cursor = body_start + end + 3;
        }
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, call)| call).collect()
}

/// Parse vendor delimiter tokens.
///
/// Handles:
/// - DeepSeek: `<｜tool▁call▁begin｜>[function<｜tool▁sep｜>]name[<｜tool▁sep｜>]args<｜tool▁call▁end｜>`
/// - Kimi: `<|tool_call_begin|>functions.name:0<|tool_call_argument_begin|>args<|tool_call_end|>`
/// - Hermes/Qwen: `<tool_call>{"name": ..., "arguments": ...}</tool_call>`
///
/// Arguments that fail JSON parsing degrade to `{}` with a warning.
pub fn parse_delimited_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();

    for segment in segments(text, "<｜tool▁call▁begin｜>", "<｜tool▁call▁end｜>") {
        if let Some(call) = parse_deepseek_segment(segment) {
            calls.push(call);
        }
    }

    for segment in segments(text, "<|tool_call_begin|>", "<|tool_call_end|>") {
        if let Some(call) = parse_kimi_segment(segment) {
            calls.push(call);
        }
    }

    for segment in segments(text, "<tool_call>", "</tool_call>") {
        let raw_text = format!("<tool_call>{}</tool_call>", segment);
        match serde_json::from_str::<serde_json::Value>(segment.trim()) {
            Ok(json) => {
                for (tool_name, arguments) in call_shaped_objects(&json, false) {
                    calls.push(ParsedToolCall {
                        tool_name,
                        arguments,
                        raw_text: raw_text.clone(),
                    });
                }
            }
            Err(_) => {
                // `<tool_call>name {...}</tool_call>` or a bare name
                let trimmed = segment.trim();
                let (name, rest) = match trimmed.find(|c: char| c.is_whitespace() || c == '{') {
                    Some(idx) => (&trimmed[..idx], trimmed[idx..].trim()),
                    None => (trimmed, ""),
                };
                if is_tool_name(name) {
                    calls.push(ParsedToolCall {
                        tool_name: name.to_string(),
                        arguments: lenient_arguments(name, rest),
                        raw_text,
                    });
                }
            }
        }
    }

    calls
}

fn parse_deepseek_segment(segment: &str) -> Option<ParsedToolCall> {
    const SEP: &str = "<｜tool▁sep｜>";
    let raw_text = format!("<｜tool▁call▁begin｜>{}<｜tool▁call▁end｜>", segment);
    let parts: Vec<&str> = segment.split(SEP).collect();

    let (name, args) = match parts.as_slice() {
        // function<sep>name\n```json\n{...}\n```
        [kind, rest] if kind.trim() == "function" => {
            let rest = rest.trim_start();
            match rest.find('\n') {
                Some(nl) => (rest[..nl].trim(), rest[nl + 1..].trim()),
                None => (rest.trim(), ""),
            }
        }
        // name<sep>{...}
        [name, args] => (name.trim(), args.trim()),
        // function<sep>name<sep>{...}
        [kind, name, args] if kind.trim() == "function" => (name.trim(), args.trim()),
        _ => return None,
    };

    if !is_tool_name(name) {
        return None;
    }
    Some(ParsedToolCall {
        tool_name: name.to_string(),
        arguments: lenient_arguments(name, strip_json_fence(args)),
        raw_text,
    })
}

fn parse_kimi_segment(segment: &str) -> Option<ParsedToolCall> {
    const ARG: &str = "<|tool_call_argument_begin|>";
    let raw_text = format!("<|tool_call_begin|>{}<|tool_call_end|>", segment);
    let (id_part, args) = match segment.split_once(ARG) {
        Some((id, args)) => (id.trim(), args.trim()),
        None => (segment.trim(), ""),
    };
    // `functions.get_mining_stats:0` -> `get_mining_stats`
    let name = id_part.strip_prefix("functions.").unwrap_or(id_part);
    let name = name.rsplit_once(':').map(|(n, _)| n).unwrap_or(name);

    if !is_tool_name(name) {
        return None;
    }
    Some(ParsedToolCall {
        tool_name: name.to_string(),
        arguments: lenient_arguments(name, args),
        raw_text,
    })
}

/// Text between every `begin`/`end` pair. An unclosed final `begin` runs to the end.
fn segments<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut remaining = text;
    while let Some(start) = remaining.find(begin) {
        let after = &remaining[start + begin.len()..];
        match after.find(end) {
            Some(stop) => {
                out.push(&after[..stop]);
                remaining = &after[stop + end.len()..];
            }
            None => {
                // Stop at the next marker-looking token so trailing chatter is not swallowed.
                let stop = after.find("<｜").or_else(|| after.find("<|")).unwrap_or(after.len());
                let tail = after[..stop].trim();
                if !tail.is_empty() {
                    out.push(tail);
                }
                break;
            }
        }
    }
    out
}

fn strip_json_fence(args: &str) -> &str {
    let trimmed = args.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Valid JSON object text, or `{}` with a warning.
fn lenient_arguments(tool_name: &str, args: &str) -> String {
    let args = args.trim();
    if args.is_empty() {
        return "{}".to_string();
    }
    match serde_json::from_str::<serde_json::Value>(args) {
        Ok(v @ serde_json::Value::Object(_)) => v.to_string(),
        Ok(other) => {
            warn!(tool = %tool_name, arguments = %other, "Tool call arguments are not an object, using {{}}");
            "{}".to_string()
        }
        Err(e) => {
            warn!(tool = %tool_name, error = %e, "Unparseable tool call arguments, using {{}}");
            "{}".to_string()
        }
    }
}

const ARGUMENT_KEYS: &[&str] = &["arguments", "args", "parameters"];

fn is_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Extract `(name, arguments-json-text)` from call-shaped JSON.
///
/// In `strict` mode a bare `{"name": ...}` object is not enough: the object
/// must carry a `tool` key, an arguments key, or a nested `function`.
fn call_shaped_objects(json: &serde_json::Value, strict: bool) -> Vec<(String, String)> {
    match json {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| call_shaped_object(item, strict))
            .collect(),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::Array(items)) = map.get("tool_calls") {
                return items
                    .iter()
                    .filter_map(|item| call_shaped_object(item, false))
                    .collect();
            }
            call_shaped_object(json, strict).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn call_shaped_object(json: &serde_json::Value, strict: bool) -> Option<(String, String)> {
    // OpenAI shape nested under "function"
    let nested = json.get("function").filter(|f| f.is_object());
    let target = nested.unwrap_or(json);
    if strict
        && nested.is_none()
        && target.get("tool").is_none()
        && ARGUMENT_KEYS.iter().all(|k| target.get(*k).is_none())
    {
        return None;
    }
    let name = target
        .get("tool")
        .or_else(|| target.get("name"))
        .and_then(|v| v.as_str())?
        .trim();
    if !is_tool_name(name) {
        return None;
    }
    let arguments = match ARGUMENT_KEYS.iter().find_map(|k| target.get(*k)) {
        None | Some(serde_json::Value::Null) => "{}".to_string(),
        // Double-encoded arguments stay as text for the executor to parse.
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    Some((name.to_string(), arguments))
}

/// Extract text content with tool call blocks removed.
pub fn extract_text_without_tool_calls(text: &str) -> String {
    let mut cleaned = text.to_string();

    for call in parse_fenced_tool_calls(text)
        .into_iter()
        .chain(parse_delimited_tool_calls(text))
    {
        cleaned = cleaned.replacen(&call.raw_text, "", 1);
    }

    // Fences are normalized in raw_text; remove originals by marker too.
    for label in ["```tool_call"] {
        while let Some(start) = cleaned.find(label) {
            let after = &cleaned[start + label.len()..];
            let end = after.find("```").map(|e| start + label.len() + e + 3);
            match end {
                Some(end) => cleaned.replace_range(start..end, ""),
                None => {
                    cleaned.truncate(start);
                    break;
                }
            }
        }
    }
    for marker in ["<｜tool▁calls▁begin｜>", "<｜tool▁calls▁end｜>", "<|tool_calls_section_begin|>", "<|tool_calls_section_end|>"] {
        cleaned = cleaned.replace(marker, "");
    }

    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    cleaned.trim().to_string()
}

/// Format a tool result for injection back into the conversation as a user message.
pub fn format_tool_result(tool_name: &str, tool_id: &str, result: &str, is_error: bool) -> String {
    if is_error {
        format!(
            "[Tool Result: {} (id: {})]\nError: {}",
            tool_name, tool_id, result
        )
    } else {
        format!("[Tool Result: {} (id: {})]\n{}", tool_name, tool_id, result)
    }
}
