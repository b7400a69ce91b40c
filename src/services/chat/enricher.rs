//! Context Enricher
//!
//! Turns an inbound `ChatRequest` into the canonical message list for the
//! cascade: an executive system prompt with the dashboard's live context and
//! text-format tool instructions, followed by bounded history and the new
//! turns. Images ride on the latest user message.

use serde_json::Value;
use tracing::warn;

use suite_gateway_llm::{CanonicalMessage, ImageAttachment, Role, ToolDefinition};
use suite_gateway_tools::{build_tool_call_instructions, truncate_chars};

use super::types::{ChatRequest, InboundMessage};
use crate::config::ExecutiveConfig;

/// Upper bound on each embedded context block.
const MAX_CONTEXT_BLOCK_CHARS: usize = 4_000;

pub struct ContextEnricher {
    executives: Vec<ExecutiveConfig>,
    history_limit: usize,
}

impl ContextEnricher {
    pub fn new(executives: Vec<ExecutiveConfig>, history_limit: usize) -> Self {
        Self {
            executives,
            history_limit,
        }
    }

    /// Canonical messages for one request.
    pub fn build(
        &self,
        executive: &ExecutiveConfig,
        request: &ChatRequest,
        tools: &[ToolDefinition],
    ) -> Vec<CanonicalMessage> {
        let inbound_system: Vec<&str> = request
            .conversation_history
            .iter()
            .chain(request.messages.iter())
            .filter(|m| m.role.eq_ignore_ascii_case("system"))
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
            .collect();

        let mut messages = vec![CanonicalMessage::system(self.system_prompt(
            executive,
            request,
            tools,
            &inbound_system,
        ))];

        let skip = request
            .conversation_history
            .len()
            .saturating_sub(self.history_limit);
        messages.extend(
            request
                .conversation_history
                .iter()
                .skip(skip)
                .chain(request.messages.iter())
                .filter_map(to_canonical),
        );

        let images: Vec<ImageAttachment> = request
            .images
            .iter()
            .filter_map(|uri| {
                let image = ImageAttachment::from_data_uri(uri);
                if image.is_none() {
                    warn!(prefix = %truncate_chars(uri, 32), "Dropping malformed image data URI");
                }
                image
            })
            .collect();
        if !images.is_empty() {
            match messages.iter_mut().rev().find(|m| m.role == Role::User) {
                Some(last_user) => last_user.images.extend(images),
                None => warn!("Images supplied without a user message, ignoring"),
            }
        }

        messages
    }

    fn system_prompt(
        &self,
        executive: &ExecutiveConfig,
        request: &ChatRequest,
        tools: &[ToolDefinition],
        inbound_system: &[&str],
    ) -> String {
        let mut prompt = format!(
            "You are the {title} (\"{name}\") of the Suite AI executive team. \
             Answer the dashboard user directly and concisely. Use tools for live data \
             instead of guessing, and never invent numbers.",
            title = executive.title,
            name = executive.name
        );
        if !executive.persona.trim().is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(executive.persona.trim());
        }

        let blocks = [
            ("User Context", request.user_context.as_ref()),
            ("Mining Statistics", request.mining_stats.as_ref()),
            ("System Version", request.system_version.as_ref()),
        ];
        let rendered: Vec<String> = blocks
            .iter()
            .filter_map(|(title, value)| {
                value
                    .filter(|v| !is_empty_value(v))
                    .map(|v| format!("### {}\n{}", title, render_block(v)))
            })
            .collect();
        if !rendered.is_empty() {
            prompt.push_str("\n\n## Live Context\n");
            prompt.push_str(&rendered.join("\n\n"));
        }

        if request.council_mode {
            let others: Vec<String> = self
                .executives
                .iter()
                .filter(|e| e.name != executive.name)
                .map(|e| format!("{} ({})", e.title, e.name))
                .collect();
            prompt.push_str("\n\n## Council Mode\n");
            prompt.push_str(&format!(
                "You are deliberating in council with: {}. Give your perspective as the {}, \
                 point out where the others would likely disagree, and finish with one \
                 concrete recommendation.",
                if others.is_empty() {
                    "no other executives".to_string()
                } else {
                    others.join(", ")
                },
                executive.title
            ));
        }

        for extra in inbound_system {
            prompt.push_str("\n\n");
            prompt.push_str(extra);
        }

        if !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&build_tool_call_instructions(tools));
        }
        prompt
    }
}

fn to_canonical(message: &InboundMessage) -> Option<CanonicalMessage> {
    let content = message.content.trim();
    if content.is_empty() {
        return None;
    }
    match message.role.to_ascii_lowercase().as_str() {
        "system" | "tool" => None,
        "assistant" | "model" => Some(CanonicalMessage::assistant(content)),
        _ => Some(CanonicalMessage::user(content)),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn render_block(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    truncate_chars(&text, MAX_CONTEXT_BLOCK_CHARS)
}
