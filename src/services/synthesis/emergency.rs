//! Emergency Fallback
//!
//! Non-AI last resort used when every provider is exhausted. Ordered
//! keyword rules pick tools from the raw user query; matched tools run
//! directly through the executor and their results are rendered into a
//! fixed-format report. Without a match, an instructional message explains
//! what can still be asked.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use suite_gateway_core::{ExecutionContext, RequestContext};
use suite_gateway_llm::ToolCall;
use suite_gateway_tools::{truncate_chars, ToolResult};

use crate::services::tools::{ExecutedTool, ToolExecutor};

const MAX_LIST_ITEMS: usize = 5;
const MAX_VALUE_CHARS: usize = 160;

/// Keyword rule: any keyword in the query selects `tool`.
#[derive(Debug, Clone)]
pub struct EmergencyRule {
    pub tool: String,
    pub title: String,
    /// Shown in the no-match help text
    pub hint: String,
    pub keywords: Vec<String>,
}

impl EmergencyRule {
    pub fn new(tool: &str, title: &str, hint: &str, keywords: &[&str]) -> Self {
        Self {
            tool: tool.to_string(),
            title: title.to_string(),
            hint: hint.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowered_query: &str) -> bool {
        self.keywords.iter().any(|k| lowered_query.contains(k.as_str()))
    }
}

pub fn default_emergency_rules() -> Vec<EmergencyRule> {
    vec![
        EmergencyRule::new(
            "get_mining_stats",
            "Mining Statistics",
            "mining stats, hashrate or shares",
            &["mining", "hashrate", "hash rate", "shares", "payout", "earnings"],
        ),
        EmergencyRule::new(
            "get_system_status",
            "System Status",
            "system status or health",
            &["status", "health", "uptime", "online"],
        ),
        EmergencyRule::new("list_agents", "Agents", "the agent roster", &["agent"]),
        EmergencyRule::new("list_tasks", "Tasks", "open tasks", &["task"]),
    ]
}

/// Rendered report plus the tools that produced it.
#[derive(Debug, Clone)]
pub struct EmergencyReport {
    pub response: String,
    pub executed: Vec<ExecutedTool>,
}

pub struct EmergencyFallback {
    executor: Arc<ToolExecutor>,
    rules: Vec<EmergencyRule>,
}

impl EmergencyFallback {
    pub fn new(executor: Arc<ToolExecutor>, rules: Vec<EmergencyRule>) -> Self {
        Self { executor, rules }
    }

    pub fn rules(&self) -> &[EmergencyRule] {
        &self.rules
    }

    /// Tool names referenced by the rules, for startup validation.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.tool.as_str())
    }

    /// Matching rules in declaration order, one per tool.
    pub fn matching_rules(&self, query: &str) -> Vec<&EmergencyRule> {
        let lowered = query.to_lowercase();
        let mut matched: Vec<&EmergencyRule> = Vec::new();
        for rule in &self.rules {
            if rule.matches(&lowered) && !matched.iter().any(|m| m.tool == rule.tool) {
                matched.push(rule);
            }
        }
        matched
    }

    pub async fn respond(&self, ctx: &RequestContext, query: &str) -> EmergencyReport {
        let matched = self.matching_rules(query);
        if matched.is_empty() {
            info!(request_id = ctx.request_id(), "Emergency fallback: no keyword matched");
            return EmergencyReport {
                response: self.help_message(),
                executed: Vec::new(),
            };
        }

        let mut sections = Vec::with_capacity(matched.len());
        let mut executed = Vec::with_capacity(matched.len());
        for rule in matched {
            let call = ToolCall::generated(rule.tool.clone(), "{}");
            let result = self.executor.execute(ctx, &call).await;
            if !result.success {
                warn!(tool = %rule.tool, error = ?result.error, "Emergency tool failed");
            }
            sections.push(render_section(&rule.title, &result));
            executed.push(ExecutedTool { call, result });
        }

        info!(
            request_id = ctx.request_id(),
            tools = executed.len(),
            "Emergency fallback report rendered"
        );
        EmergencyReport {
            response: format!(
                "AI providers are temporarily unavailable, so this answer was assembled \
                 directly from live data.\n\n{}",
                sections.join("\n\n")
            ),
            executed,
        }
    }

    fn help_message(&self) -> String {
        let hints = self
            .rules
            .iter()
            .map(|r| format!("- {}", r.hint))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "All AI providers are temporarily unavailable (quota or rate limits were \
             reached, or they did not respond in time), so I cannot compose a full answer \
             right now.\n\nI can still fetch live data without AI. Try asking about:\n{}\n\n\
             Full AI responses should return in a few minutes.",
            hints
        )
    }
}

fn render_section(title: &str, result: &ToolResult) -> String {
    if !result.success {
        return format!(
            "## {}\nUnavailable: {}",
            title,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    let body = match result.result.as_ref() {
        None | Some(Value::Null) => "No data returned.".to_string(),
        Some(value) => render_value(value),
    };
    format!("## {}\n{}", title, body)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(key, v)| format!("- {}: {}", humanize_key(key), render_scalar(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) if !items.is_empty() => {
            let mut lines: Vec<String> = items
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|item| format!("- {}", render_scalar(item)))
                .collect();
            if items.len() > MAX_LIST_ITEMS {
                lines.push(format!("- ...and {} more", items.len() - MAX_LIST_ITEMS));
            }
            lines.join("\n")
        }
        Value::Object(_) | Value::Array(_) => "No data returned.".to_string(),
        other => render_scalar(other),
    }
}

fn render_scalar(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("{} item(s)", items.len()),
        Value::Object(map) => {
            // Prefer a human label when the object has one
            match ["name", "title", "status"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
            {
                Some(label) => label.to_string(),
                None => value.to_string(),
            }
        }
        other => other.to_string(),
    };
    truncate_chars(&text, MAX_VALUE_CHARS)
}

/// `valid_shares` / `validShares` -> `Valid shares`
fn humanize_key(key: &str) -> String {
    let mut words = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch == '_' || ch == '-' {
            words.push(' ');
            prev_lower = false;
        } else if ch.is_uppercase() && prev_lower {
            words.push(' ');
            words.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            words.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
