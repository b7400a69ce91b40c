//! Tool-Call Extractor
//!
//! Recovers the tool calls a model wants to make. Sources in precedence order,
//! first non-empty wins:
//! 1. native `tool_calls` from the provider response
//! 2. labeled code fences in the text
//! 3. vendor delimiter tokens in the text
//! 4. an intent heuristic: the text announces an action it did not take
//!    ("let me check the hashrate") and a keyword maps to a registered tool
//!
//! Once tools have run in a request, follow-up turns use
//! [`ToolCallExtractor::extract_explicit`], which skips the heuristic.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

use suite_gateway_llm::ToolCall;
use suite_gateway_tools::{parse_delimited_tool_calls, parse_fenced_tool_calls, ParsedToolCall};

/// Where extracted calls came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Native,
    Fenced,
    Delimited,
    Intent,
}

impl ExtractionSource {
    /// Whether the provider itself produced structured calls.
    pub fn is_native(&self) -> bool {
        matches!(self, ExtractionSource::Native)
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub calls: Vec<ToolCall>,
    pub source: ExtractionSource,
}

/// Keywords that map an announced action to a tool.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub keywords: Vec<String>,
    pub tool: String,
}

impl IntentRule {
    pub fn new(tool: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            tool: tool.into(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

pub fn default_intent_rules() -> Vec<IntentRule> {
    vec![
        IntentRule::new("get_mining_stats", &["mining", "hashrate", "hash rate", "shares", "payout"]),
        IntentRule::new("get_system_status", &["system status", "health", "uptime"]),
        IntentRule::new("list_agents", &["agents", "agent status"]),
        IntentRule::new("list_tasks", &["tasks", "task board"]),
    ]
}

fn announced_action_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:let me|i'll|i will|i'm going to|i am going to|allow me to)\s+(?:quickly\s+)?(?:check|look up|look at|fetch|get|pull|query|retrieve|review)\b",
        )
        .ok()
    })
    .as_ref()
}

pub struct ToolCallExtractor {
    intent_rules: Vec<IntentRule>,
    known_tools: HashSet<String>,
}

impl ToolCallExtractor {
    /// `known_tools` limits the intent heuristic to tools that exist.
    pub fn new(known_tools: impl IntoIterator<Item = String>, intent_rules: Vec<IntentRule>) -> Self {
        Self {
            intent_rules,
            known_tools: known_tools.into_iter().collect(),
        }
    }

    pub fn extract(&self, raw_content: Option<&str>, native: &[ToolCall]) -> Option<Extraction> {
        self.extract_with(raw_content, native, true)
    }

    /// Native, fenced and delimited calls only. A reply that merely talks
    /// about checking something is a final answer here.
    pub fn extract_explicit(&self, raw_content: Option<&str>, native: &[ToolCall]) -> Option<Extraction> {
        self.extract_with(raw_content, native, false)
    }

    fn extract_with(
        &self,
        raw_content: Option<&str>,
        native: &[ToolCall],
        allow_intent: bool,
    ) -> Option<Extraction> {
        if !native.is_empty() {
            return Some(Extraction {
                calls: native.to_vec(),
                source: ExtractionSource::Native,
            });
        }

        let text = raw_content.map(str::trim).filter(|t| !t.is_empty())?;

        let fenced = parse_fenced_tool_calls(text);
        if !fenced.is_empty() {
            debug!(count = fenced.len(), "Extracted tool calls from code fences");
            return Some(Extraction {
                calls: to_tool_calls(fenced),
                source: ExtractionSource::Fenced,
            });
        }

        let delimited = parse_delimited_tool_calls(text);
        if !delimited.is_empty() {
            debug!(count = delimited.len(), "Extracted tool calls from delimiter tokens");
            return Some(Extraction {
                calls: to_tool_calls(delimited),
                source: ExtractionSource::Delimited,
            });
        }

        if !allow_intent {
            return None;
        }
        let intended = self.intended_tools(text);
        if intended.is_empty() {
            return None;
        }
        debug!(tools = ?intended, "Inferred tool calls from announced action");
        Some(Extraction {
            calls: intended
                .into_iter()
                .map(|tool| ToolCall::generated(tool, "{}"))
                .collect(),
            source: ExtractionSource::Intent,
        })
    }

    fn intended_tools(&self, text: &str) -> Vec<String> {
        if !announced_action_regex().is_some_and(|re| re.is_match(text)) {
            return Vec::new();
        }
        let lowered = text.to_lowercase();
        let mut tools: Vec<String> = Vec::new();
        for rule in &self.intent_rules {
            if rule.matches(&lowered)
                && self.known_tools.contains(&rule.tool)
                && !tools.contains(&rule.tool)
            {
                tools.push(rule.tool.clone());
            }
        }
        tools
    }
}

fn to_tool_calls(parsed: Vec<ParsedToolCall>) -> Vec<ToolCall> {
    parsed
        .into_iter()
        .map(|p| ToolCall::generated(p.tool_name, p.arguments))
        .collect()
}
