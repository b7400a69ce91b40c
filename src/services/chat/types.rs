//! Chat request and reply shapes
//!
//! `ChatRequest` is the inbound body of every chat endpoint; `ChatReply` is
//! what the pipeline hands back to the HTTP layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One inbound conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl InboundMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /chat` and `POST /executives/:name/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub conversation_history: Vec<InboundMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining_stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_version: Option<Value>,
    #[serde(default)]
    pub council_mode: bool,
    /// Data URIs attached to the latest user turn
    #[serde(default)]
    pub images: Vec<String>,
    /// Provider name -> API key for this request only
    #[serde(default, alias = "session_credentials")]
    pub session_credentials: HashMap<String, String>,
}

impl ChatRequest {
    /// Single user message, no extras.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![InboundMessage::new("user", text)],
            ..Default::default()
        }
    }

    /// Content of the last user message.
    pub fn latest_user_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role.eq_ignore_ascii_case("user"))
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
    }
}

/// Pipeline outcome for a successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub has_tool_calls: bool,
    pub tool_calls_executed: usize,
    pub provider: String,
    pub model: String,
    pub executive: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

/// Provider label used when no AI provider produced the answer.
pub const EMERGENCY_PROVIDER: &str = "emergency-fallback";
