//! Tool Result Envelope
//!
//! The single result shape every tool execution produces, whether the tool
//! succeeded, declared a failure, or panicked.

use serde::{Deserialize, Serialize};

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Name of the tool that produced this result
    pub tool_name: String,
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hint for the next model turn, e.g. the schema the tool expects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_point: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(tool_name: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
            learning_point: None,
        }
    }

    /// Create an error result
    pub fn err(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            learning_point: None,
        }
    }

    /// Attach a self-correction hint.
    pub fn with_learning_point(mut self, learning_point: impl Into<String>) -> Self {
        self.learning_point = Some(learning_point.into());
        self
    }

    /// Short human-readable summary used in audit records.
    pub fn summary(&self) -> String {
        if self.success {
            let text = self
                .result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default();
            truncate_chars(&text, 200)
        } else {
            self.error.clone().unwrap_or_else(|| "Unknown error".to_string())
        }
    }

    /// Convert to string for LLM consumption
    ///
    /// The whole envelope is serialized so the model sees `learningPoint`
    /// alongside the error.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            if self.success {
                "{\"success\":true}".to_string()
            } else {
                format!(
                    "Error: {}",
                    self.error.as_deref().unwrap_or("Unknown error")
                )
            }
        })
    }
}

/// Truncate to `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
