//! Suite Gateway Tools
//!
//! Core types and trait definitions for tool execution:
//! - `ToolResult` - the result envelope every execution produces
//! - `ToolHandler` trait - unified tool interface
//! - `ToolRegistry` - validated name->handler dispatch table
//! - `FunctionTool` - closure-based tool creation
//! - `ParsedToolCall` - text tool-call parsing for providers without reliable native calls
//! - expected-schema lookup and `execute_python` precondition scanning
//!
//! The executor that ties these together (audit, routing, timing) lives in the
//! gateway crate's `services::tools` module.

pub mod executor;
pub mod preconditions;
pub mod prompt_fallback;
pub mod schemas;
pub mod trait_def;

// Re-export core types
pub use executor::{truncate_chars, ToolResult};
pub use preconditions::{check_python_code, PreconditionReport, PreconditionViolation};
pub use prompt_fallback::{
    build_tool_call_instructions, extract_text_without_tool_calls, format_tool_result,
    parse_delimited_tool_calls, parse_fenced_tool_calls, ParsedToolCall,
};
pub use schemas::{expected_schema, known_schema};
pub use trait_def::{
    FunctionTool, ToolError, ToolFuture, ToolHandler, ToolOutcome, ToolRegistry,
    ToolRegistryError, ToolRegistryResult,
};
