//! Tool Trait and Registry
//!
//! Defines the `ToolHandler` trait and the `ToolRegistry` name->handler table
//! the executor dispatches through. The registry is built once at startup and
//! validated: duplicate names and routes to unregistered tools are rejected
//! before the server accepts traffic.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use suite_gateway_core::ToolContext;
use suite_gateway_llm::types::{ParameterSchema, ToolDefinition};

/// Declared failure of a tool handler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// The handler ran and reported a failure
    #[error("{message}")]
    Failed {
        message: String,
        learning_point: Option<String>,
    },

    /// Arguments were well-formed JSON but unusable by this tool
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The downstream service behind this tool failed
    #[error("service '{service}' failed: {message}")]
    Downstream { service: String, message: String },
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed {
            message: message.into(),
            learning_point: None,
        }
    }

    pub fn with_learning_point(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ToolError::Failed {
            message: message.into(),
            learning_point: Some(hint.into()),
        }
    }

    pub fn learning_point(&self) -> Option<&str> {
        match self {
            ToolError::Failed { learning_point, .. } => learning_point.as_deref(),
            _ => None,
        }
    }
}

/// What a handler returns: a JSON result or a declared failure.
pub type ToolOutcome = Result<Value, ToolError>;

/// Unified tool interface.
///
/// Each downstream capability implements this trait, providing:
/// - Identity (name, description, parameters schema)
/// - Invocation logic
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Unique name of this tool (e.g., "get_mining_stats", "execute_python")
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does
    fn description(&self) -> &str;

    /// JSON schema describing the tool's input parameters
    fn parameters_schema(&self) -> ParameterSchema;

    /// Invoke the tool with already-parsed arguments.
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> ToolOutcome;
}

/// Registry validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolRegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("duplicate tool registration: {0}")]
    DuplicateTool(String),

    #[error("'{referenced_by}' references unregistered tool '{tool}'")]
    MissingTool { tool: String, referenced_by: String },
}

/// Result type for registry operations
pub type ToolRegistryResult<T> = Result<T, ToolRegistryError>;

/// Registry of available tools.
///
/// O(1) lookup by name, with insertion order kept for deterministic tool lists.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Names must be unique and non-empty.
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) -> ToolRegistryResult<()> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(ToolRegistryError::EmptyName);
        }
        if self.tools.contains_key(&name) {
            return Err(ToolRegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register several tools, stopping at the first invalid one.
    pub fn register_all(
        &mut self,
        tools: impl IntoIterator<Item = Arc<dyn ToolHandler>>,
    ) -> ToolRegistryResult<()> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Check that every name some other component relies on is registered.
    ///
    /// `referenced_by` names the component for the error message.
    pub fn require<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        referenced_by: &str,
    ) -> ToolRegistryResult<()> {
        for name in names {
            if !self.tools.contains_key(name) {
                return Err(ToolRegistryError::MissingTool {
                    tool: name.to_string(),
                    referenced_by: referenced_by.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions, suitable for sending to LLM providers.
    /// Returned in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    /// Get all registered tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── FunctionTool ─────────────────────────────────────────────────────

/// Boxed future returned by a `FunctionTool` handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolOutcome> + Send>>;

/// Type alias for the async handler function used by `FunctionTool`.
pub type FunctionToolHandler = Box<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

/// A tool created from an async closure.
///
/// # Example
///
/// ```ignore
/// let tool = FunctionTool::new(
///     "echo",
///     "Echoes the input",
///     ParameterSchema::empty_object(),
///     |_ctx, args| Box::pin(async move { Ok(args) }),
/// );
/// ```
pub struct FunctionTool {
    tool_name: String,
    tool_description: String,
    schema: ParameterSchema,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    /// Create a new FunctionTool from an async closure.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolContext, Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl ToolHandler for FunctionTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn parameters_schema(&self) -> ParameterSchema {
        self.schema.clone()
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> ToolOutcome {
        (self.handler)(ctx.clone(), args).await
    }
}
