//! Tool Executor
//!
//! Runs one model-requested tool call and always produces a `ToolResult`.
//! Validation happens in a fixed order: name, argument JSON, registration,
//! required fields, tool-specific preconditions. Only then is the handler
//! dispatched, on its own task so a panic becomes an ordinary failed result.
//! Every call that names a tool is audited regardless of outcome.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use suite_gateway_core::{ExecutionContext, RequestContext};
use suite_gateway_llm::ToolCall;
use suite_gateway_tools::{
    check_python_code, expected_schema, ToolError, ToolRegistry, ToolResult,
};

use super::audit::{AuditRecord, AuditSink};

/// Tool whose code argument is statically scanned before dispatch.
pub const CODE_EXECUTION_TOOL: &str = "execute_python";

/// A tool call paired with its outcome, in execution order.
#[derive(Debug, Clone)]
pub struct ExecutedTool {
    pub call: ToolCall,
    pub result: ToolResult,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    audit: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, audit: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self {
            registry,
            audit,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute calls one after another, preserving order.
    pub async fn execute_all(&self, ctx: &RequestContext, calls: &[ToolCall]) -> Vec<ExecutedTool> {
        let mut executed = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.execute(ctx, call).await;
            executed.push(ExecutedTool {
                call: call.clone(),
                result,
            });
        }
        executed
    }

    /// Execute one call. Never panics and never returns an error: every
    /// failure is folded into `{success: false, error, learningPoint}`.
    pub async fn execute(&self, ctx: &RequestContext, call: &ToolCall) -> ToolResult {
        let name = call.name().trim();
        if name.is_empty() {
            warn!(request_id = ctx.request_id(), "Tool call without a function name");
            return ToolResult::err("", "Tool call is missing a function name").with_learning_point(
                format!(
                    "Every tool call needs a function name. Available tools: {}",
                    self.registry.names().join(", ")
                ),
            );
        }

        let started = Instant::now();
        let registered = self.registry.get(name);
        let registered_schema = registered.as_ref().map(|t| t.parameters_schema());

        let args = match parse_arguments(call.arguments()) {
            Ok(args) => args,
            Err(parse_error) => {
                let schema = expected_schema(name, registered_schema.as_ref());
                let result = ToolResult::err(
                    name,
                    format!("Invalid JSON arguments for {}: {}", name, parse_error),
                )
                .with_learning_point(format!(
                    "Call {} again with arguments as a JSON object matching: {}",
                    name, schema
                ));
                return self.finish(ctx, call, Value::String(call.arguments().to_string()), started, result);
            }
        };

        let Some(tool) = registered else {
            let result = ToolResult::err(name, format!("Tool '{}' not found", name))
                .with_learning_point(format!(
                    "'{}' is not an available tool. Use one of: {}",
                    name,
                    self.registry.names().join(", ")
                ));
            return self.finish(ctx, call, args, started, result);
        };

        let schema = registered_schema.unwrap_or_else(suite_gateway_llm::ParameterSchema::empty_object);
        let mut missing: Vec<&str> = schema
            .required_names()
            .iter()
            .map(String::as_str)
            .filter(|field| !has_value(&args, field))
            .collect();
        if name == CODE_EXECUTION_TOOL && !has_value(&args, "code") && !missing.contains(&"code") {
            missing.push("code");
        }
        if !missing.is_empty() {
            let result = ToolResult::err(
                name,
                format!("{} is missing required field(s): {}", name, missing.join(", ")),
            )
            .with_learning_point(format!(
                "Call {} with arguments matching: {}",
                name,
                expected_schema(name, Some(&schema))
            ));
            return self.finish(ctx, call, args, started, result);
        }

        let mut advisory = None;
        if name == CODE_EXECUTION_TOOL {
            let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
            let report = check_python_code(code);
            if let Some(violation) = report.violation {
                info!(tool = name, reason = %violation.reason, "Code execution blocked before dispatch");
                let result = ToolResult::err(name, violation.reason)
                    .with_learning_point(violation.learning_point);
                return self.finish(ctx, call, args, started, result);
            }
            if !report.warnings.is_empty() {
                warn!(tool = name, warnings = ?report.warnings, "Code precondition warnings");
                advisory = Some(report.warnings.join("; "));
            }
        }

        let tool_ctx = ctx.tool_context(call.id.clone());
        let dispatch_args = args.clone();
        let handle = tokio::spawn(async move { tool.invoke(&tool_ctx, dispatch_args).await });
        let abort = handle.abort_handle();

        let result = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(value))) => {
                let result = ToolResult::ok(name, value);
                match advisory {
                    Some(hint) => result.with_learning_point(hint),
                    None => result,
                }
            }
            Ok(Ok(Err(err))) => declared_failure(name, err),
            Ok(Err(join_error)) => {
                warn!(tool = name, error = %join_error, "Tool handler panicked");
                ToolResult::err(name, format!("Tool {} crashed: {}", name, join_error))
                    .with_learning_point(format!(
                        "{} failed unexpectedly. Try different arguments or another tool.",
                        name
                    ))
            }
            Err(_) => {
                abort.abort();
                ToolResult::err(
                    name,
                    format!("Tool {} timed out after {}ms", name, self.timeout.as_millis()),
                )
                .with_learning_point(format!(
                    "{} did not answer in time. Narrow the request or answer without it.",
                    name
                ))
            }
        };
        self.finish(ctx, call, args, started, result)
    }

    fn finish(
        &self,
        ctx: &RequestContext,
        call: &ToolCall,
        parameters: Value,
        started: Instant,
        result: ToolResult,
    ) -> ToolResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            tool = %result.tool_name,
            success = result.success,
            duration_ms,
            "Tool call finished"
        );
        self.audit.record(AuditRecord {
            function_name: result.tool_name.clone(),
            executive_name: ctx.identity().executive.clone(),
            success: result.success,
            execution_time_ms: duration_ms,
            parameters,
            error_message: if result.success {
                None
            } else {
                Some(result.summary())
            },
            metadata: Some(serde_json::json!({
                "requestId": ctx.request_id(),
                "toolCallId": call.id,
                "summary": result.summary(),
            })),
        });
        result
    }
}

/// Empty arguments mean "no arguments"; anything else must be a JSON object.
fn parse_arguments(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_type(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn has_value(args: &Value, field: &str) -> bool {
    match args.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn declared_failure(name: &str, err: ToolError) -> ToolResult {
    let hint = err.learning_point().map(str::to_string);
    let result = ToolResult::err(name, err.to_string());
    match hint {
        Some(hint) => result.with_learning_point(hint),
        None => result,
    }
}
