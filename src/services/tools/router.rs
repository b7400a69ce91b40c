//! Tool Routing
//!
//! Each tool the models can call is a route to one downstream service and
//! action. Routes are registered into the `ToolRegistry` as `FunctionTool`s at
//! startup; the services themselves are opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use suite_gateway_core::{ExecutionContext, ToolContext};
use suite_gateway_llm::types::ParameterSchema;
use suite_gateway_tools::{
    truncate_chars, FunctionTool, ToolError, ToolHandler, ToolOutcome, ToolRegistry,
    ToolRegistryResult,
};

/// Tool name -> downstream service and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRoute {
    pub tool: String,
    pub service: String,
    pub action: String,
    pub description: String,
    /// Parameter schema advertised to models. None = no parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSchema>,
}

impl ToolRoute {
    pub fn new(
        tool: impl Into<String>,
        service: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            service: service.into(),
            action: action.into(),
            description: description.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Invokes one action on a downstream service.
#[async_trait]
pub trait ServiceRouter: Send + Sync {
    async fn invoke(&self, ctx: &ToolContext, service: &str, action: &str, args: Value) -> ToolOutcome;
}

/// Routes over HTTP: `POST {base_url}/{service}` with `{action, ...args}`.
pub struct HttpServiceRouter {
    client: reqwest::Client,
    base_url: String,
    service_key: Option<String>,
    timeout: Duration,
}

impl HttpServiceRouter {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        service_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
            timeout,
        }
    }
}

/// `{action, ...args}`; non-object arguments travel under `args`.
pub fn service_payload(action: &str, args: Value) -> Value {
    let mut body = Map::new();
    body.insert("action".to_string(), Value::String(action.to_string()));
    match args {
        Value::Object(map) => {
            for (k, v) in map {
                if k != "action" {
                    body.insert(k, v);
                }
            }
        }
        Value::Null => {}
        other => {
            body.insert("args".to_string(), other);
        }
    }
    Value::Object(body)
}

/// Map a service reply to a tool outcome. Services report declared failures
/// as `{"success": false, "error": ..., "learningPoint"?: ...}`.
pub fn interpret_service_reply(service: &str, status: u16, body: &str) -> ToolOutcome {
    let parsed: Value =
        serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));

    if !(200..300).contains(&status) {
        let message = parsed
            .get("error")
            .and_then(|e| e.as_str().map(str::to_string).or_else(|| Some(e.to_string())))
            .unwrap_or_else(|| truncate_chars(body, 300));
        return Err(ToolError::Downstream {
            service: service.to_string(),
            message: format!("HTTP {}: {}", status, message),
        });
    }

    if parsed.get("success").and_then(Value::as_bool) == Some(false) {
        let message = parsed
            .get("error")
            .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
            .unwrap_or_else(|| format!("{} reported failure", service));
        let hint = parsed
            .get("learningPoint")
            .or_else(|| parsed.get("learning_point"))
            .and_then(Value::as_str);
        return Err(match hint {
            Some(hint) => ToolError::with_learning_point(message, hint),
            None => ToolError::failed(message),
        });
    }

    Ok(parsed)
}

#[async_trait]
impl ServiceRouter for HttpServiceRouter {
    async fn invoke(&self, ctx: &ToolContext, service: &str, action: &str, args: Value) -> ToolOutcome {
        let url = format!("{}/{}", self.base_url, service);
        debug!(service, action, request_id = ctx.request_id(), "Routing tool call");

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("x-executive-name", ctx.identity().executive.as_str())
            .header("x-request-id", ctx.request_id())
            .json(&service_payload(action, args));
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ToolError::Downstream {
            service: service.to_string(),
            message: if e.is_timeout() {
                format!("timed out after {}ms", self.timeout.as_millis())
            } else {
                e.to_string()
            },
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ToolError::Downstream {
            service: service.to_string(),
            message: format!("failed to read response: {}", e),
        })?;
        interpret_service_reply(service, status, &body)
    }
}

/// Stand-in when no routing base URL is configured. Every call fails with a
/// downstream error, so the emergency report still renders per-tool sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnroutedServices;

#[async_trait]
impl ServiceRouter for UnroutedServices {
    async fn invoke(&self, _ctx: &ToolContext, service: &str, _action: &str, _args: Value) -> ToolOutcome {
        Err(ToolError::Downstream {
            service: service.to_string(),
            message: "services.base_url is not configured".to_string(),
        })
    }
}

fn props(entries: &[(&str, ParameterSchema)]) -> HashMap<String, ParameterSchema> {
    entries
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect()
}

fn required(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Routes used when the config does not provide a table.
pub fn default_routes() -> Vec<ToolRoute> {
    vec![
        ToolRoute::new(
            "get_mining_stats",
            "mining-proxy",
            "get_stats",
            "Current mining statistics: hashrate, shares, balance due and paid.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[("period", ParameterSchema::string(Some("Window such as 24h")))]),
            vec![],
        )),
        ToolRoute::new(
            "get_system_status",
            "system-status",
            "check",
            "Health of the suite's services, agents, and infrastructure.",
        ),
        ToolRoute::new(
            "list_agents",
            "agent-manager",
            "list_agents",
            "List autonomous agents and their current status.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[("status", ParameterSchema::string(Some("active, idle or all")))]),
            vec![],
        )),
        ToolRoute::new(
            "list_tasks",
            "agent-manager",
            "list_tasks",
            "List tasks on the agent task board.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("status", ParameterSchema::string(Some("pending, in_progress or completed"))),
                ("limit", ParameterSchema::integer(None)),
            ]),
            vec![],
        )),
        ToolRoute::new(
            "create_task",
            "agent-manager",
            "create_task",
            "Create a task for an agent.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("title", ParameterSchema::string(None)),
                ("description", ParameterSchema::string(None)),
                ("priority", ParameterSchema::integer(Some("1-10"))),
                ("assignee", ParameterSchema::string(Some("Agent id"))),
            ]),
            required(&["title", "description"]),
        )),
        ToolRoute::new(
            "assign_task",
            "agent-manager",
            "assign_task",
            "Assign an existing task to an agent.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("task_id", ParameterSchema::string(None)),
                ("agent_id", ParameterSchema::string(None)),
            ]),
            required(&["task_id", "agent_id"]),
        )),
        ToolRoute::new(
            "search_knowledge",
            "knowledge-manager",
            "search",
            "Search the suite knowledge base.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("query", ParameterSchema::string(None)),
                ("limit", ParameterSchema::integer(None)),
            ]),
            required(&["query"]),
        )),
        ToolRoute::new(
            "send_notification",
            "notification-service",
            "send",
            "Post a message to a team channel.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("channel", ParameterSchema::string(None)),
                ("message", ParameterSchema::string(None)),
            ]),
            required(&["channel", "message"]),
        )),
        ToolRoute::new(
            "execute_python",
            "python-executor",
            "execute",
            "Run Python in a sandbox without network access. print() the result.",
        )
        .with_parameters(ParameterSchema::object(
            None,
            props(&[
                ("code", ParameterSchema::string(Some("Python source to run"))),
                ("purpose", ParameterSchema::string(Some("What the code does"))),
            ]),
            required(&["code"]),
        )),
    ]
}

/// Register one `FunctionTool` per route.
pub fn register_routes(
    registry: &mut ToolRegistry,
    routes: &[ToolRoute],
    router: Arc<dyn ServiceRouter>,
) -> ToolRegistryResult<()> {
    for route in routes {
        let service = route.service.clone();
        let action = route.action.clone();
        let router = router.clone();
        let tool = FunctionTool::new(
            route.tool.clone(),
            route.description.clone(),
            route
                .parameters
                .clone()
                .unwrap_or_else(ParameterSchema::empty_object),
            move |ctx, args| {
                let router = router.clone();
                let service = service.clone();
                let action = action.clone();
                Box::pin(async move { router.invoke(&ctx, &service, &action, args).await })
            },
        );
        registry.register(Arc::new(tool) as Arc<dyn ToolHandler>)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use suite_gateway_core::Identity;
    use suite_gateway_tools::ToolRegistryError;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl ServiceRouter for Recording {
        async fn invoke(&self, _ctx: &ToolContext, service: &str, action: &str, args: Value) -> ToolOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((service.to_string(), action.to_string(), args.clone()));
            Ok(serde_json::json!({"ok": true}))
        }
    }

    #[test]
    fn test_service_payload_merges_args() {
        let body = service_payload("get_stats", serde_json::json!({"period": "24h", "action": "x"}));
        assert_eq!(body, serde_json::json!({"action": "get_stats", "period": "24h"}));
        let body = service_payload("run", serde_json::json!([1, 2]));
        assert_eq!(body["args"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_interpret_reply() {
        assert_eq!(
            interpret_service_reply("mining-proxy", 200, r#"{"hashrate": 10}"#).unwrap()["hashrate"],
            10
        );
        let err = interpret_service_reply(
            "python-executor",
            200,
            r#"{"success": false, "error": "NameError", "learningPoint": "define x first"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "NameError");
        assert_eq!(err.learning_point(), Some("define x first"));

        let err = interpret_service_reply("agent-manager", 503, "unavailable").unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
        assert_eq!(
            interpret_service_reply("x", 200, "plain text").unwrap(),
            Value::String("plain text".to_string())
        );
    }

    #[test]
    fn test_default_routes_register_cleanly() {
        let mut registry = ToolRegistry::new();
        register_routes(&mut registry, &default_routes(), Arc::new(Recording::default())).unwrap();
        assert!(registry.contains("execute_python"));
        assert!(registry
            .require(["get_mining_stats", "get_system_status", "list_agents", "list_tasks"], "test")
            .is_ok());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut registry = ToolRegistry::new();
        let mut routes = default_routes();
        routes.push(routes[0].clone());
        let err = register_routes(&mut registry, &routes, Arc::new(Recording::default())).unwrap_err();
        assert_eq!(err, ToolRegistryError::DuplicateTool("get_mining_stats".to_string()));
    }

    #[tokio::test]
    async fn test_registered_route_invokes_router() {
        let router = Arc::new(Recording::default());
        let mut registry = ToolRegistry::new();
        register_routes(&mut registry, &default_routes(), router.clone()).unwrap();

        let ctx = ToolContext::new("req-1", Identity::new("cso"), "call_1");
        let tool = registry.get("list_tasks").unwrap();
        tool.invoke(&ctx, serde_json::json!({"status": "pending"})).await.unwrap();

        let calls = router.calls.lock().unwrap();
        assert_eq!(calls[0].0, "agent-manager");
        assert_eq!(calls[0].1, "list_tasks");
        assert_eq!(calls[0].2["status"], "pending");
    }

    #[tokio::test]
    async fn test_unrouted_services_fail_as_downstream() {
        let ctx = ToolContext::new("req-1", Identity::new("cso"), "call_1");
        let err = UnroutedServices
            .invoke(&ctx, "mining-proxy", "get_stats", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Downstream { ref service, .. } if service == "mining-proxy"));
    }
}
