//! Request Context
//!
//! Two levels of context flow through a chat request:
//!
//! 1. `RequestContext` - created once per inbound request; carries the request id,
//!    the caller `Identity`, and the start time.
//! 2. `ToolContext` - derived per tool call; adds the tool call id.
//!
//! Both implement the read-only `ExecutionContext` trait, which is what tool
//! handlers and audit sinks depend on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view shared by every execution scope.
pub trait ExecutionContext: Send + Sync {
    /// Unique id of the inbound request.
    fn request_id(&self) -> &str;

    /// Who is acting: the executive handling the request.
    fn identity(&self) -> &Identity;
}

/// The caller on whose behalf tools run and providers are called.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Executive persona name (e.g. "general-manager").
    pub executive: String,
    /// Optional end-user id forwarded from the dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Optional dashboard session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Identity {
    pub fn new(executive: impl Into<String>) -> Self {
        Self {
            executive: executive.into(),
            user_id: None,
            session_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Per-request context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    identity: Identity,
    started_at: DateTime<Utc>,
    /// Provider name -> API key supplied with this request only.
    session_credentials: HashMap<String, String>,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    pub fn new(identity: Identity) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            identity,
            started_at: Utc::now(),
            session_credentials: HashMap::new(),
        }
    }

    /// Use a caller-supplied request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_session_credentials(mut self, credentials: HashMap<String, String>) -> Self {
        self.session_credentials = credentials;
        self
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Session-scoped credential override for a provider, if any.
    pub fn session_credential(&self, provider: &str) -> Option<&str> {
        self.session_credentials
            .get(provider)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    /// Derive the context for one tool call.
    pub fn tool_context(&self, tool_call_id: impl Into<String>) -> ToolContext {
        ToolContext {
            request_id: self.request_id.clone(),
            identity: self.identity.clone(),
            tool_call_id: tool_call_id.into(),
        }
    }
}

impl ExecutionContext for RequestContext {
    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Context handed to a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    request_id: String,
    identity: Identity,
    tool_call_id: String,
}

impl ToolContext {
    pub fn new(
        request_id: impl Into<String>,
        identity: Identity,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            identity,
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }
}

impl ExecutionContext for ToolContext {
    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }
}
