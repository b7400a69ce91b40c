//! Tool Audit Trail
//!
//! Every tool execution produces one `AuditRecord`. Sinks are fire-and-forget:
//! recording never blocks or fails the request that produced the record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// One tool execution, in the shape the persistence service accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub function_name: String,
    pub executive_name: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Must return promptly; slow delivery belongs on a background task.
    fn record(&self, record: AuditRecord);
}

/// Writes records to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        info!(
            target: "suite_gateway::audit",
            tool = %record.function_name,
            executive = %record.executive_name,
            success = record.success,
            duration_ms = record.execution_time_ms,
            error = record.error_message.as_deref().unwrap_or(""),
            "Tool executed"
        );
    }
}

/// POSTs records to the persistence service on a background task.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
    service_key: Option<String>,
}

impl HttpAuditSink {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, service_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            service_key,
        }
    }
}

impl AuditSink for HttpAuditSink {
    fn record(&self, record: AuditRecord) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(tool = %record.function_name, "No runtime available, audit record dropped");
            return;
        };

        let mut request = self.client.post(&self.endpoint).json(&record);
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key);
        }
        let tool = record.function_name;
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(tool = %tool, "Audit record delivered");
                }
                Ok(resp) => {
                    warn!(tool = %tool, status = resp.status().as_u16(), "Audit endpoint rejected record");
                }
                Err(e) => {
                    warn!(tool = %tool, error = %e, "Failed to deliver audit record");
                }
            }
        });
    }
}
