//! HTTP response shapes
//!
//! Success bodies flatten the pipeline's `ChatReply` under `success: true`;
//! failures use one envelope whose HTTP status mirrors the classified failure.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use suite_gateway_llm::FailureKind;

use crate::services::chat::{ChatReply, PipelineError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSuccess {
    pub success: bool,
    #[serde(flatten)]
    pub reply: ChatReply,
}

impl From<ChatReply> for ChatSuccess {
    fn from(reply: ChatReply) -> Self {
        Self {
            success: true,
            reply,
        }
    }
}

/// `error` member of the failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// token_exhausted | rate_limit | timeout | service_unavailable | unknown
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
    pub message: String,
    pub can_retry: bool,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
}

/// Handler error, rendered as the failure envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: ErrorDetail,
}

impl ApiError {
    fn new(
        status: StatusCode,
        error_type: &str,
        message: impl Into<String>,
        can_retry: bool,
        suggested_action: &str,
    ) -> Self {
        Self {
            status,
            detail: ErrorDetail {
                error_type: error_type.to_string(),
                code: status.as_u16(),
                message: message.into(),
                can_retry,
                suggested_action: suggested_action.to_string(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unknown",
            message,
            false,
            "Send a JSON body with a non-empty messages array.",
        )
    }

    pub fn unknown_executive(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "unknown",
            format!("Unknown executive '{}'", name),
            false,
            "Use one of the configured executive names.",
        )
    }

    /// Classified provider failure.
    pub fn from_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        match kind {
            FailureKind::TokenExhausted => Self::new(
                StatusCode::PAYMENT_REQUIRED,
                "token_exhausted",
                message,
                false,
                "AI credits are exhausted. Add credits or supply your own API key.",
            ),
            FailureKind::RateLimited => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit",
                message,
                true,
                "Wait a minute and try again.",
            ),
            FailureKind::Timeout => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                message,
                true,
                "Try again with a shorter question.",
            ),
            _ => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                message,
                true,
                "AI services are degraded. Try again in a few minutes.",
            ),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::NoCredentials => Self::new(
                StatusCode::UNAUTHORIZED,
                "unknown",
                err.to_string(),
                false,
                "Configure an API key for at least one AI provider, or pass session_credentials.",
            ),
            PipelineError::ProvidersUnavailable { kind, .. } => Self::from_kind(*kind, err.to_string()),
            PipelineError::Timeout { .. } => Self::from_kind(FailureKind::Timeout, err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            success: false,
            error: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// One provider in `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub model: String,
    pub priority: u32,
    /// False after token exhaustion until the cooldown passes
    pub available: bool,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Whether the next cascade would attempt it
    pub admitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" when at least one provider is admitted, else "degraded"
    pub status: String,
    pub providers: Vec<ProviderHealth>,
    pub tools: usize,
    pub executives: Vec<String>,
}
