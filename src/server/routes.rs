//! Route handlers
//!
//! POST /chat                   - chat with the default executive
//! POST /executives/:name/chat  - chat with a named executive
//! GET  /health                 - provider and breaker snapshot

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use suite_gateway_core::{ExecutionContext, Identity, RequestContext};

use super::types::{ApiError, ChatSuccess, HealthResponse, ProviderHealth};
use crate::services::chat::ChatRequest;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/executives/:name/chat", post(executive_chat))
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatSuccess>, ApiError> {
    let name = state.config.pipeline.default_executive.clone();
    handle_chat(&state, &name, payload?.0).await
}

async fn executive_chat(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatSuccess>, ApiError> {
    handle_chat(&state, &name, payload?.0).await
}

async fn handle_chat(
    state: &AppState,
    executive_name: &str,
    request: ChatRequest,
) -> Result<Json<ChatSuccess>, ApiError> {
    let executive = state
        .config
        .executive(executive_name)
        .cloned()
        .ok_or_else(|| ApiError::unknown_executive(executive_name))?;
    if request.latest_user_query().is_none() && request.images.is_empty() {
        return Err(ApiError::bad_request("messages must contain a non-empty user message"));
    }

    let mut identity = Identity::new(executive.name.clone());
    if let Some(user_id) = request
        .user_context
        .as_ref()
        .and_then(|c| c.get("userId").or_else(|| c.get("id")))
        .and_then(|v| v.as_str())
    {
        identity = identity.with_user(user_id);
    }
    let ctx = RequestContext::new(identity)
        .with_session_credentials(request.session_credentials.clone());

    info!(
        request_id = ctx.request_id(),
        executive = %executive.name,
        council = request.council_mode,
        images = request.images.len(),
        "Chat request received"
    );

    let reply = state.pipeline.respond(&ctx, &executive, &request).await?;
    info!(
        request_id = ctx.request_id(),
        provider = %reply.provider,
        tools = reply.tool_calls_executed,
        "Chat request completed"
    );
    Ok(Json(ChatSuccess::from(reply)))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = state.pipeline.orchestrator();
    let registry = orchestrator.registry();
    let breaker = orchestrator.breaker();

    let providers: Vec<ProviderHealth> = registry
        .entries()
        .iter()
        .map(|entry| {
            let name = entry.name();
            let available = registry.is_available(name);
            let breaker_open = !breaker.is_available(name);
            let breaker_state = breaker.state(name);
            ProviderHealth {
                name: name.to_string(),
                model: entry.descriptor().model.clone(),
                priority: entry.descriptor().priority,
                available,
                failure_count: breaker_state.failure_count,
                last_failure_at: breaker_state.last_failure_at,
                admitted: available && !breaker_open,
            }
        })
        .collect();

    let status = if providers.iter().any(|p| p.admitted) {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        providers,
        tools: state.pipeline.executor().registry().len(),
        executives: state.config.executives.iter().map(|e| e.name.clone()).collect(),
    })
}
