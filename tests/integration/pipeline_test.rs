//! End-to-end chat pipeline: tool loops, emergency fallback, synthesis.

use std::sync::Arc;
use std::time::Duration;

use suite_gateway::services::chat::{ChatRequest, EMERGENCY_PROVIDER};
use suite_gateway::PipelineError;
use suite_gateway_llm::{FailureKind, Role, ToolCall, ToolCallMode};

use crate::support::*;

fn cso(h: &Harness) -> suite_gateway::config::ExecutiveConfig {
    h.state.config.executive("cso").cloned().unwrap()
}

#[tokio::test]
async fn test_all_providers_quota_exhausted_returns_emergency_report() {
    let providers: Vec<Arc<ScriptedProvider>> = ["gemini", "deepseek", "openrouter", "kimi"]
        .iter()
        .enumerate()
        .map(|(i, name)| Arc::new(ScriptedProvider::new(name, i as u32 + 1).always(Err(quota()))))
        .collect();
    let h = harness(providers.clone());

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("show mining stats"))
        .await
        .unwrap();

    assert_eq!(reply.provider, EMERGENCY_PROVIDER);
    assert_eq!(reply.confidence, Some(30));
    assert_eq!(reply.tool_calls_executed, 1);
    assert!(reply.response.contains("Mining Statistics"));
    assert!(reply.response.contains("1500"));
    assert_eq!(logged(&h.tool_log), vec!["get_mining_stats"]);
    assert!(providers.iter().all(|p| p.call_count() == 1));
}

#[tokio::test]
async fn test_two_tool_calls_run_in_order_and_feed_follow_up() {
    let provider = ScriptedProvider::new("gemini", 1)
        .then_tools(vec![
            ToolCall::new("call_a", "list_agents", "{}"),
            ToolCall::new("call_b", "list_tasks", "{}"),
        ])
        .then_text("Two agents are active and one task is open.");
    let provider = Arc::new(provider);
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("what are agents doing?"))
        .await
        .unwrap();

    assert_eq!(reply.response, "Two agents are active and one task is open.");
    assert!(reply.has_tool_calls);
    assert_eq!(reply.tool_calls_executed, 2);
    assert_eq!(reply.confidence, Some(95));
    assert_eq!(logged(&h.tool_log), vec!["list_agents", "list_tasks"]);

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    let follow_up = &calls[1].messages;
    let tool_ids: Vec<&str> = follow_up
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, vec!["call_a", "call_b"]);
    let assistant = follow_up.iter().find(|m| m.has_tool_calls()).unwrap();
    assert_eq!(assistant.tool_calls.as_ref().unwrap().len(), 2);

    let audited: Vec<String> = h.audit.0.lock().unwrap().iter().map(|r| r.function_name.clone()).collect();
    assert_eq!(audited, vec!["list_agents", "list_tasks"]);
}

#[tokio::test]
async fn test_text_embedded_tool_call_is_executed() {
    let provider = Arc::new(
        ScriptedProvider::new("deepseek", 1)
            .then_text("Checking now.\n```tool_call\n{\"tool\": \"get_system_status\", \"arguments\": {}}\n```")
            .then_text("All 12 services are healthy."),
    );
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("is everything up?"))
        .await
        .unwrap();

    assert_eq!(reply.response, "All 12 services are healthy.");
    assert_eq!(logged(&h.tool_log), vec!["get_system_status"]);
    let follow_up = &provider.calls()[1].messages;
    let last = follow_up.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.contains("[Tool Result: get_system_status"));
    assert!(last.content.contains("healthy"));
}

#[tokio::test]
async fn test_native_calls_win_over_text_blocks() {
    let provider = ScriptedProvider::new("gemini", 1);
    let both = provider.result(
        Some("```tool_call\n{\"tool\": \"get_mining_stats\", \"arguments\": {}}\n```".to_string()),
        vec![ToolCall::new("call_1", "list_agents", "{}")],
    );
    let provider = Arc::new(provider.then(Ok(both)).then_text("done"));
    let h = harness(vec![provider]);

    h.state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("agents?"))
        .await
        .unwrap();
    assert_eq!(logged(&h.tool_log), vec!["list_agents"]);
}

#[tokio::test]
async fn test_follow_up_prefers_provider_that_answered() {
    let first = Arc::new(ScriptedProvider::new("gemini", 1).then(Err(server_error())).always(Err(server_error())));
    let second = Arc::new(
        ScriptedProvider::new("deepseek", 2)
            .then_tools(vec![ToolCall::new("c1", "get_mining_stats", "{}")])
            .then_text("Hashrate is 1500."),
    );
    let h = harness(vec![first.clone(), second.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("hashrate?"))
        .await
        .unwrap();

    assert_eq!(reply.provider, "deepseek");
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 2);
    assert_eq!(second.calls()[1].options.prefer_provider.as_deref(), Some("deepseek"));
}

#[tokio::test]
async fn test_iteration_cap_synthesizes_from_results() {
    let provider = ScriptedProvider::new("gemini", 1);
    let looping = provider.tools(vec![ToolCall::generated("get_mining_stats", "{}")]);
    let provider = Arc::new(provider.always(Ok(looping)));
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("mining?"))
        .await
        .unwrap();

    // Five loop turns plus one synthesis call.
    let calls = provider.calls();
    assert_eq!(calls.len(), 6);
    assert_eq!(calls[5].options.tool_call_mode, ToolCallMode::None);
    assert_eq!(reply.tool_calls_executed, 5);
    // The synthesis call produced no text, so the template answers.
    assert!(reply.response.starts_with("get_mining_stats: {"));
    assert_eq!(reply.provider, "gemini");
}

#[tokio::test]
async fn test_exhaustion_after_tools_uses_template() {
    let provider = Arc::new(
        ScriptedProvider::new("gemini", 1)
            .then_tools(vec![ToolCall::new("c1", "list_tasks", "{}")])
            .always(Err(quota())),
    );
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("tasks?"))
        .await
        .unwrap();

    assert!(reply.response.contains("list_tasks: "));
    assert!(reply.response.contains("rotate keys"));
    assert_ne!(reply.provider, EMERGENCY_PROVIDER);
    // Loop turn, failed follow-up; the quota-exhausted provider is not asked to synthesize.
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_execute_python_without_code_returns_learning_point() {
    let h = harness(vec![Arc::new(ScriptedProvider::new("gemini", 1))]);
    let result = h
        .state
        .pipeline
        .executor()
        .execute(&ctx(), &ToolCall::generated("execute_python", r#"{"purpose": "sum"}"#))
        .await;

    assert!(!result.success);
    let hint = result.learning_point.unwrap();
    assert!(hint.contains("code"));
    assert!(hint.contains("purpose"));
    assert!(logged(&h.tool_log).is_empty());
}

#[tokio::test]
async fn test_no_credentials_is_a_hard_failure() {
    let provider = Arc::new(ScriptedProvider::new("gemini", 1).then_text("never"));
    let h = harness_with(test_config(), vec![provider.clone()], StaticKeys::none());

    let err = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoCredentials));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_session_credentials_unlock_provider() {
    let provider = Arc::new(ScriptedProvider::new("gemini", 1).then_text("hello there"));
    let h = harness_with(test_config(), vec![provider], StaticKeys::none());

    let mut request = ChatRequest::from_text("hi");
    request
        .session_credentials
        .insert("gemini".to_string(), "user-key".to_string());
    let ctx = ctx().with_session_credentials(request.session_credentials.clone());

    let reply = h.state.pipeline.respond(&ctx, &cso(&h), &request).await.unwrap();
    assert_eq!(reply.response, "hello there");
}

#[tokio::test]
async fn test_outer_timeout_returns_emergency_report() {
    let mut config = test_config();
    config.server.request_timeout_ms = 100;
    let provider = Arc::new(
        ScriptedProvider::new("gemini", 1)
            .with_delay(Duration::from_secs(2))
            .then_text("too late"),
    );
    let h = harness_with(config, vec![provider], StaticKeys::all());

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("system health?"))
        .await
        .unwrap();
    assert_eq!(reply.provider, EMERGENCY_PROVIDER);
    assert!(reply.response.contains("System Status"));
}

#[tokio::test]
async fn test_emergency_disabled_surfaces_classified_error() {
    let mut config = test_config();
    config.pipeline.emergency_fallback = false;
    let h = harness_with(
        config,
        vec![
            Arc::new(ScriptedProvider::new("a", 1).always(Err(quota()))),
            Arc::new(ScriptedProvider::new("b", 2).always(Err(rate_limited()))),
        ],
        StaticKeys::all(),
    );

    let err = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::RateLimited));
}

#[tokio::test]
async fn test_fallback_step_lowers_confidence() {
    let h = harness(vec![
        Arc::new(ScriptedProvider::new("a", 1).always(Err(server_error()))),
        Arc::new(ScriptedProvider::new("b", 2).then_text("answer from b")),
    ]);
    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("hi"))
        .await
        .unwrap();
    assert_eq!(reply.provider, "b");
    assert_eq!(reply.confidence, Some(85));
}

#[tokio::test]
async fn test_rate_limited_follow_up_skips_synthesis_call() {
    let provider = Arc::new(
        ScriptedProvider::new("gemini", 1)
            .then_tools(vec![ToolCall::new("c1", "list_tasks", "{}")])
            .then(Err(rate_limited()))
            .then_text("synthesized answer"),
    );
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("tasks?"))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 2);
    assert!(reply.response.starts_with("list_tasks: "));
    assert_ne!(reply.response, "synthesized answer");
}

#[tokio::test]
async fn test_rate_limited_provider_is_not_retried_on_follow_up() {
    let limited = Arc::new(
        ScriptedProvider::new("gemini", 1)
            .then(Err(rate_limited()))
            .then_text("should not be asked again"),
    );
    let healthy = Arc::new(
        ScriptedProvider::new("deepseek", 2)
            .then_tools(vec![ToolCall::new("c1", "get_mining_stats", "{}")])
            .then_text("Hashrate is 1500."),
    );
    let h = harness(vec![limited.clone(), healthy.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("hashrate?"))
        .await
        .unwrap();

    assert_eq!(reply.response, "Hashrate is 1500.");
    assert_eq!(limited.call_count(), 1);
    assert_eq!(healthy.call_count(), 2);
    assert_eq!(healthy.calls()[1].options.exclude_providers, vec!["gemini".to_string()]);
}

#[tokio::test]
async fn test_announced_action_after_tools_is_a_final_answer() {
    let answer = "Hashrate is 1500 H/s. I'll check the payout again tomorrow.";
    let provider = ScriptedProvider::new("gemini", 1);
    let closing = provider.text(answer);
    let provider = Arc::new(
        provider
            .then_tools(vec![ToolCall::new("c1", "get_mining_stats", "{}")])
            .always(Ok(closing)),
    );
    let h = harness(vec![provider.clone()]);

    let reply = h
        .state
        .pipeline
        .respond(&ctx(), &cso(&h), &ChatRequest::from_text("how is mining?"))
        .await
        .unwrap();

    assert_eq!(reply.response, answer);
    assert_eq!(reply.tool_calls_executed, 1);
    assert_eq!(logged(&h.tool_log), vec!["get_mining_stats"]);
    assert_eq!(provider.call_count(), 2);
}
