//! Provider cascade: ordering, fast-fail, breaker windows, aggregate errors.

use std::sync::{Arc, Mutex};

use suite_gateway::CascadeError;
use suite_gateway_llm::{CanonicalMessage, CompletionOptions, FailureKind};

use crate::support::*;

fn messages() -> Vec<CanonicalMessage> {
    vec![CanonicalMessage::user("hello")]
}

#[tokio::test]
async fn test_attempts_follow_priority_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let providers = vec![
        Arc::new(ScriptedProvider::new("third", 3).with_order_log(order.clone()).always(Err(server_error()))),
        Arc::new(ScriptedProvider::new("first", 1).with_order_log(order.clone()).always(Err(server_error()))),
        Arc::new(ScriptedProvider::new("second", 2).with_order_log(order.clone()).always(Err(server_error()))),
    ];
    let h = harness(providers);

    let err = h
        .state
        .pipeline
        .orchestrator()
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(logged(&order), vec!["first", "second", "third"]);
    let failed: Vec<&str> = err.failures().iter().map(|f| f.provider.as_str()).collect();
    assert_eq!(failed, vec!["first", "second", "third"]);
    assert!(err.failures().iter().all(|f| f.kind == FailureKind::ServiceUnavailable));
}

#[tokio::test]
async fn test_prefer_provider_moves_to_front() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::new(ScriptedProvider::new("first", 1).with_order_log(order.clone()).always(Err(server_error())));
    let second = ScriptedProvider::new("second", 2).with_order_log(order.clone());
    let reply = second.text("from second");
    let second = Arc::new(second.always(Ok(reply)));
    let h = harness(vec![first.clone(), second]);

    let (result, _log) = h
        .state
        .pipeline
        .orchestrator()
        .execute(&ctx(), &messages(), &CompletionOptions::default().prefer("second"))
        .await
        .unwrap();

    assert_eq!(result.provider, "second");
    assert_eq!(result.metadata.fallback_attempt, 1);
    assert_eq!(first.call_count(), 0);
    assert_eq!(logged(&order), vec!["second"]);
}

#[tokio::test]
async fn test_quota_and_rate_limit_are_attempted_exactly_once() {
    let exhausted = Arc::new(ScriptedProvider::new("exhausted", 1).always(Err(quota())));
    let limited = Arc::new(ScriptedProvider::new("limited", 2).always(Err(rate_limited())));
    let healthy = ScriptedProvider::new("healthy", 3);
    let reply = healthy.text("ok");
    let healthy = Arc::new(healthy.always(Ok(reply)));
    let h = harness(vec![exhausted.clone(), limited.clone(), healthy.clone()]);
    let orchestrator = h.state.pipeline.orchestrator();

    let (result, log) = orchestrator
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.provider, "healthy");
    assert_eq!(result.metadata.fallback_attempt, 3);
    assert_eq!(exhausted.call_count(), 1);
    assert_eq!(limited.call_count(), 1);
    assert_eq!(log.failed_attempts_count(), 2);

    // The exhausted provider stays out of later cascades until its cooldown ends.
    orchestrator
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(exhausted.call_count(), 1);
    assert_eq!(limited.call_count(), 2);
}

#[tokio::test]
async fn test_breaker_opens_and_resets_after_window() {
    let flaky = ScriptedProvider::new("flaky", 1);
    let recovered = flaky.text("recovered");
    let flaky = Arc::new(
        flaky
            .then(Err(server_error()))
            .then(Err(server_error()))
            .then(Err(server_error()))
            .then(Err(server_error()))
            .then(Err(server_error()))
            .always(Ok(recovered)),
    );
    let backup = ScriptedProvider::new("backup", 2);
    let reply = backup.text("backup answer");
    let backup = Arc::new(backup.always(Ok(reply)));
    let h = harness(vec![flaky.clone(), backup]);
    let orchestrator = h.state.pipeline.orchestrator();

    for _ in 0..5 {
        let (result, _) = orchestrator
            .execute(&ctx(), &messages(), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(result.provider, "backup");
    }
    assert_eq!(orchestrator.breaker().state("flaky").failure_count, 5);
    assert!(!orchestrator.breaker().is_available("flaky"));

    // Open: skipped without a call.
    orchestrator
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(flaky.call_count(), 5);

    h.clock.advance(chrono::Duration::seconds(301));
    let (result, _) = orchestrator
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.provider, "flaky");
    assert_eq!(flaky.call_count(), 6);
    assert_eq!(orchestrator.breaker().state("flaky").failure_count, 0);
}

#[tokio::test]
async fn test_all_exhausted_reports_every_provider() {
    let h = harness(vec![
        Arc::new(ScriptedProvider::new("a", 1).always(Err(quota()))),
        Arc::new(ScriptedProvider::new("b", 2).always(Err(quota()))),
    ]);

    let err = h
        .state
        .pipeline
        .orchestrator()
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CascadeError::AllProvidersExhausted { .. }));
    assert_eq!(err.failures().len(), 2);
    assert_eq!(err.dominant_kind(), Some(FailureKind::TokenExhausted));
    let message = err.to_string();
    assert!(message.contains("a [token_exhausted]"));
    assert!(message.contains("b [token_exhausted]"));
}

#[tokio::test]
async fn test_provider_timeout_falls_through() {
    let slow = Arc::new(
        ScriptedProvider::new("slow", 1)
            .with_timeout_ms(50)
            .with_delay(std::time::Duration::from_millis(500))
            .always(Err(server_error())),
    );
    let fast = ScriptedProvider::new("fast", 2);
    let reply = fast.text("quick");
    let fast = Arc::new(fast.always(Ok(reply)));
    let h = harness(vec![slow, fast]);

    let (result, log) = h
        .state
        .pipeline
        .orchestrator()
        .execute(&ctx(), &messages(), &CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.provider, "fast");
    assert_eq!(log.attempts[0].failure_kind, Some(FailureKind::Timeout));
}
