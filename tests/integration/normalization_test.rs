//! Wire-format normalization into the shared `GatewayResult` shape.

use suite_gateway_llm::{gemini, openai, ProviderDescriptor, WireFormat};

#[test]
fn gemini_function_call_becomes_tool_call() {
    let descriptor = ProviderDescriptor::new(
        "gemini",
        WireFormat::Gemini,
        "https://example/{model}",
        "gemini-2.0-flash",
        1,
    );
    let body = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"get_mining_stats","args":{}}}]}}]}"#;

    let result = gemini::parse_response(&descriptor, body).unwrap();
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].function.name, "get_mining_stats");
    assert_eq!(result.tool_calls[0].function.arguments, "{}");
    assert!(!result.tool_calls[0].id.is_empty());
    assert!(result.content.is_none());
}

#[test]
fn openai_and_gemini_agree_on_the_same_call() {
    let oa = ProviderDescriptor::new("deepseek", WireFormat::OpenAI, "https://example", "ds", 2);
    let openai_body = r#"{
        "choices": [{
            "message": {
                "content": null,
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "list_tasks", "arguments": "{\"status\":\"pending\"}"}}]
            },
            "finish_reason": "tool_calls"
        }]
    }"#;
    let gm = ProviderDescriptor::new("gemini", WireFormat::Gemini, "https://example", "g", 1);
    let gemini_body = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"list_tasks","args":{"status":"pending"}}}]}}]}"#;

    let a = openai::parse_response(&oa, openai_body).unwrap();
    let b = gemini::parse_response(&gm, gemini_body).unwrap();
    assert_eq!(a.tool_calls[0].name(), b.tool_calls[0].name());
    let args_a: serde_json::Value = serde_json::from_str(a.tool_calls[0].arguments()).unwrap();
    let args_b: serde_json::Value = serde_json::from_str(b.tool_calls[0].arguments()).unwrap();
    assert_eq!(args_a, args_b);
}

#[test]
fn empty_success_body_is_malformed() {
    let descriptor = ProviderDescriptor::new("kimi", WireFormat::OpenAI, "https://example", "k", 4);
    let err = openai::parse_response(&descriptor, r#"{"choices":[{"message":{"content":""}}]}"#).unwrap_err();
    assert_eq!(err.kind(), suite_gateway_llm::FailureKind::MalformedResponse);
}
