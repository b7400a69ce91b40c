//! Expected argument schemas
//!
//! A small static lookup of the argument shapes models most often get wrong.
//! When argument parsing fails, the executor embeds the documented schema in
//! the error so the next model turn can retry with the right shape.

use suite_gateway_llm::types::ParameterSchema;

/// Tool name -> compact schema shown to the model.
const KNOWN_SCHEMAS: &[(&str, &str)] = &[
    (
        "execute_python",
        r#"{"code": "string (required, Python source to run)", "purpose": "string (short description of what the code does)"}"#,
    ),
    ("get_mining_stats", r#"{"period": "string (optional, e.g. \"24h\")"}"#),
    ("get_system_status", r#"{}"#),
    ("list_agents", r#"{"status": "string (optional: active|idle|all)"}"#),
    (
        "list_tasks",
        r#"{"status": "string (optional: pending|in_progress|completed)", "limit": "integer (optional)"}"#,
    ),
    (
        "create_task",
        r#"{"title": "string (required)", "description": "string (required)", "priority": "integer (optional, 1-10)", "assignee": "string (optional)"}"#,
    ),
    (
        "assign_task",
        r#"{"task_id": "string (required)", "agent_id": "string (required)"}"#,
    ),
    (
        "search_knowledge",
        r#"{"query": "string (required)", "limit": "integer (optional)"}"#,
    ),
    (
        "send_notification",
        r#"{"channel": "string (required)", "message": "string (required)"}"#,
    ),
];

/// Documented schema for a tool, if it is one of the well-known ones.
pub fn known_schema(tool_name: &str) -> Option<&'static str> {
    KNOWN_SCHEMAS
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, schema)| *schema)
}

/// Render the schema to embed in an argument error.
///
/// Falls back to the registered parameter schema, then to a generic hint.
pub fn expected_schema(tool_name: &str, registered: Option<&ParameterSchema>) -> String {
    if let Some(schema) = known_schema(tool_name) {
        return schema.to_string();
    }
    match registered {
        Some(schema) => render_parameter_schema(schema),
        None => "a JSON object of named arguments".to_string(),
    }
}

/// Compact `{"name": "type (required)"}` rendering of a parameter schema.
pub fn render_parameter_schema(schema: &ParameterSchema) -> String {
    let properties = match schema.properties.as_ref() {
        Some(p) if !p.is_empty() => p,
        _ => return "{}".to_string(),
    };
    let required = schema.required_names();

    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();

    let mut map = serde_json::Map::new();
    for name in names {
        let prop = &properties[name];
        let marker = if required.contains(name) {
            "required"
        } else {
            "optional"
        };
        map.insert(
            name.clone(),
            serde_json::Value::String(format!("{} ({})", prop.schema_type, marker)),
        );
    }
    serde_json::Value::Object(map).to_string()
}
