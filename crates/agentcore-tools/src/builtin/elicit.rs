// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentcore_hooks::{
    ElicitRegistry, ElicitationField, ElicitationRequest, ElicitationResponse, ElicitationType,
};
use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolOutput};

/// Lets the assistant request structured input from the user (§4.5). The
/// block body is a JSON spec `{"type", "prompt", "options"?, "fields"?,
/// "default"?, "description"?}`; dispatch is delegated to the context's
/// [`ElicitRegistry`], whose fall-through hooks decide how the prompt is
/// actually surfaced (CLI terminal prompt, server-mode SSE round-trip).
///
/// Disabled by default: the `elicit` language tag collides with nothing in
/// particular, but a model should only reach for structured elicitation when
/// the surrounding context explicitly offers it, matching the
/// language-tag-ambiguity rule every optional tool follows.
pub struct ElicitTool {
    elicit: Arc<ElicitRegistry>,
}

impl ElicitTool {
    pub fn new(elicit: Arc<ElicitRegistry>) -> Self {
        Self { elicit }
    }
}

fn parse_spec(code: &str) -> Result<ElicitationRequest, String> {
    let spec: Value = serde_json::from_str(code).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(spec) = spec else {
        return Err("elicitation spec must be a JSON object".to_string());
    };

    let type_str = spec.get("type").and_then(Value::as_str).unwrap_or("text");
    let elicit_type = match type_str {
        "text" => ElicitationType::Text,
        "choice" => ElicitationType::Choice,
        "multi_choice" => ElicitationType::MultiChoice,
        "secret" => ElicitationType::Secret,
        "confirmation" => ElicitationType::Confirmation,
        "form" => ElicitationType::Form,
        other => return Err(format!("invalid elicitation type '{other}'")),
    };

    let prompt = spec.get("prompt").and_then(Value::as_str).unwrap_or("").to_string();
    if prompt.is_empty() {
        return Err("elicitation spec missing 'prompt'".to_string());
    }

    let options = spec.get("options").and_then(Value::as_array).map(|arr| {
        arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
    });

    let fields = if elicit_type == ElicitationType::Form {
        spec.get("fields").and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_object)
                .map(|f| ElicitationField {
                    name: f.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                    sub_type: f.get("type").and_then(Value::as_str).unwrap_or("text").to_string(),
                    required: f.get("required").and_then(Value::as_bool).unwrap_or(true),
                    default: f.get("default").and_then(Value::as_str).map(str::to_string),
                })
                .collect::<Vec<_>>()
        })
    } else {
        None
    };

    let default = spec.get("default").and_then(Value::as_str).map(str::to_string);
    let description = spec.get("description").and_then(Value::as_str).map(str::to_string);
    let sensitive = elicit_type == ElicitationType::Secret;

    Ok(ElicitationRequest { elicit_type, prompt, options, fields, default, description, sensitive })
}

/// Renders the elicitation outcome into the tool-result text, mirroring the
/// original per-type phrasing (`"User selected: ..."`, `"Form submitted:
/// ..."`, etc.) and marks the output sensitive when the secret's value is
/// actually disclosed.
fn render_response(request: &ElicitationRequest, response: &ElicitationResponse) -> (String, bool) {
    if response.cancelled {
        return ("elicitation cancelled by user".to_string(), false);
    }

    if response.sensitive || request.elicit_type == ElicitationType::Secret {
        return match &response.value {
            Some(value) => (format!("Secret value provided by user: {value}"), true),
            None => ("User provided secret value (not shown)".to_string(), false),
        };
    }

    if let Some(values) = &response.values {
        let joined = if values.is_empty() { "(none selected)".to_string() } else { values.join(", ") };
        return (format!("User selected: {joined}"), false);
    }

    match request.elicit_type {
        ElicitationType::Form => {
            let text = response.value.clone().unwrap_or_default();
            match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => {
                    let pretty = serde_json::to_string_pretty(&parsed).unwrap_or(text);
                    (format!("Form submitted:\n```json\n{pretty}\n```"), false)
                }
                Err(_) => (format!("Form submitted: {text}"), false),
            }
        }
        ElicitationType::Confirmation => {
            (format!("User confirmed: {}", response.value.clone().unwrap_or_default()), false)
        }
        _ => (format!("User input: {}", response.value.clone().unwrap_or_default()), false),
    }
}

#[async_trait]
impl Tool for ElicitTool {
    fn name(&self) -> &str {
        "elicit"
    }

    fn description(&self) -> &str {
        "Request structured input from the user (text, choice, multi_choice, secret, \
         confirmation, form). Body is a JSON spec with 'type' and 'prompt'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "string",
                    "description": "JSON elicitation spec with 'type', 'prompt', and optional 'options'/'fields'"
                }
            },
            "required": ["spec"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    /// One tool answers three distinct fenced-block tags: `choice` and
    /// `form` are just elicitation specs with `type` pre-filled by the tag,
    /// so all three resolve to this same handler rather than three
    /// near-identical tools.
    fn block_types(&self) -> Vec<&str> {
        vec!["elicit", "form", "choice"]
    }

    fn disabled_by_default(&self) -> bool {
        true
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        let call_id = tool_use.call_id.clone().unwrap_or_default();
        let code = tool_use.content.trim();
        if code.is_empty() {
            return ToolOutput::err(call_id, "no elicitation spec provided");
        }

        let request = match parse_spec(code) {
            Ok(req) => req,
            Err(msg) => {
                return ToolOutput::err(call_id, format!("invalid elicitation spec: {msg}"));
            }
        };

        let response = self.elicit.request(&request);
        let (text, sensitive) = render_response(&request, &response);
        let output = ToolOutput::ok(call_id, text);
        if sensitive {
            output.mark_sensitive()
        } else {
            output
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tu(spec: Value) -> ToolUse {
        let mut tu = ToolUse::new("elicit", spec.to_string(), 0);
        tu.call_id = Some("c1".into());
        tu
    }

    #[tokio::test]
    async fn choice_response_is_not_sensitive() {
        let elicit = Arc::new(ElicitRegistry::new());
        elicit.register("test", 0, |_| Some(ElicitationResponse::value("PostgreSQL", false)));
        let tool = ElicitTool::new(elicit);
        let out = tool.execute(&tu(json!({"type": "choice", "prompt": "db?", "options": ["PostgreSQL", "SQLite"]}))).await;
        assert!(!out.is_error);
        assert!(!out.sensitive);
        assert_eq!(out.content, "User input: PostgreSQL");
    }

    #[tokio::test]
    async fn secret_response_is_marked_sensitive() {
        let elicit = Arc::new(ElicitRegistry::new());
        elicit.register("test", 0, |_| Some(ElicitationResponse::value("sk-abc123", true)));
        let tool = ElicitTool::new(elicit);
        let out = tool.execute(&tu(json!({"type": "secret", "prompt": "API key?"}))).await;
        assert!(out.sensitive);
        assert!(out.content.contains("sk-abc123"));
    }

    #[tokio::test]
    async fn secret_without_value_is_not_sensitive_and_says_not_shown() {
        let elicit = Arc::new(ElicitRegistry::new());
        elicit.register("test", 0, |_| Some(ElicitationResponse { value: None, values: None, cancelled: false, sensitive: true }));
        let tool = ElicitTool::new(elicit);
        let out = tool.execute(&tu(json!({"type": "secret", "prompt": "API key?"}))).await;
        assert!(!out.sensitive);
        assert_eq!(out.content, "User provided secret value (not shown)");
    }

    #[tokio::test]
    async fn cancelled_response_is_reported() {
        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        let out = tool.execute(&tu(json!({"type": "text", "prompt": "name?"}))).await;
        assert_eq!(out.content, "elicitation cancelled by user");
    }

    #[tokio::test]
    async fn invalid_json_is_reported_as_error() {
        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        let mut use_ = ToolUse::new("elicit", "not json".to_string(), 0);
        use_.call_id = Some("c1".into());
        let out = tool.execute(&use_).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_prompt_is_reported_as_error() {
        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        let out = tool.execute(&tu(json!({"type": "text"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn form_response_pretty_prints_json() {
        let elicit = Arc::new(ElicitRegistry::new());
        elicit.register("test", 0, |_| Some(ElicitationResponse::value(r#"{"name":"demo"}"#, false)));
        let tool = ElicitTool::new(elicit);
        let out = tool
            .execute(&tu(json!({"type": "form", "prompt": "setup", "fields": [{"name": "name", "type": "text"}]})))
            .await;
        assert!(out.content.starts_with("Form submitted:\n```json"));
        assert!(out.content.contains("\"demo\""));
    }

    #[test]
    fn disabled_by_default() {
        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        assert!(tool.disabled_by_default());
    }

    #[test]
    fn block_types_covers_elicit_form_and_choice() {
        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        assert_eq!(tool.block_types(), vec!["elicit", "form", "choice"]);
    }

    #[test]
    fn choice_tagged_fence_resolves_to_elicit_tool() {
        use crate::parse::{extract_fenced, BlockTypeMap};

        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        let pairs: Vec<(&str, &str)> = tool.block_types().into_iter().map(|tag| (tag, tool.name())).collect();
        let map = BlockTypeMap(&pairs);

        let msg = "```choice\n{\"type\": \"choice\", \"prompt\": \"db?\", \"options\": [\"a\", \"b\"]}\n```";
        let uses = extract_fenced(msg, &map);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool, "elicit");
        assert!(uses[0].content.contains("\"choice\""));
    }

    #[test]
    fn form_tagged_fence_resolves_to_elicit_tool() {
        use crate::parse::{extract_fenced, BlockTypeMap};

        let tool = ElicitTool::new(Arc::new(ElicitRegistry::new()));
        let pairs: Vec<(&str, &str)> = tool.block_types().into_iter().map(|tag| (tag, tool.name())).collect();
        let map = BlockTypeMap(&pairs);

        let msg = "```form\n{\"type\": \"form\", \"prompt\": \"setup\", \"fields\": []}\n```";
        let uses = extract_fenced(msg, &map);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool, "elicit");
    }
}
