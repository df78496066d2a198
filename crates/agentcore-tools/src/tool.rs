// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;

/// A single content item in a rich tool output.
///
/// Most tools produce only `Text`. The `save`/`patch` tools and similar
/// produce exactly one `Text` part; a hypothetical image-producing tool
/// could mix `Text` and `Image`.
#[derive(Debug, Clone)]
pub enum ToolOutputPart {
    /// Plain UTF-8 text.
    Text(String),
    /// Base64 data URL: `data:<mime>;base64,<b64>`.
    Image(String),
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    /// Plain-text content — concatenation of all Text parts. Always set.
    pub content: String,
    pub parts: Vec<ToolOutputPart>,
    /// If true, the tool execution failed non-fatally (returned error message).
    pub is_error: bool,
    /// If true, the result is stamped `hide=true` on its message (§4.5): kept
    /// in the log and visible to the model, withheld from UI display. Set by
    /// tools like `elicit`'s `secret` type.
    pub sensitive: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let text = content.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: false,
            sensitive: false,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let text = msg.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: true,
            sensitive: false,
        }
    }

    /// Marks the output sensitive in place (builder-style). Used by `elicit`
    /// for `secret`-type results.
    pub fn mark_sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn has_images(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ToolOutputPart::Image(_)))
    }
}

/// Describes the shape of a tool's text output for context-aware truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Terminal / process output: keep the first and last N lines.
    HeadTail,
    /// Ordered match list: keep the leading matches.
    MatchList,
    /// File content: head/tail window with a separator.
    FileContent,
    /// Generic text: hard-truncate at the character boundary.
    #[default]
    Generic,
}

/// Trait that every built-in tool implements. A registered `Tool` is this
/// system's concrete stand-in for the spec's `ToolSpec`: the struct itself
/// carries `name`/`description`/`parameters`, and the trait methods below
/// cover `block_types`/`disabled_by_default`/`available`/`execute`/`init`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn default_policy(&self) -> ApprovalPolicy;

    /// Language tags recognized in fenced-code ToolUse extraction (§4.3
    /// grammar 1). Defaults to `[name()]`.
    fn block_types(&self) -> Vec<&str> {
        vec![self.name()]
    }

    /// Tools not loaded unless explicitly present in the tool allow-list
    /// (e.g. `form`/`choice`/`elicit`-tagged tools per §4.3's
    /// language-tag-ambiguity rule).
    fn disabled_by_default(&self) -> bool {
        false
    }

    /// Environment probe — false means "required binary/capability missing".
    fn available(&self) -> bool {
        true
    }

    /// True for tools that proxy to an external MCP server. This system
    /// does not implement an MCP transport (out of scope, §1); the marker
    /// exists so the registry's allow-list/availability contract is
    /// exercised the same way it would be for a real proxy tool.
    fn is_mcp(&self) -> bool {
        false
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    /// One-time lazy setup, called at most once per context by the registry.
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute the tool against a parsed invocation. Errors are wrapped in
    /// [`ToolOutput::err`] rather than returned as `Result` — a failed tool
    /// run is still a message the model sees, not a propagated error.
    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct MinimalTool;

    #[async_trait]
    impl Tool for MinimalTool {
        fn name(&self) -> &str {
            "minimal"
        }
        fn description(&self) -> &str {
            "a minimal tool"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn default_policy(&self) -> ApprovalPolicy {
            ApprovalPolicy::Auto
        }
        async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
            ToolOutput::ok(tool_use.call_id.clone().unwrap_or_default(), "ok")
        }
    }

    #[test]
    fn output_category_default_is_generic() {
        assert_eq!(OutputCategory::default(), OutputCategory::Generic);
    }

    #[test]
    fn tool_default_block_types_is_its_name() {
        assert_eq!(MinimalTool.block_types(), vec!["minimal"]);
    }

    #[test]
    fn tool_default_is_not_mcp_and_not_disabled() {
        assert!(!MinimalTool.is_mcp());
        assert!(!MinimalTool.disabled_by_default());
    }

    #[tokio::test]
    async fn minimal_tool_executes() {
        let tu = ToolUse::new("minimal", "", 0);
        let out = MinimalTool.execute(&tu).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "ok");
    }
}
