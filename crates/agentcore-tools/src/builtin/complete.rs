// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentcore_hooks::{HookArgs, HookError, HookRegistry, HookType};
use agentcore_model::{Role, ToolUse};

use crate::parse::{extract_fenced, BlockTypeMap};
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolOutput};

const BLOCK_TYPES: BlockTypeMap = BlockTypeMap(&[("complete", "complete")]);

/// Lets the assistant end the conversation on its own terms instead of
/// waiting for the step loop to run out of tool uses. A `complete` fenced
/// block in the latest assistant message is the model's way of saying "I'm
/// done"; the `generation.pre` hook registered in [`CompleteTool::new`]
/// notices it before the next round of generation would otherwise start and
/// raises `HookError::SessionComplete` to unwind the loop.
pub struct CompleteTool;

impl CompleteTool {
    /// Registers the completion-detecting hook against `hooks` and returns
    /// the tool itself. Priority 1000 so it runs ahead of any
    /// ordinarily-prioritized `generation.pre` hook. `enabled` gates the hook
    /// on the `builtin.complete` name per the hook allow-list (the hook is
    /// still registered either way, just inert when disabled, matching
    /// `HookRegistry::register`'s own enable/disable model).
    pub fn new(hooks: &HookRegistry, enabled: bool) -> Self {
        hooks.register(
            "builtin.complete",
            HookType::GenerationPre,
            |args| {
                let HookArgs::GenerationPre { messages } = args else { return Ok(vec![]) };
                let Some(last) = messages.iter().rev().find(|m| m.role == Role::Assistant) else {
                    return Ok(vec![]);
                };
                let Some(text) = last.as_text() else { return Ok(vec![]) };
                let uses = extract_fenced(text, &BLOCK_TYPES);
                if uses.iter().any(|u| u.tool == "complete") {
                    return Err(HookError::SessionComplete);
                }
                Ok(vec![])
            },
            1000,
            enabled,
            false,
        );
        Self
    }
}

#[async_trait]
impl Tool for CompleteTool {
    fn name(&self) -> &str {
        "complete"
    }

    fn description(&self) -> &str {
        "Signal that the task is finished and no further turns are needed. Usage: a fenced \
         `complete` block (body is ignored)."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        ToolOutput::ok(tool_use.call_id.clone().unwrap_or_default(), "session marked complete")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_model::Message;

    #[tokio::test]
    async fn execute_reports_success() {
        let tool = CompleteTool::new(&HookRegistry::new(), true);
        let mut tu = ToolUse::new("complete", "", 0);
        tu.call_id = Some("c1".into());
        let out = tool.execute(&tu).await;
        assert!(!out.is_error);
    }

    #[test]
    fn generation_pre_raises_session_complete_when_assistant_used_complete_block() {
        let hooks = HookRegistry::new();
        let _tool = CompleteTool::new(&hooks, true);
        let messages = vec![Message::assistant("all done\n```complete\n```\n")];
        let result = hooks.trigger(HookArgs::GenerationPre { messages });
        assert!(matches!(result, Err(HookError::SessionComplete)));
    }

    #[test]
    fn generation_pre_is_a_noop_without_a_complete_block() {
        let hooks = HookRegistry::new();
        let _tool = CompleteTool::new(&hooks, true);
        let messages = vec![Message::assistant("still working")];
        let result = hooks.trigger(HookArgs::GenerationPre { messages });
        assert!(result.is_ok());
    }

    #[test]
    fn generation_pre_ignores_complete_blocks_in_user_messages() {
        let hooks = HookRegistry::new();
        let _tool = CompleteTool::new(&hooks, true);
        let messages = vec![Message::user("```complete\n```"), Message::assistant("not done yet")];
        let result = hooks.trigger(HookArgs::GenerationPre { messages });
        assert!(result.is_ok());
    }

    #[test]
    fn generation_pre_is_a_noop_when_hook_disabled_by_allowlist() {
        let hooks = HookRegistry::new();
        let _tool = CompleteTool::new(&hooks, false);
        let messages = vec![Message::assistant("all done\n```complete\n```\n")];
        let result = hooks.trigger(HookArgs::GenerationPre { messages });
        assert!(result.is_ok());
    }
}
