// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use agentcore_hooks::{HookArgs, HookRegistry, HookType, HookYield};
use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolOutput};

/// Re-execs the current process, preserving its command line so the
/// conversation it was invoked from resumes. Used to pick up configuration
/// changes or reloaded tool modules without leaving the terminal.
///
/// The actual re-exec only happens from the `generation.pre` hook
/// registered in [`RestartTool::new`], not from [`Tool::execute`] itself —
/// `execute` only arms a flag, so the confirmation gate that already ran
/// before it is what authorizes the restart, and the process only goes away
/// once the in-flight turn has finished producing its tool-result message.
pub struct RestartTool {
    confirmed: Arc<AtomicBool>,
}

impl RestartTool {
    /// `enabled` gates the `builtin.restart` hook on the hook allow-list, the
    /// same knob [`CompleteTool::new`](crate::CompleteTool::new) takes for
    /// `builtin.complete`.
    pub fn new(hooks: &HookRegistry, enabled: bool) -> Self {
        let confirmed = Arc::new(AtomicBool::new(false));
        let flag = confirmed.clone();
        hooks.register(
            "builtin.restart",
            HookType::GenerationPre,
            move |_args| {
                if flag.swap(false, Ordering::SeqCst) {
                    info!("restarting process");
                    exec_self();
                }
                Ok(Vec::<HookYield>::new())
            },
            1000,
            enabled,
            false,
        );
        Self { confirmed }
    }
}

#[cfg(unix)]
fn exec_self() -> ! {
    use std::os::unix::process::CommandExt;
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "agentcore".to_string());
    let err = std::process::Command::new(program).args(args).exec();
    panic!("failed to re-exec process: {err}");
}

#[cfg(not(unix))]
fn exec_self() -> ! {
    panic!("process restart is only supported on unix targets");
}

#[async_trait]
impl Tool for RestartTool {
    fn name(&self) -> &str {
        "restart"
    }

    fn description(&self) -> &str {
        "Restart the agent process, preserving its command line. Usage: a fenced `restart` block \
         (body is ignored). Takes effect once the current turn finishes."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        self.confirmed.store(true, Ordering::SeqCst);
        ToolOutput::ok(tool_use.call_id.clone().unwrap_or_default(), "restart scheduled after this turn")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_arms_the_confirmed_flag() {
        let hooks = HookRegistry::new();
        let tool = RestartTool::new(&hooks, true);
        assert!(!tool.confirmed.load(Ordering::SeqCst));
        let mut tu = ToolUse::new("restart", "", 0);
        tu.call_id = Some("c1".into());
        let out = tool.execute(&tu).await;
        assert!(!out.is_error);
        assert!(tool.confirmed.load(Ordering::SeqCst));
    }

    #[test]
    fn generation_pre_is_a_noop_when_not_confirmed() {
        let hooks = HookRegistry::new();
        let _tool = RestartTool::new(&hooks, true);
        let result = hooks.trigger(HookArgs::GenerationPre { messages: vec![] });
        assert!(result.is_ok());
    }

    #[test]
    fn generation_pre_is_a_noop_when_hook_disabled_by_allowlist() {
        let hooks = HookRegistry::new();
        let tool = RestartTool::new(&hooks, false);
        tool.confirmed.store(true, Ordering::SeqCst);
        let result = hooks.trigger(HookArgs::GenerationPre { messages: vec![] });
        assert!(result.is_ok());
    }
}
