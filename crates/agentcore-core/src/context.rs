// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Context-local registries (§3 "ownership rules", §9 "context-local
//! registries"). Each logical execution context — a CLI run, an HTTP
//! request in server mode — owns one [`Context`]: its own hook registry,
//! tool registry, and confirmation/elicitation dispatchers. Nothing here is
//! thread-local; the value is threaded explicitly through the turn loop.
use std::sync::Arc;

use agentcore_config::Config;
use agentcore_hooks::{ConfirmMode, ConfirmRegistry, ElicitRegistry, HookRegistry};
use agentcore_tools::{
    CompleteTool, ElicitTool, PatchTool, RestartTool, SaveTool, ShellTool, Tool, ToolPolicy, ToolRegistry,
};
use tracing::warn;

use crate::cache::CacheTracker;

/// Identifiers threaded through a turn (§4.4 "context identifiers").
#[derive(Debug, Clone)]
pub struct ContextIds {
    pub conversation_id: String,
    pub session_id: String,
}

/// One execution context's full set of registries.
pub struct Context {
    pub ids: ContextIds,
    pub hooks: Arc<HookRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub confirm: Arc<ConfirmRegistry>,
    pub elicit: Arc<ElicitRegistry>,
    pub cache: Arc<CacheTracker>,
    pub policy: Arc<ToolPolicy>,
}

impl Context {
    /// Builds a fresh context: registers the built-in tools and hooks
    /// allowed by `config`, wires the per-tool allow-list as a `tool.confirm`
    /// fall-through hook, and chooses the mode-appropriate confirmation hook
    /// (`cli_confirm` / `server_confirm` / `auto_confirm`) per §4.1's
    /// "context locality" and §4.3's "confirmation service" sections.
    ///
    /// `cli_confirm`/`server_confirm` are supplied by the caller (CLI or
    /// server crate) since their I/O is transport-specific; this crate only
    /// owns the selection policy and the shell-tool allow-list hook.
    pub async fn new(
        ids: ContextIds,
        config: &Config,
        cli_confirm: impl Fn(&agentcore_model::ToolUse, Option<&str>) -> Option<agentcore_hooks::ConfirmationResult>
            + Send
            + Sync
            + 'static,
        server_confirm: impl Fn(&agentcore_model::ToolUse, Option<&str>) -> Option<agentcore_hooks::ConfirmationResult>
            + Send
            + Sync
            + 'static,
        mode: ConfirmMode,
    ) -> Self {
        let hooks = Arc::new(HookRegistry::new());
        let mut tool_registry = ToolRegistry::new();
        let confirm = Arc::new(ConfirmRegistry::new());
        let elicit = Arc::new(ElicitRegistry::new());
        let cache = Arc::new(CacheTracker::new());
        let policy = Arc::new(ToolPolicy::from_config(&config.tools));

        register_allowed_tools(&mut tool_registry, &hooks, &elicit, config);
        init_tools(&tool_registry).await;
        let tools = Arc::new(tool_registry);

        agentcore_hooks::init_confirm_hooks(&confirm, mode, cli_confirm, server_confirm);

        // Elevated-priority allow-list hook, generalizing `ToolPolicy::decide`
        // into the hook system rather than a bespoke gate bypassing it (§4.3).
        let policy_for_hook = policy.clone();
        confirm.register("tool_allowlist", 500, move |tool_use, _preview| {
            match policy_for_hook.decide(&tool_use.content) {
                agentcore_tools::ApprovalPolicy::Auto => {
                    Some(agentcore_hooks::ConfirmationResult::confirm())
                }
                agentcore_tools::ApprovalPolicy::Deny => {
                    Some(agentcore_hooks::ConfirmationResult::skip("denied by tool policy"))
                }
                agentcore_tools::ApprovalPolicy::Ask => None,
            }
        });

        Self { ids, hooks, tools, confirm, elicit, cache, policy }
    }
}

/// Loads the built-in tool set, honoring `config.tools.allowlist` (§8
/// invariant 3: loaded tools are exactly the allow-listed ones, in
/// dependency order, each initialized at most once). A tool whose
/// `available()` probe fails is skipped entirely rather than registered —
/// an unavailable tool has no business occupying a registry slot it can
/// still be directly dispatched to by name.
fn register_allowed_tools(
    registry: &mut ToolRegistry,
    hooks: &Arc<HookRegistry>,
    elicit: &Arc<ElicitRegistry>,
    config: &Config,
) {
    let allowed = |name: &str| match &config.tools.allowlist {
        Some(list) => list.iter().any(|a| a == name),
        None => true,
    };
    // `elicit` is disabled-by-default (§4.3's language-tag-ambiguity rule):
    // unlike the other built-ins it is loaded only when explicitly named in
    // the allow-list, never by an unset (allow-everything) allow-list.
    let explicitly_allowed =
        |name: &str| config.tools.allowlist.as_ref().is_some_and(|list| list.iter().any(|a| a == name));

    // `HOOK_ALLOWLIST` (spec §6 "comma-separated list of hooks to activate,
    // replaces defaults"): an unset allow-list activates every built-in hook,
    // same default-open shape as the tool allow-list above.
    let hook_enabled = |name: &str| match &config.hooks.allowlist {
        Some(list) => list.iter().any(|a| a == name),
        None => true,
    };

    register_if_available(registry, allowed("shell"), ShellTool::new(config.agent.shell_timeout_secs));
    register_if_available(registry, allowed("save"), SaveTool::new(Some(hooks.clone())));
    register_if_available(registry, allowed("patch"), PatchTool::new(Some(hooks.clone())));
    register_if_available(registry, allowed("complete"), CompleteTool::new(hooks, hook_enabled("builtin.complete")));
    register_if_available(registry, allowed("restart"), RestartTool::new(hooks, hook_enabled("builtin.restart")));
    register_if_available(registry, explicitly_allowed("elicit"), ElicitTool::new(elicit.clone()));

    if let Some(allowlist) = &config.hooks.allowlist {
        for name in allowlist {
            if name != "builtin.complete" && name != "builtin.restart" {
                warn!(hook = %name, "hook named in HOOK_ALLOWLIST is unknown; skipping");
            }
        }
    }

    if let Some(allowlist) = &config.tools.allowlist {
        for name in allowlist {
            if registry.get(name).is_none() {
                warn!(tool = %name, "tool named in allow-list is unknown; skipping");
            }
        }
    }
}

fn register_if_available(registry: &mut ToolRegistry, wanted: bool, tool: impl Tool + 'static) {
    if !wanted {
        return;
    }
    if !tool.available() {
        warn!(tool = %tool.name(), "tool is unavailable in this environment; skipping");
        return;
    }
    registry.register(tool);
}

/// `init_tools` (§4.3, §8 invariant 3): calls each registered tool's
/// one-time lazy setup exactly once. Failures are logged and otherwise
/// ignored (§4.1 "Failure model": registration/init failures log a warning
/// and never abort the rest of context construction).
async fn init_tools(registry: &ToolRegistry) {
    for name in registry.names() {
        if let Some(tool) = registry.get(&name) {
            if let Err(e) = tool.init().await {
                warn!(tool = %name, error = %e, "tool initialization failed");
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
