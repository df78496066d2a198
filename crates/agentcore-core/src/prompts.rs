// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds the system prompt placed at the start of every conversation: a
//! short operating preamble plus the registered tool catalogue, so the
//! model knows which fenced-code block types it can invoke (§4.3's
//! tool-discovery contract — `ToolRegistry::schemas()` is this system's
//! `get_tools()`).
use agentcore_tools::ToolRegistry;

const PREAMBLE: &str = "You are an autonomous coding and operations agent. \
You interact with your environment exclusively through the tools below, invoked as \
fenced code blocks whose language tag names the tool. Use `complete` to end the \
session once the user's request is fully satisfied.";

/// Renders the full system prompt from the currently loaded tool catalogue.
pub fn system_prompt(tools: &ToolRegistry) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\n\nAvailable tools:\n");
    for schema in tools.schemas() {
        out.push_str(&format!("- `{}`: {}\n", schema.name, schema.description));
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(agentcore_tools::ShellTool::new(30));
        let prompt = system_prompt(&registry);
        assert!(prompt.contains("`shell`"));
    }

    #[test]
    fn system_prompt_mentions_complete() {
        let registry = ToolRegistry::new();
        assert!(system_prompt(&registry).contains("`complete`"));
    }
}
