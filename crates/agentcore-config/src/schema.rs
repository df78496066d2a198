// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Top-level configuration tree, assembled from a layered YAML load (see
/// [`crate::load`]) and overridable by environment variables at the call
/// sites that consume each field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default)]
    pub tools: ToolConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier. "mock" is the only provider this crate ships a
    /// full implementation for; anything else is a configuration-time
    /// placeholder for a provider plugged in at the `ModelProvider` seam.
    pub provider: String,
    pub name: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            name: "mock-1".into(),
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    200
}

/// Agent-loop tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Safety cap on steps per turn (open-ended in spirit; bounded in practice).
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// `GPTME_BREAK_ON_TOOLUSE`: true = single-tool mode (default), false = multi-tool.
    #[serde(default = "default_true")]
    pub break_on_tooluse: bool,
    /// Whether the loop runs non-interactively (autonomous / CI mode).
    #[serde(default)]
    pub interactive: bool,
    /// `GPTME_SHELL_TIMEOUT`: per-command shell timeout in seconds, 0 = disabled.
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
}

fn default_shell_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            break_on_tooluse: true,
            interactive: false,
            shell_timeout_secs: default_shell_timeout(),
        }
    }
}

/// `HOOK_ALLOWLIST`: when `Some`, replaces the default hook set entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    pub allowlist: Option<Vec<String>>,
}

/// `TOOL_ALLOWLIST` / `TOOL_MODULES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub modules: Vec<String>,
    /// Glob patterns auto-approved without prompting (shell tool, etc).
    #[serde(default = "default_auto_approve")]
    pub auto_approve_patterns: Vec<String>,
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
}

fn default_auto_approve() -> Vec<String> {
    vec!["ls *".into(), "cat *".into(), "grep *".into(), "pwd".into()]
}

fn default_deny_patterns() -> Vec<String> {
    vec!["rm -rf /*".into(), "dd if=*".into()]
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            allowlist: None,
            modules: Vec::new(),
            auto_approve_patterns: default_auto_approve(),
            deny_patterns: default_deny_patterns(),
        }
    }
}

/// Server-mode rendezvous configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Seconds a pending confirmation/elicitation waits before timing out.
    #[serde(default = "default_rendezvous_timeout")]
    pub rendezvous_timeout_secs: u64,
}

fn default_rendezvous_timeout() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8232".into(),
            rendezvous_timeout_secs: default_rendezvous_timeout(),
        }
    }
}
