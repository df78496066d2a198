// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Runtime context for an agent session: values established once at
//! construction time and held for the session's lifetime, separate from
//! [`agentcore_config::Config`], which holds only config-file fields.
use std::path::PathBuf;

/// The workspace a conversation's shell/save/patch tools operate against,
/// and any directory it should be persisted under (§4.3 "workspace & shell
/// state", §3 "ownership rules" — `ShellSession` is owned by the conversation
/// that created this context).
#[derive(Debug, Clone, Default)]
pub struct AgentRuntimeContext {
    /// Working directory tool invocations execute relative to.
    pub workspace: PathBuf,
    /// On-disk directory the conversation's `LogManager` persists into.
    /// `None` runs the session in-memory only (e.g. `run` one-shot mode).
    pub log_dir: Option<PathBuf>,
}

impl AgentRuntimeContext {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self { workspace: workspace.into(), log_dir: None }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}
