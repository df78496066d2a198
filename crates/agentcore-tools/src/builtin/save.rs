// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentcore_hooks::{HookArgs, HookRegistry};
use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolOutput};

/// Writes a whole file to disk. Fires `file.pre_save`/`file.post_save`
/// around the write, the way the turn loop fires `tool.execute.pre/post`
/// around a tool call — this tool is just a second, file-scoped hook point.
pub struct SaveTool {
    hooks: Option<Arc<HookRegistry>>,
}

impl SaveTool {
    pub fn new(hooks: Option<Arc<HookRegistry>>) -> Self {
        Self { hooks }
    }
}

fn resolve_path(tool_use: &ToolUse) -> Option<PathBuf> {
    tool_use.args.first().map(PathBuf::from).or_else(|| tool_use.kwargs.get("path").map(PathBuf::from))
}

#[async_trait]
impl Tool for SaveTool {
    fn name(&self) -> &str {
        "save"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file with the given content. Usage: a fenced `save <path>` block \
         whose body is the full file content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to write" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        let call_id = tool_use.call_id.clone().unwrap_or_default();
        let Some(path) = resolve_path(tool_use) else {
            return ToolOutput::err(call_id, "no path provided to the save tool");
        };

        let mut content = tool_use.content.clone();
        if !content.ends_with('\n') {
            content.push('\n');
        }

        if let Some(hooks) = &self.hooks {
            if let Err(e) = hooks.trigger(HookArgs::FileSavePre { path: path.clone(), content: content.clone() }) {
                return ToolOutput::err(call_id, format!("save aborted by hook: {e}"));
            }
        }

        let created = !path.exists();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolOutput::err(call_id, format!("failed to create parent directory: {e}"));
                }
            }
        }
        if let Err(e) = tokio::fs::write(&path, &content).await {
            return ToolOutput::err(call_id, format!("failed to write {}: {e}", path.display()));
        }

        if let Some(hooks) = &self.hooks {
            let _ = hooks.trigger(HookArgs::FileSavePost { path: path.clone(), content, created });
        }

        ToolOutput::ok(call_id, format!("Saved to {}{}", path.display(), if created { " (created)" } else { " (overwritten)" }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tu(path: &str, content: &str) -> ToolUse {
        let mut t = ToolUse::new("save", content, 0);
        t.args = vec![path.to_string()];
        t.call_id = Some("c1".into());
        t
    }

    #[tokio::test]
    async fn writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.py");
        let tool = SaveTool::new(None);
        let out = tool.execute(&tu(path.to_str().unwrap(), "print(1)")).await;
        assert!(!out.is_error);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "print(1)\n");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "old").await.unwrap();
        let tool = SaveTool::new(None);
        let out = tool.execute(&tu(path.to_str().unwrap(), "new")).await;
        assert!(!out.is_error);
        assert!(out.content.contains("overwritten"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "new\n");
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/f.txt");
        let tool = SaveTool::new(None);
        let out = tool.execute(&tu(path.to_str().unwrap(), "x")).await;
        assert!(!out.is_error);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let tool = SaveTool::new(None);
        let mut t = ToolUse::new("save", "content", 0);
        t.call_id = Some("c1".into());
        let out = tool.execute(&t).await;
        assert!(out.is_error);
    }
}
