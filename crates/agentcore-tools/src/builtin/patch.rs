// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use agentcore_hooks::{HookArgs, HookRegistry};
use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolOutput};

const ORIGINAL_MARKER: &str = "<<<<<<< ORIGINAL";
const DIVIDER: &str = "=======";
const UPDATED_MARKER: &str = ">>>>>>> UPDATED";

/// One search/replace block parsed out of a patch body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PatchBlock {
    original: String,
    updated: String,
}

#[derive(Debug, PartialEq, Eq)]
enum ParseState {
    Outside,
    InOriginal,
    InUpdated,
}

/// Splits a patch body into ordered [`PatchBlock`]s.
///
/// Markers are matched as whole trimmed lines, which is what lets a
/// replacement body contain its own nested fenced codeblock (e.g. a
/// ` ```json ` sample) without its lines being mistaken for patch markers —
/// none of them happen to equal `=======` or the angle-bracket markers on
/// their own line.
fn parse_patch_blocks(body: &str) -> Result<Vec<PatchBlock>, String> {
    let mut blocks = Vec::new();
    let mut state = ParseState::Outside;
    let mut original_lines: Vec<&str> = Vec::new();
    let mut updated_lines: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim_end();
        match state {
            ParseState::Outside => {
                if trimmed == ORIGINAL_MARKER {
                    state = ParseState::InOriginal;
                    original_lines.clear();
                }
            }
            ParseState::InOriginal => {
                if trimmed == DIVIDER {
                    state = ParseState::InUpdated;
                    updated_lines.clear();
                } else {
                    original_lines.push(line);
                }
            }
            ParseState::InUpdated => {
                if trimmed == DIVIDER {
                    return Err(format!(
                        "extra {DIVIDER} marker found in patch block. Use only one {DIVIDER} per ORIGINAL/UPDATED pair"
                    ));
                } else if trimmed == UPDATED_MARKER {
                    blocks.push(PatchBlock { original: original_lines.join("\n"), updated: updated_lines.join("\n") });
                    state = ParseState::Outside;
                } else {
                    updated_lines.push(line);
                }
            }
        }
    }

    if state != ParseState::Outside {
        return Err(format!("unterminated patch block: missing {UPDATED_MARKER}"));
    }
    if blocks.is_empty() {
        return Err(format!("no {ORIGINAL_MARKER}/{UPDATED_MARKER} block found in patch body"));
    }
    Ok(blocks)
}

/// Builds a regex that matches `original` loosely: a line consisting solely
/// of `# ...` or `...` is treated as "skip any number of lines here", which
/// lets a patch block re-anchor on the lines around an elided body without
/// reproducing it verbatim.
fn placeholder_pattern(original: &str) -> Option<Regex> {
    let is_placeholder = |l: &str| { let t = l.trim(); t == "..." || t == "# ..." };
    if !original.lines().any(is_placeholder) {
        return None;
    }
    let mut pattern = String::new();
    for (i, line) in original.lines().enumerate() {
        if i > 0 {
            pattern.push_str("\\n");
        }
        if is_placeholder(line) {
            pattern.push_str("[\\s\\S]*?");
        } else {
            pattern.push_str(&regex::escape(line));
        }
    }
    Regex::new(&pattern).ok()
}

/// Applies every block in `body` to `content` in order, each replacing the
/// first remaining occurrence of its original text. Falls back to
/// placeholder matching (see [`placeholder_pattern`]) when an exact match
/// isn't found.
fn apply_patch(body: &str, content: &str) -> Result<String, String> {
    let blocks = parse_patch_blocks(body)?;
    let mut current = content.to_string();
    for block in &blocks {
        if let Some(pos) = current.find(&block.original) {
            current.replace_range(pos..pos + block.original.len(), &block.updated);
            continue;
        }
        if let Some(re) = placeholder_pattern(&block.original) {
            if let Some(m) = re.find(&current) {
                let (start, end) = (m.start(), m.end());
                current.replace_range(start..end, &block.updated);
                continue;
            }
        }
        return Err(format!("could not find the ORIGINAL text to replace:\n{}", block.original));
    }
    Ok(current)
}

/// Applies one or more search/replace blocks to an existing file. Fires
/// `file.patch.pre`/`file.patch.post` the same way [`super::save::SaveTool`]
/// fires its file-save hooks.
pub struct PatchTool {
    hooks: Option<Arc<HookRegistry>>,
}

impl PatchTool {
    pub fn new(hooks: Option<Arc<HookRegistry>>) -> Self {
        Self { hooks }
    }
}

fn resolve_path(tool_use: &ToolUse) -> Option<PathBuf> {
    tool_use.args.first().map(PathBuf::from).or_else(|| tool_use.kwargs.get("path").map(PathBuf::from))
}

#[async_trait]
impl Tool for PatchTool {
    fn name(&self) -> &str {
        "patch"
    }

    fn description(&self) -> &str {
        "Apply one or more search/replace blocks to an existing file. Usage: a fenced `patch <path>` \
         block whose body contains one or more `<<<<<<< ORIGINAL` / `=======` / `>>>>>>> UPDATED` blocks."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to patch" },
                "diff": { "type": "string", "description": "One or more ORIGINAL/UPDATED blocks" }
            },
            "required": ["path", "diff"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        let call_id = tool_use.call_id.clone().unwrap_or_default();
        let Some(path) = resolve_path(tool_use) else {
            return ToolOutput::err(call_id, "no path provided to the patch tool");
        };

        let original_content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(call_id, format!("failed to read {}: {e}", path.display())),
        };

        let patched = match apply_patch(&tool_use.content, &original_content) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(call_id, e),
        };

        if let Some(hooks) = &self.hooks {
            if let Err(e) = hooks.trigger(HookArgs::FilePatchPre { path: path.clone(), content: patched.clone() }) {
                return ToolOutput::err(call_id, format!("patch aborted by hook: {e}"));
            }
        }

        if let Err(e) = tokio::fs::write(&path, &patched).await {
            return ToolOutput::err(call_id, format!("failed to write {}: {e}", path.display()));
        }

        if let Some(hooks) = &self.hooks {
            let _ = hooks.trigger(HookArgs::FilePatchPost { path: path.clone(), content: patched, created: false });
        }

        ToolOutput::ok(call_id, format!("Patched {} successfully", path.display()))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
