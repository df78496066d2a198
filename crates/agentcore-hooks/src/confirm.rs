// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use agentcore_model::ToolUse;
use serde::{Deserialize, Serialize};

/// The outcome of a `tool.confirm` decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmAction {
    Confirm,
    Skip,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationResult {
    pub action: ConfirmAction,
    pub edited_content: Option<String>,
    pub message: Option<String>,
}

impl ConfirmationResult {
    pub fn confirm() -> Self {
        Self { action: ConfirmAction::Confirm, edited_content: None, message: None }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self { action: ConfirmAction::Skip, edited_content: None, message: Some(message.into()) }
    }

    pub fn edit(content: impl Into<String>) -> Self {
        Self { action: ConfirmAction::Edit, edited_content: Some(content.into()), message: None }
    }
}

type ConfirmFn = Arc<dyn Fn(&ToolUse, Option<&str>) -> Option<ConfirmationResult> + Send + Sync>;

struct RegisteredConfirmHook {
    name: String,
    priority: i32,
    func: ConfirmFn,
}

/// Priority-ordered fall-through dispatch for `tool.confirm` hooks: each is
/// tried from highest to lowest priority, and the first `Some` result wins.
/// If every hook falls through, the registry applies the caller-supplied
/// default policy (`default_confirm`).
#[derive(Default)]
pub struct ConfirmRegistry {
    hooks: Mutex<Vec<RegisteredConfirmHook>>,
}

impl ConfirmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, priority: i32, func: F)
    where
        F: Fn(&ToolUse, Option<&str>) -> Option<ConfirmationResult> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut hooks = self.hooks.lock().unwrap();
        hooks.retain(|h| h.name != name);
        hooks.push(RegisteredConfirmHook { name, priority, func: Arc::new(func) });
    }

    /// Run `tool.confirm` hooks in priority order; returns the first
    /// non-null result, or a policy default if every hook falls through.
    pub fn get_confirmation(
        &self,
        tool_use: &ToolUse,
        preview: Option<&str>,
        default_confirm: bool,
    ) -> ConfirmationResult {
        let mut ordered: Vec<(i32, String, ConfirmFn)> = {
            let hooks = self.hooks.lock().unwrap();
            hooks.iter().map(|h| (h.priority, h.name.clone(), h.func.clone())).collect()
        };
        ordered.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        for (_, _, func) in ordered {
            if let Some(result) = func(tool_use, preview) {
                return result;
            }
        }

        if default_confirm {
            ConfirmationResult::confirm()
        } else {
            ConfirmationResult::skip("no confirmation hook registered; default policy denies")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tu() -> ToolUse {
        ToolUse::new("shell", "ls", 0)
    }

    #[test]
    fn falls_through_to_default_confirm_when_no_hooks() {
        let reg = ConfirmRegistry::new();
        let result = reg.get_confirmation(&tu(), None, true);
        assert_eq!(result.action, ConfirmAction::Confirm);
    }

    #[test]
    fn first_non_null_wins_in_priority_order() {
        let reg = ConfirmRegistry::new();
        reg.register("low", 1, |_, _| Some(ConfirmationResult::skip("low says no")));
        reg.register("high", 10, |_, _| None);
        let result = reg.get_confirmation(&tu(), None, true);
        assert_eq!(result.action, ConfirmAction::Skip);
        assert_eq!(result.message.as_deref(), Some("low says no"));
    }

    #[test]
    fn allowlist_style_hook_can_auto_approve() {
        let reg = ConfirmRegistry::new();
        reg.register("allowlist", 100, |tu, _| {
            if tu.tool == "shell" && tu.content.starts_with("ls") {
                Some(ConfirmationResult::confirm())
            } else {
                None
            }
        });
        let result = reg.get_confirmation(&tu(), None, false);
        assert_eq!(result.action, ConfirmAction::Confirm);
    }
}
