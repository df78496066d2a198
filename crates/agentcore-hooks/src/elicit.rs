// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElicitationType {
    Text,
    Choice,
    MultiChoice,
    Secret,
    Confirmation,
    Form,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElicitationField {
    pub name: String,
    pub sub_type: String,
    pub required: bool,
    pub default: Option<String>,
}

/// An agent-initiated request for structured user input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElicitationRequest {
    pub elicit_type: ElicitationType,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub fields: Option<Vec<ElicitationField>>,
    pub default: Option<String>,
    pub description: Option<String>,
    /// Forced `true` for `Secret`, optional for everything else.
    pub sensitive: bool,
}

impl ElicitationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            elicit_type: ElicitationType::Text,
            prompt: prompt.into(),
            options: None,
            fields: None,
            default: None,
            description: None,
            sensitive: false,
        }
    }

    pub fn secret(prompt: impl Into<String>) -> Self {
        Self { elicit_type: ElicitationType::Secret, sensitive: true, ..Self::text(prompt) }
    }

    pub fn choice(prompt: impl Into<String>, options: Vec<String>) -> Self {
        Self { elicit_type: ElicitationType::Choice, options: Some(options), ..Self::text(prompt) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElicitationResponse {
    pub value: Option<String>,
    pub values: Option<Vec<String>>,
    pub cancelled: bool,
    pub sensitive: bool,
}

impl ElicitationResponse {
    pub fn value(value: impl Into<String>, sensitive: bool) -> Self {
        Self { value: Some(value.into()), values: None, cancelled: false, sensitive }
    }

    pub fn cancelled() -> Self {
        Self { value: None, values: None, cancelled: true, sensitive: false }
    }
}

type ElicitFn = Arc<dyn Fn(&ElicitationRequest) -> Option<ElicitationResponse> + Send + Sync>;

struct RegisteredElicitHook {
    name: String,
    priority: i32,
    func: ElicitFn,
}

/// Priority-ordered fall-through dispatch for `elicit` hooks, mirroring
/// [`crate::confirm::ConfirmRegistry`]'s semantics.
#[derive(Default)]
pub struct ElicitRegistry {
    hooks: Mutex<Vec<RegisteredElicitHook>>,
}

impl ElicitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, priority: i32, func: F)
    where
        F: Fn(&ElicitationRequest) -> Option<ElicitationResponse> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut hooks = self.hooks.lock().unwrap();
        hooks.retain(|h| h.name != name);
        hooks.push(RegisteredElicitHook { name, priority, func: Arc::new(func) });
    }

    /// Runs `elicit` hooks in priority order; first non-null response wins.
    /// If every hook falls through, returns a cancelled response (the
    /// non-interactive default — interactive CLI fallback is a caller
    /// responsibility since CLI chrome is out of scope here).
    pub fn request(&self, req: &ElicitationRequest) -> ElicitationResponse {
        let mut ordered: Vec<(i32, String, ElicitFn)> = {
            let hooks = self.hooks.lock().unwrap();
            hooks.iter().map(|h| (h.priority, h.name.clone(), h.func.clone())).collect()
        };
        ordered.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        for (_, _, func) in ordered {
            if let Some(resp) = func(req) {
                return resp;
            }
        }
        ElicitationResponse::cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_request_forces_sensitive() {
        let req = ElicitationRequest::secret("API key?");
        assert!(req.sensitive);
        assert_eq!(req.elicit_type, ElicitationType::Secret);
    }

    #[test]
    fn no_hooks_falls_through_to_cancelled() {
        let reg = ElicitRegistry::new();
        let resp = reg.request(&ElicitationRequest::text("name?"));
        assert!(resp.cancelled);
    }

    #[test]
    fn first_non_null_hook_wins() {
        let reg = ElicitRegistry::new();
        reg.register("low", 1, |_| Some(ElicitationResponse::cancelled()));
        reg.register("high", 10, |_| Some(ElicitationResponse::value("answer", false)));
        let resp = reg.request(&ElicitationRequest::text("name?"));
        assert_eq!(resp.value.as_deref(), Some("answer"));
    }
}
