// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentcore_model::Message;
use tracing::{debug, warn};

use crate::error::HookError;
use crate::types::{HookArgs, HookType, HookYield};

type HookFn = Arc<dyn Fn(&HookArgs) -> Result<Vec<HookYield>, HookError> + Send + Sync>;

/// A registered callback bound to one [`HookType`].
#[derive(Clone)]
pub struct Hook {
    pub name: String,
    pub hook_type: HookType,
    pub priority: i32,
    pub enabled: bool,
    pub async_mode: bool,
    func: HookFn,
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("hook_type", &self.hook_type)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("async_mode", &self.async_mode)
            .finish()
    }
}

/// A map from [`HookType`] to its ordered list of hooks, guarded by a single
/// internal mutex (see spec's `HookRegistry` invariants: re-registering a
/// name under the same type replaces the prior entry rather than growing the
/// list).
#[derive(Default)]
pub struct HookRegistry {
    hooks: Mutex<HashMap<HookType, Vec<Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`/`hook_type`. Idempotent: a prior
    /// registration under the same `(name, hook_type)` is replaced, not
    /// duplicated.
    pub fn register<F>(
        &self,
        name: impl Into<String>,
        hook_type: HookType,
        func: F,
        priority: i32,
        enabled: bool,
        async_mode: bool,
    ) where
        F: Fn(&HookArgs) -> Result<Vec<HookYield>, HookError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut hooks = self.hooks.lock().unwrap();
        let list = hooks.entry(hook_type).or_default();
        list.retain(|h| h.name != name);
        list.push(Hook { name, hook_type, priority, enabled, async_mode, func: Arc::new(func) });
    }

    /// Remove a hook by name, optionally scoped to a single `hook_type`.
    pub fn unregister(&self, name: &str, hook_type: Option<HookType>) {
        let mut hooks = self.hooks.lock().unwrap();
        match hook_type {
            Some(t) => {
                if let Some(list) = hooks.get_mut(&t) {
                    list.retain(|h| h.name != name);
                }
            }
            None => {
                for list in hooks.values_mut() {
                    list.retain(|h| h.name != name);
                }
            }
        }
    }

    pub fn enable(&self, name: &str) {
        self.set_enabled(name, true);
    }

    pub fn disable(&self, name: &str) {
        self.set_enabled(name, false);
    }

    fn set_enabled(&self, name: &str, enabled: bool) {
        let mut hooks = self.hooks.lock().unwrap();
        for list in hooks.values_mut() {
            for h in list.iter_mut() {
                if h.name == name {
                    h.enabled = enabled;
                }
            }
        }
    }

    /// Remove all hooks, optionally scoped to a single `hook_type`.
    pub fn clear(&self, hook_type: Option<HookType>) {
        let mut hooks = self.hooks.lock().unwrap();
        match hook_type {
            Some(t) => {
                hooks.remove(&t);
            }
            None => hooks.clear(),
        }
    }

    /// Names currently registered for `hook_type`, in registration order
    /// (not dispatch order — see [`Self::trigger`] for the sort applied at
    /// dispatch time).
    pub fn get_hooks(&self, hook_type: HookType) -> Vec<String> {
        let hooks = self.hooks.lock().unwrap();
        hooks.get(&hook_type).map(|l| l.iter().map(|h| h.name.clone()).collect()).unwrap_or_default()
    }

    /// Dispatch every enabled hook registered for `args.hook_type()`.
    ///
    /// Hooks run in descending-priority order; ties break by *descending*
    /// name — the lexicographically later name runs first. This matches the
    /// original comparator exactly and is the opposite of what a reader
    /// would guess ("descending priority, ascending name").
    ///
    /// A `StopPropagation` yield ends dispatch immediately: messages yielded
    /// so far are returned and no further hook (sync or async) runs.
    /// `HookError::SessionComplete` from any hook is never swallowed — it
    /// aborts dispatch and propagates to the caller. Any other hook error is
    /// logged and that hook is skipped; dispatch continues.
    pub fn trigger(&self, args: HookArgs) -> Result<Vec<Message>, HookError> {
        let hook_type = args.hook_type();
        let mut ordered: Vec<Hook> = {
            let hooks = self.hooks.lock().unwrap();
            hooks.get(&hook_type).cloned().unwrap_or_default()
        };
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| b.name.cmp(&a.name)));

        let mut out = Vec::new();
        for hook in ordered {
            if !hook.enabled {
                continue;
            }
            if hook.async_mode {
                let func = hook.func.clone();
                let args_clone = args.clone();
                let name = hook.name.clone();
                tokio::spawn(async move {
                    match func(&args_clone) {
                        Ok(yields) => debug!(hook = %name, yielded = yields.len(), "async hook completed"),
                        Err(HookError::SessionComplete) => {
                            warn!(hook = %name, "async hook raised session-complete; cannot abort main flow")
                        }
                        Err(e) => warn!(hook = %name, error = %e, "async hook failed"),
                    }
                });
                continue;
            }

            debug!(hook = %hook.name, hook_type = hook_type.as_str(), "dispatching hook");
            match (hook.func)(&args) {
                Ok(yields) => {
                    let mut stop = false;
                    for y in yields {
                        match y {
                            HookYield::Message(m) => out.push(m),
                            HookYield::StopPropagation => {
                                stop = true;
                                break;
                            }
                        }
                    }
                    if stop {
                        break;
                    }
                }
                Err(HookError::SessionComplete) => return Err(HookError::SessionComplete),
                Err(e) => {
                    warn!(hook = %hook.name, error = %e, "hook failed, skipping");
                }
            }
        }
        Ok(out)
    }
}
