// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

use tracing::debug;

use crate::confirm::{ConfirmRegistry, ConfirmationResult};

/// Process-wide auto-confirm counter (spec §4.1/§4.3: "a user-intent knob,
/// not a per-conversation knob"). Negative means "confirm forever"; zero
/// means "prompt normally"; positive N means "auto-confirm the next N
/// tool calls".
static AUTO_CONFIRM: OnceLock<AtomicI64> = OnceLock::new();

fn counter() -> &'static AtomicI64 {
    AUTO_CONFIRM.get_or_init(|| AtomicI64::new(0))
}

/// Set the process-wide auto-confirm counter. `None` means "confirm forever".
pub fn set_auto_confirm(n: Option<i64>) {
    counter().store(n.unwrap_or(-1), Ordering::SeqCst);
}

pub fn reset_auto_confirm() {
    counter().store(0, Ordering::SeqCst);
}

/// Checks and consumes one unit of the auto-confirm counter, if active.
/// Returns `Some(ConfirmationResult::confirm())` when auto-confirm applies.
pub fn check_auto_confirm() -> Option<ConfirmationResult> {
    let c = counter();
    let current = c.load(Ordering::SeqCst);
    if current < 0 {
        return Some(ConfirmationResult::confirm());
    }
    if current > 0 {
        c.fetch_sub(1, Ordering::SeqCst);
        return Some(ConfirmationResult::confirm());
    }
    None
}

/// Mode flags consulted at hook-initialization time to choose which
/// confirmation hook implementation gets registered (§4.1 "Context
/// locality").
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmMode {
    pub interactive: bool,
    pub server: bool,
    pub no_confirm: bool,
}

/// Registers the mode-appropriate confirmation hook into `registry`.
/// Idempotent: calling this twice with the same mode leaves the registry in
/// the same state (registration under a fixed name replaces, not grows).
///
/// This only wires the *selection* policy (which hook wins the mode check);
/// the CLI/server transport-specific bodies (`cli_confirm`'s terminal
/// prompt, `server_confirm`'s SSE rendezvous) are supplied by the caller as
/// closures, since they depend on I/O this crate does not own.
pub fn init_confirm_hooks(
    registry: &ConfirmRegistry,
    mode: ConfirmMode,
    cli_confirm: impl Fn(&agentcore_model::ToolUse, Option<&str>) -> Option<ConfirmationResult>
        + Send
        + Sync
        + 'static,
    server_confirm: impl Fn(&agentcore_model::ToolUse, Option<&str>) -> Option<ConfirmationResult>
        + Send
        + Sync
        + 'static,
) {
    // Auto-confirm always checked first, at the highest priority, regardless
    // of mode — this is what makes "switch to autonomous for N tools" work
    // uniformly across CLI and server.
    registry.register("auto_confirm_counter", 1000, |_, _| check_auto_confirm());

    if mode.no_confirm {
        registry.register("auto_confirm", 0, |_, _| Some(ConfirmationResult::confirm()));
        debug!("confirm mode: autonomous (always confirm)");
    } else if mode.server {
        registry.register("server_confirm", 100, server_confirm);
        debug!("confirm mode: server rendezvous");
    } else {
        registry.register("cli_confirm", 0, cli_confirm);
        debug!("confirm mode: interactive CLI (interactive={})", mode.interactive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_confirm_counter_decrements_then_prompts_normally() {
        reset_auto_confirm();
        set_auto_confirm(Some(2));
        assert!(check_auto_confirm().is_some());
        assert!(check_auto_confirm().is_some());
        assert!(check_auto_confirm().is_none());
        reset_auto_confirm();
    }

    #[test]
    fn negative_counter_confirms_forever() {
        reset_auto_confirm();
        set_auto_confirm(None);
        for _ in 0..5 {
            assert!(check_auto_confirm().is_some());
        }
        reset_auto_confirm();
    }

    #[test]
    fn init_confirm_hooks_no_confirm_mode_always_confirms() {
        reset_auto_confirm();
        let reg = ConfirmRegistry::new();
        init_confirm_hooks(
            &reg,
            ConfirmMode { no_confirm: true, ..Default::default() },
            |_, _| None,
            |_, _| None,
        );
        let tu = agentcore_model::ToolUse::new("shell", "ls", 0);
        let result = reg.get_confirmation(&tu, None, false);
        assert_eq!(result.action, crate::confirm::ConfirmAction::Confirm);
    }

    #[test]
    fn init_confirm_hooks_is_idempotent() {
        reset_auto_confirm();
        let reg = ConfirmRegistry::new();
        let mode = ConfirmMode { interactive: true, ..Default::default() };
        init_confirm_hooks(&reg, mode, |_, _| Some(ConfirmationResult::confirm()), |_, _| None);
        init_confirm_hooks(&reg, mode, |_, _| Some(ConfirmationResult::confirm()), |_, _| None);
        // two calls register the same two names each time -> still just those two
        let tu = agentcore_model::ToolUse::new("shell", "ls", 0);
        let result = reg.get_confirmation(&tu, None, false);
        assert_eq!(result.action, crate::confirm::ConfirmAction::Confirm);
    }
}
