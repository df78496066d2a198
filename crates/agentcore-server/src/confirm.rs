// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Wires a [`Rendezvous`] into the confirm/elicit hook seams a [`Context`]
//! exposes, so `serve` mode gets the same confirmation/elicitation dispatch
//! contract the CLI's synchronous stdin prompts satisfy, just routed over
//! the SSE/HTTP round-trip instead (§4.4, §4.5).
use std::sync::Arc;

use agentcore_core::Context;
use agentcore_hooks::{ConfirmationResult, ElicitationResponse};
use agentcore_model::ToolUse;

use crate::rendezvous::Rendezvous;

/// Builds the `server_confirm` closure `Context::new` requires. Only called
/// when the higher-priority `auto_confirm_counter` hook has already fallen
/// through, so the rendezvous never needs to special-case auto-confirm here
/// — [`Rendezvous::request_confirmation`]'s `auto_confirm` parameter exists
/// for its own direct callers/tests, not this one.
pub fn server_confirm_hook(
    rendezvous: Arc<Rendezvous>,
) -> impl Fn(&ToolUse, Option<&str>) -> Option<ConfirmationResult> + Send + Sync + 'static {
    move |tool_use, _preview| Some(rendezvous.confirm_blocking(tool_use, false))
}

/// Registers the server-mode elicitation fall-through hook against
/// `context.elicit`, at the same priority `init_confirm_hooks` uses for its
/// mode-specific confirmation hook.
pub fn install_elicit_hook(context: &Context, rendezvous: Arc<Rendezvous>) {
    let conversation_id = context.ids.conversation_id.clone();
    context.elicit.register("server_elicit", 100, move |request| {
        Some(rendezvous.elicit_blocking(&conversation_id, request))
    });
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agentcore_hooks::{ConfirmAction, ElicitationRequest};

    use super::*;

    #[tokio::test]
    async fn server_confirm_hook_resolves_via_rendezvous() {
        let rendezvous = Arc::new(Rendezvous::new(Duration::from_secs(5)));
        let hook = server_confirm_hook(rendezvous.clone());

        let mut tool_use = ToolUse::new("shell", "ls", 0);
        tool_use.call_id = Some("tool-1".into());

        let waiter = tokio::task::spawn_blocking(move || hook(&tool_use, None));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rendezvous.resolve_confirmation("tool-1", ConfirmationResult::confirm()));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.action, ConfirmAction::Confirm);
    }

    #[tokio::test]
    async fn install_elicit_hook_resolves_via_rendezvous() {
        let rendezvous = Arc::new(Rendezvous::new(Duration::from_secs(5)));
        let config = agentcore_config::Config::default();
        let ids = agentcore_core::ContextIds { conversation_id: "conv-1".into(), session_id: "sess-1".into() };
        let context = Context::new(ids, &config, |_, _| None, |_, _| None, agentcore_hooks::ConfirmMode::default()).await;
        install_elicit_hook(&context, rendezvous.clone());

        let mut rx = rendezvous.subscribe("conv-1");

        let context = Arc::new(context);
        let context_for_task = context.clone();
        let waiter = tokio::task::spawn_blocking(move || context_for_task.elicit.request(&ElicitationRequest::text("name?")));

        let pending_id = loop {
            match rx.recv().await.unwrap() {
                crate::rendezvous::SseEvent::ElicitPending { elicit_id, .. } => break elicit_id,
                _ => continue,
            }
        };
        assert!(rendezvous.resolve_elicitation(&pending_id, ElicitationResponse::value("Ada", false)));

        let response = waiter.await.unwrap();
        assert_eq!(response.value.as_deref(), Some("Ada"));
    }
}
