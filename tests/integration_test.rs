// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end smoke tests driving the full stack (config -> context -> agent
//! -> mock provider) the way the binary's `run` subcommand does.
use std::sync::Arc;

use agentcore_config::Config;
use agentcore_core::{Agent, AgentEvent, AgentRuntimeContext, Context, ContextIds};
use agentcore_hooks::ConfirmMode;
use agentcore_model::MockProvider;
use tokio::sync::mpsc;

fn ids() -> ContextIds {
    ContextIds { conversation_id: "conv-1".into(), session_id: "session-1".into() }
}

#[tokio::test]
async fn agent_returns_mock_response() {
    let config = Config::default();
    let mode = ConfirmMode { interactive: false, server: false, no_confirm: true };
    let context = Context::new(ids(), &config, |_, _| None, |_, _| None, mode);

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let mut agent = Agent::new(
        context,
        Arc::new(MockProvider),
        Arc::new(config.agent.clone()),
        AgentRuntimeContext::new(std::env::temp_dir()),
        4096,
        events_tx,
    )
    .unwrap();

    agent.submit("hello").await.unwrap();
    drop(agent);

    let mut got_text = false;
    while let Some(event) = events_rx.recv().await {
        if let AgentEvent::TextDelta(t) = event {
            assert!(t.contains("MOCK"));
            got_text = true;
        }
    }
    assert!(got_text, "expected at least one TextDelta event");
}

#[tokio::test]
async fn agent_turn_completes_without_tool_use() {
    let config = Config::default();
    let mode = ConfirmMode { interactive: false, server: false, no_confirm: true };
    let context = Context::new(ids(), &config, |_, _| None, |_, _| None, mode);

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let mut agent = Agent::new(
        context,
        Arc::new(MockProvider),
        Arc::new(config.agent.clone()),
        AgentRuntimeContext::new(std::env::temp_dir()),
        4096,
        events_tx,
    )
    .unwrap();

    agent.submit("what's up").await.unwrap();
    drop(agent);

    let mut saw_turn_complete = false;
    while let Some(event) = events_rx.recv().await {
        if matches!(event, AgentEvent::TurnComplete) {
            saw_turn_complete = true;
        }
    }
    assert!(saw_turn_complete, "expected a TurnComplete event to close out the turn");
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.model.provider, "mock");
    assert!(cfg.agent.max_tool_rounds > 0);
    assert!(cfg.agent.shell_timeout_secs > 0);
}
