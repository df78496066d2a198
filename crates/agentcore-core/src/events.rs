// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use agentcore_model::ToolUse;

/// Events emitted by the turn loop as it runs. Consumers (the CLI's stdout
/// streamer, the server's SSE bridge) subscribe via an `mpsc::Sender` to
/// drive their own output without the loop knowing about either.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model.
    TextDelta(String),
    /// The model's response is fully received (post `generation.post`).
    TextComplete(String),
    /// A thinking/reasoning chunk from the model.
    ThinkingDelta(String),
    /// The model surfaced a runnable tool use parsed from its response.
    ToolUseStarted { call_id: String, tool_use: ToolUse },
    /// A tool call's confirmation was requested and is pending (interactive
    /// CLI / server rendezvous); `auto` is true when it was resolved without
    /// a round-trip (auto-confirm).
    ToolPending { call_id: String, auto: bool },
    /// A tool call was declined by its confirmation hook.
    ToolDeclined { call_id: String, message: String },
    /// A confirmed tool call finished executing.
    ToolFinished { call_id: String, tool_name: String, output: String, is_error: bool },
    /// Current token usage update for this step.
    TokenUsage { input: u32, output: u32, cache_read: u32, cache_write: u32 },
    /// The turn ran to completion (`TURN_DONE`, loop returned to `IDLE`).
    TurnComplete,
    /// The turn was interrupted mid-generation or mid-tool-execution.
    Interrupted,
    /// A recoverable error occurred; the loop continues.
    Error(String),
}
