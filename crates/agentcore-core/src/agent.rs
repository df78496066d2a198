// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The turn/step loop (§4.2): the state machine that drives one user turn
//! from `IDLE` through `TURN_STARTING`, repeated `STEP_PREP -> GENERATING ->
//! GENERATED -> PARSING -> EXECUTING_TOOL(i)* -> STEP_DONE` cycles, to
//! `TURN_DONE`.
use std::sync::Arc;

use agentcore_config::AgentConfig;
use agentcore_hooks::{ConfirmAction, HookArgs, HookError};
use agentcore_model::{CompletionRequest, Message, ModelProvider, ProviderToolCall, ResponseEvent, ToolUse};
use agentcore_tools::parse::{self, BlockTypeMap};
use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::context::Context;
use crate::events::AgentEvent;
use crate::runtime_context::AgentRuntimeContext;
use crate::session::{LogManager, Session};

enum Store {
    Memory(Session),
    Logged(LogManager),
}

impl Store {
    fn session(&self) -> &Session {
        match self {
            Store::Memory(s) => s,
            Store::Logged(l) => l.session(),
        }
    }

    fn push(&mut self, msg: Message) -> anyhow::Result<()> {
        match self {
            Store::Memory(s) => {
                s.push(msg);
                Ok(())
            }
            Store::Logged(l) => l.append(msg),
        }
    }
}

/// Outcome of running one generate-and-execute step.
struct StepOutcome {
    ran_tools: usize,
    interrupted: bool,
}

/// Drives one conversation's turn loop against a [`ModelProvider`], a
/// [`Context`]'s hook/tool registries, and an on-disk or in-memory message
/// store.
pub struct Agent {
    store: Store,
    context: Context,
    model: Arc<dyn ModelProvider>,
    config: Arc<AgentConfig>,
    runtime: AgentRuntimeContext,
    events: mpsc::Sender<AgentEvent>,
    interrupt: Arc<Notify>,
    /// Consecutive tool-free assistant messages in non-interactive mode
    /// (Scenario E: the third one raises `SessionComplete`).
    auto_reply_count: u32,
}

impl Agent {
    pub fn new(
        context: Context,
        model: Arc<dyn ModelProvider>,
        config: Arc<AgentConfig>,
        runtime: AgentRuntimeContext,
        max_tokens: usize,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<Self> {
        let store = match &runtime.log_dir {
            Some(dir) => Store::Logged(LogManager::open(dir, max_tokens)?),
            None => Store::Memory(Session::new(max_tokens)),
        };
        Ok(Self {
            store,
            context,
            model,
            config,
            runtime,
            events,
            interrupt: Arc::new(Notify::new()),
            auto_reply_count: 0,
        })
    }

    /// A handle the caller can `notify()` to interrupt the in-flight
    /// generation or tool execution (Ctrl-C equivalent, §5 "Cancellation").
    pub fn interrupt_handle(&self) -> Arc<Notify> {
        self.interrupt.clone()
    }

    pub fn session(&self) -> &Session {
        self.store.session()
    }

    async fn emit(&self, event: AgentEvent) {
        let _ = self.events.send(event).await;
    }

    /// Runs one full user turn: pushes `prompt`, fires `turn.pre`, runs
    /// steps until `TURN_DONE`, fires `turn.post`. `HookError::SessionComplete`
    /// raised anywhere inside a step unwinds here and ends the turn cleanly
    /// (§5: "propagates up through hook dispatch to the top of the turn
    /// loop, ends the turn cleanly, and returns to IDLE").
    pub async fn submit(&mut self, prompt: impl Into<String>) -> anyhow::Result<()> {
        self.store.push(Message::user(prompt))?;
        self.auto_reply_count = 0;

        match self.run_turn().await {
            Ok(()) => {}
            Err(HookError::SessionComplete) => {
                info!("session complete; turn ended");
            }
            Err(e) => return Err(e.into()),
        }

        // Fired unconditionally: both the in-budget exit and the
        // session-complete unwind are "the turn completed" from the
        // outside world's perspective.
        let _ = self.context.hooks.trigger(HookArgs::TurnPost);
        self.emit(AgentEvent::TurnComplete).await;
        Ok(())
    }

    async fn run_turn(&mut self) -> Result<(), HookError> {
        let turn_pre = self.context.hooks.trigger(HookArgs::TurnPre)?;
        for m in turn_pre {
            self.push_quiet(m);
        }

        let mut step_count: u32 = 0;
        loop {
            step_count += 1;
            if step_count > self.config.max_tool_rounds {
                warn!(max_tool_rounds = self.config.max_tool_rounds, "step budget exceeded; ending turn");
                break;
            }

            let step_pre = self.context.hooks.trigger(HookArgs::StepPre)?;
            for m in step_pre {
                self.push_quiet(m);
            }

            let outcome = self.run_step().await?;
            if outcome.interrupted {
                self.emit(AgentEvent::Interrupted).await;
                return Ok(());
            }

            self.context.cache.record_step(self.store.session().token_count as u64);
            let step_post = self.context.hooks.trigger(HookArgs::StepPost)?;
            for m in step_post {
                self.push_quiet(m);
            }

            if outcome.ran_tools > 0 {
                self.auto_reply_count = 0;
                let continue_msgs = self
                    .context
                    .hooks
                    .trigger(HookArgs::LoopContinue { interactive: self.config.interactive, queued_prompts: 0 })?;
                for m in continue_msgs {
                    self.push_quiet(m);
                }
                continue;
            }

            if self.config.interactive {
                break; // TURN_DONE: wait for the next user-initiated turn.
            }

            // Autonomous mode, no tool use this step (Scenario E).
            if self.auto_reply_count >= 2 {
                return Err(HookError::SessionComplete);
            }
            self.auto_reply_count += 1;
            let continue_msgs = self
                .context
                .hooks
                .trigger(HookArgs::LoopContinue { interactive: false, queued_prompts: 0 })?;
            if continue_msgs.is_empty() {
                self.push_quiet(Message::user("please continue or complete"));
            } else {
                for m in continue_msgs {
                    self.push_quiet(m);
                }
            }
        }
        Ok(())
    }

    fn push_quiet(&mut self, m: Message) {
        if let Err(e) = self.store.push(m) {
            warn!(error = %e, "failed to persist hook-yielded message");
        }
    }

    /// One `STEP_PREP -> GENERATING -> GENERATED -> PARSING -> EXECUTING_TOOL(i)*`
    /// cycle.
    async fn run_step(&mut self) -> Result<StepOutcome, HookError> {
        let generation_pre = self.context.hooks.trigger(HookArgs::GenerationPre {
            messages: self.store.session().messages.clone(),
        })?;

        let mut messages = generation_pre;
        messages.extend(self.store.session().messages.iter().cloned());

        let request = CompletionRequest {
            messages,
            tools: self
                .context
                .tools
                .schemas()
                .into_iter()
                .map(|s| agentcore_model::ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
                .collect(),
            stream: true,
        };

        let (text, provider_calls, interrupted) = match self.stream_generation(request).await {
            Ok(v) => v,
            Err(e) => {
                self.emit(AgentEvent::Error(e.to_string())).await;
                return Ok(StepOutcome { ran_tools: 0, interrupted: false });
            }
        };

        if interrupted {
            return Ok(StepOutcome { ran_tools: 0, interrupted: true });
        }

        self.emit(AgentEvent::TextComplete(text.clone())).await;
        let assistant_msg = Message::assistant(text.clone());
        let generation_post = self.context.hooks.trigger(HookArgs::GenerationPost { message: assistant_msg.clone() })?;

        let transformed = self.apply_message_transform(assistant_msg)?;
        self.push_quiet(transformed);
        for m in generation_post {
            self.push_quiet(m);
        }

        let tool_uses = self.extract_tool_uses(&text, &provider_calls);
        if tool_uses.is_empty() {
            return Ok(StepOutcome { ran_tools: 0, interrupted: false });
        }

        let ran = self.execute_tools(tool_uses).await?;
        Ok(StepOutcome { ran_tools: ran, interrupted: false })
    }

    /// `message.transform` rewrites a just-generated assistant message before
    /// it is persisted (§4.1: "Returns a replacement Message (persists)").
    fn apply_message_transform(&self, message: Message) -> Result<Message, HookError> {
        let mut yields = self.context.hooks.trigger(HookArgs::MessageTransform { message: message.clone() })?;
        Ok(yields.pop().unwrap_or(message))
    }

    fn extract_tool_uses(&self, text: &str, provider_calls: &[ProviderToolCall]) -> Vec<ToolUse> {
        let names = self.context.tools.names();
        let pairs: Vec<(String, String)> = names
            .iter()
            .flat_map(|name| {
                self.context
                    .tools
                    .get(name)
                    .map(|t| t.block_types().into_iter().map(|tag| (tag.to_string(), name.clone())).collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .collect();
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let map = BlockTypeMap(&refs);
        parse::extract_all(text, &map, provider_calls)
    }

    /// Streams one generation, racing the interrupt handle against the
    /// model's response stream. Returns the accumulated text, any
    /// provider-native tool calls, and whether the stream was interrupted.
    async fn stream_generation(
        &self,
        request: CompletionRequest,
    ) -> anyhow::Result<(String, Vec<ProviderToolCall>, bool)> {
        let mut stream = self.model.complete(request).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = self.interrupt.notified() => {
                    let partial = if text.is_empty() { None } else { Some(Message::assistant(text.clone())) };
                    let _ = self.context.hooks.trigger(HookArgs::GenerationInterrupt { partial_message: partial });
                    return Ok((text, tool_calls, true));
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(ResponseEvent::TextDelta(d))) => {
                            text.push_str(&d);
                            self.emit(AgentEvent::TextDelta(d)).await;
                        }
                        Some(Ok(ResponseEvent::ThinkingDelta(d))) => {
                            self.emit(AgentEvent::ThinkingDelta(d)).await;
                        }
                        Some(Ok(ResponseEvent::ToolCall { id, name, arguments })) => {
                            let parsed = serde_json::from_str(&arguments).unwrap_or(serde_json::json!({}));
                            tool_calls.push(ProviderToolCall { id, name, arguments: parsed });
                        }
                        Some(Ok(ResponseEvent::Usage { input_tokens, output_tokens, cache_read_tokens, cache_write_tokens })) => {
                            self.emit(AgentEvent::TokenUsage {
                                input: input_tokens,
                                output: output_tokens,
                                cache_read: cache_read_tokens,
                                cache_write: cache_write_tokens,
                            }).await;
                        }
                        Some(Ok(ResponseEvent::Done)) => break,
                        Some(Ok(ResponseEvent::Error(e))) => {
                            self.emit(AgentEvent::Error(e)).await;
                            break;
                        }
                        Some(Err(e)) => {
                            self.emit(AgentEvent::Error(e.to_string())).await;
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        Ok((text, tool_calls, false))
    }

    /// Runs the confirm -> execute -> post-hook cycle for each tool use in
    /// textual order (§4.3), stopping early on decline or
    /// `break_on_tooluse`. Returns the number of tools actually executed.
    async fn execute_tools(&mut self, tool_uses: Vec<ToolUse>) -> Result<usize, HookError> {
        let mut ran = 0usize;

        for mut tool_use in tool_uses {
            let call_id = tool_use.call_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            tool_use.call_id = Some(call_id.clone());

            self.emit(AgentEvent::ToolUseStarted { call_id: call_id.clone(), tool_use: tool_use.clone() }).await;

            let confirmation = self.context.confirm.get_confirmation(&tool_use, None, self.config.interactive);
            self.emit(AgentEvent::ToolPending { call_id: call_id.clone(), auto: confirmation.message.is_none() }).await;

            let mut edited = false;
            match confirmation.action {
                ConfirmAction::Skip => {
                    let msg = confirmation.message.unwrap_or_else(|| "tool execution declined".to_string());
                    self.push_quiet(Message::tool_result(call_id.clone(), format!("declined: {msg}")).with_call_id(call_id.clone()));
                    self.emit(AgentEvent::ToolDeclined { call_id, message: msg }).await;
                    break; // EXECUTING_TOOL(i) -> STEP_DONE on decline.
                }
                ConfirmAction::Edit => {
                    if let Some(content) = confirmation.edited_content {
                        tool_use.content = content;
                        edited = true;
                    }
                }
                ConfirmAction::Confirm => {}
            }

            let pre = self.context.hooks.trigger(HookArgs::ToolExecutePre { tool_use: tool_use.clone() })?;
            for m in pre {
                self.push_quiet(m);
            }

            let output = self.run_tool(&tool_use).await;

            let mut content = output.content.clone();
            if edited {
                content.push_str("\n\n(content was edited by user)");
            }
            let mut result_message = Message::tool_result(call_id.clone(), content).with_call_id(call_id.clone());
            if output.sensitive {
                result_message = result_message.hidden();
            }
            self.push_quiet(result_message);

            let post = self.context.hooks.trigger(HookArgs::ToolExecutePost { tool_use: tool_use.clone() })?;
            for m in post {
                self.push_quiet(m);
            }

            self.emit(AgentEvent::ToolFinished {
                call_id,
                tool_name: tool_use.tool.clone(),
                output: output.content,
                is_error: output.is_error,
            })
            .await;

            ran += 1;
            if self.config.break_on_tooluse {
                break;
            }
        }

        Ok(ran)
    }

    async fn run_tool(&self, tool_use: &ToolUse) -> agentcore_tools::ToolOutput {
        tokio::select! {
            biased;
            _ = self.interrupt.notified() => {
                agentcore_tools::ToolOutput::err(
                    tool_use.call_id.clone().unwrap_or_default(),
                    "interrupted by user",
                )
            }
            out = self.context.tools.execute(tool_use) => out,
        }
    }

    pub fn workspace(&self) -> &std::path::Path {
        &self.runtime.workspace
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
