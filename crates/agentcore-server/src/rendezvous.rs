// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Server-mode rendezvous (§4.4): per-conversation SSE fan-out plus the two
//! process-global pending registries (`pending_confirmations`,
//! `pending_elicitations`) that let a confirmation or elicitation hook, run
//! deep inside the tool-execution worker, block until a remote HTTP client
//! answers it. One `broadcast::Sender<SseEvent>` per conversation fans
//! events out to subscribers; a `PendingRegistry` of
//! `oneshot::Sender<ConfirmationResult>`/`oneshot::Sender<ElicitationResponse>`
//! is fully connected to the real tool-execution gate rather than left
//! half-wired behind a manual approval command.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use agentcore_hooks::{
    ConfirmationResult, ElicitationField, ElicitationRequest, ElicitationResponse, ElicitationType,
};
use agentcore_model::{Message, ToolUse};

/// One of the 12 named SSE event types (§4.4). Serialized as a JSON object
/// tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    Connected { session_id: String },
    Ping,
    MessageAdded { message: Message },
    GenerationStarted,
    GenerationProgress { token: String },
    GenerationComplete { message: Message },
    ToolPending { tool_id: String, tooluse: ToolUse, auto_confirm: bool },
    ToolExecuting { tool_id: String },
    ElicitPending {
        elicit_id: String,
        elicit_type: ElicitationType,
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<ElicitationField>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Interrupted,
    Error { error: String },
    ConfigChanged { config: serde_json::Value, changed_fields: Vec<String> },
}

struct PendingEntry<Req, Res> {
    #[allow(dead_code)] // kept for parity with §4.4's "stores the request payload"; not read back yet.
    request: Req,
    tx: Option<oneshot::Sender<Res>>,
}

/// Generic pending-approval table: mint an id, allocate a record holding a
/// one-shot latch, then resolve it exactly once. A second `resolve` for the
/// same id (already removed) is a no-op returning `false`, which is also
/// exactly what a request for an unknown id looks like — giving the HTTP
/// layer's "missing id -> 404" behavior for free.
struct PendingRegistry<Req, Res> {
    entries: Mutex<HashMap<String, PendingEntry<Req, Res>>>,
}

impl<Req, Res> PendingRegistry<Req, Res> {
    fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    fn allocate(&self, id: String, request: Req) -> oneshot::Receiver<Res> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().unwrap().insert(id, PendingEntry { request, tx: Some(tx) });
        rx
    }

    fn remove(&self, id: &str) {
        self.entries.lock().unwrap().remove(id);
    }

    /// Resolves and removes the pending record in one step. Returns `true`
    /// iff a record for `id` was found (regardless of whether the receiving
    /// end is still listening).
    fn resolve(&self, id: &str, result: Res) -> bool {
        let entry = self.entries.lock().unwrap().remove(id);
        match entry {
            Some(mut entry) => {
                if let Some(tx) = entry.tx.take() {
                    let _ = tx.send(result);
                }
                true
            }
            None => false,
        }
    }
}

/// Owns the per-conversation SSE broadcast buses and the two pending
/// registries. One instance is shared (`Arc`) across the whole server.
pub struct Rendezvous {
    hub: Mutex<HashMap<String, broadcast::Sender<SseEvent>>>,
    confirmations: PendingRegistry<ToolUse, ConfirmationResult>,
    elicitations: PendingRegistry<ElicitationRequest, ElicitationResponse>,
    timeout: Duration,
}

impl Rendezvous {
    /// `timeout` is the 1-hour default from SPEC_FULL.md §4.4, made
    /// injectable so tests don't wait a literal hour.
    pub fn new(timeout: Duration) -> Self {
        Self { hub: Mutex::new(HashMap::new()), confirmations: PendingRegistry::new(), elicitations: PendingRegistry::new(), timeout }
    }

    fn sender(&self, conversation_id: &str) -> broadcast::Sender<SseEvent> {
        let mut hub = self.hub.lock().unwrap();
        hub.entry(conversation_id.to_string()).or_insert_with(|| broadcast::channel(256).0).clone()
    }

    pub fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<SseEvent> {
        self.sender(conversation_id).subscribe()
    }

    /// No subscribers is fine — `broadcast::Sender::send` with nobody
    /// listening just means the event is dropped.
    pub fn publish(&self, conversation_id: &str, event: SseEvent) {
        let _ = self.sender(conversation_id).send(event);
    }

    /// Runs the confirmation rendezvous protocol (§4.4 steps 1-4): allocate a
    /// pending record keyed by the tool use's own `call_id` (already stamped
    /// by the turn loop before this hook runs, so the id lines up with the
    /// `tool_pending`/`tool_executing` events the `AgentEvent` bridge already
    /// emits for the same call), then block on its latch with a timeout.
    pub async fn request_confirmation(&self, tool_use: &ToolUse, auto_confirm: bool) -> ConfirmationResult {
        if auto_confirm {
            return ConfirmationResult::confirm();
        }
        let tool_id = tool_use.call_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let rx = self.confirmations.allocate(tool_id.clone(), tool_use.clone());
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => {
                self.confirmations.remove(&tool_id);
                ConfirmationResult::skip("server confirmation timed out")
            }
        }
    }

    /// Synchronous wrapper for `ConfirmRegistry`'s `Fn(&ToolUse, ...) ->
    /// Option<ConfirmationResult>` hook signature, which has no `.await`
    /// available. `block_in_place` moves the blocking wait off the async
    /// worker pool onto a blocking-capable thread, then `block_on`s the
    /// rendezvous future to get a synchronous answer.
    pub fn confirm_blocking(&self, tool_use: &ToolUse, auto_confirm: bool) -> ConfirmationResult {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.request_confirmation(tool_use, auto_confirm))
        })
    }

    /// Elicitation's rendezvous variant: the SSE event here is the one the
    /// protocol actually requires a hook to emit directly, since no turn-loop
    /// `AgentEvent` carries elicitation state the way it does for tool
    /// confirmation.
    pub async fn request_elicitation(&self, conversation_id: &str, request: &ElicitationRequest) -> ElicitationResponse {
        let elicit_id = Uuid::new_v4().to_string();
        self.publish(
            conversation_id,
            SseEvent::ElicitPending {
                elicit_id: elicit_id.clone(),
                elicit_type: request.elicit_type,
                prompt: request.prompt.clone(),
                options: request.options.clone(),
                fields: request.fields.clone(),
                default: request.default.clone(),
                description: request.description.clone(),
            },
        );
        let rx = self.elicitations.allocate(elicit_id.clone(), request.clone());
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                self.elicitations.remove(&elicit_id);
                ElicitationResponse::cancelled()
            }
        }
    }

    pub fn elicit_blocking(&self, conversation_id: &str, request: &ElicitationRequest) -> ElicitationResponse {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.request_elicitation(conversation_id, request))
        })
    }

    /// Resolves a pending confirmation from the `POST .../tool/confirm`
    /// handler. `false` means the id is unknown or already resolved (the
    /// caller maps that to 404).
    pub fn resolve_confirmation(&self, tool_id: &str, result: ConfirmationResult) -> bool {
        self.confirmations.resolve(tool_id, result)
    }

    pub fn resolve_elicitation(&self, elicit_id: &str, response: ElicitationResponse) -> bool {
        self.elicitations.resolve(elicit_id, response)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
