// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The HTTP surface named in §6: one SSE stream per conversation plus the
//! two confirm/respond endpoints that resolve a pending rendezvous record.
//! Conversation CRUD and step-triggering endpoints are out of scope here
//! (§6 "out of scope").
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use agentcore_core::AgentEvent;
use agentcore_hooks::{ConfirmationResult, ElicitationResponse};
use agentcore_model::{Message, ToolUse};

use crate::error::ServerError;
use crate::rendezvous::{Rendezvous, SseEvent};

#[derive(Clone)]
pub struct AppState {
    pub rendezvous: Arc<Rendezvous>,
}

/// Builds the router described in §6. `rendezvous` is shared across every
/// conversation the server hosts. A permissive CORS layer is applied since
/// the SSE stream and confirm/elicit endpoints are meant to be reachable
/// from a browser or mobile client, not just same-origin tooling.
pub fn build_router(rendezvous: Arc<Rendezvous>) -> Router {
    Router::new()
        .route("/conversations/:id/events", get(conversation_events))
        .route("/conversations/:id/tool/confirm", post(confirm_tool))
        .route("/conversations/:id/elicit/respond", post(elicit_respond))
        .layer(CorsLayer::permissive())
        .with_state(AppState { rendezvous })
}

async fn conversation_events(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.rendezvous.subscribe(&conversation_id);
    state.rendezvous.publish(&conversation_id, SseEvent::Connected { session_id: Uuid::new_v4().to_string() });

    let forwarded = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok::<_, Infallible>),
            // A slow subscriber missed events; drop them rather than error the stream.
            Err(_lagged) => None,
        }
    });
    let pings = IntervalStream::new(tokio::time::interval(Duration::from_secs(15)))
        .filter_map(|_| async { Event::default().json_data(&SseEvent::Ping).ok().map(Ok::<_, Infallible>) });

    Sse::new(stream::select(forwarded, pings)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct ConfirmToolRequest {
    #[allow(dead_code)] // carried by the wire format, not needed to resolve the record
    session_id: Option<String>,
    tool_id: String,
    action: String,
    edited_content: Option<String>,
}

async fn confirm_tool(
    State(state): State<AppState>,
    Path(_conversation_id): Path<String>,
    Json(body): Json<ConfirmToolRequest>,
) -> Result<StatusCode, ServerError> {
    let result = match body.action.as_str() {
        "confirm" => ConfirmationResult::confirm(),
        "skip" => ConfirmationResult::skip("declined by remote client"),
        "edit" => ConfirmationResult::edit(body.edited_content.unwrap_or_default()),
        other => return Err(ServerError::BadRequest(format!("unknown action '{other}'"))),
    };
    if state.rendezvous.resolve_confirmation(&body.tool_id, result) {
        Ok(StatusCode::OK)
    } else {
        Err(ServerError::NotFound)
    }
}

#[derive(Debug, Deserialize)]
struct ElicitRespondRequest {
    elicit_id: String,
    action: String,
    value: Option<String>,
    values: Option<Vec<String>>,
}

async fn elicit_respond(
    State(state): State<AppState>,
    Path(_conversation_id): Path<String>,
    Json(body): Json<ElicitRespondRequest>,
) -> Result<StatusCode, ServerError> {
    let response = match body.action.as_str() {
        "accept" => ElicitationResponse { value: body.value, values: body.values, cancelled: false, sensitive: false },
        "decline" | "cancel" => ElicitationResponse::cancelled(),
        other => return Err(ServerError::BadRequest(format!("unknown action '{other}'"))),
    };
    if state.rendezvous.resolve_elicitation(&body.elicit_id, response) {
        Ok(StatusCode::OK)
    } else {
        Err(ServerError::NotFound)
    }
}

/// Bridges a conversation's `AgentEvent` stream into SSE events (§4.4's
/// "HTTP/async substrate" paragraph). Runs as its own task alongside the
/// one driving the agent, translating each `AgentEvent` into the matching
/// `SseEvent`. Not every `AgentEvent` has a corresponding named SSE type
/// (`TokenUsage`/`ThinkingDelta` have no counterpart in §4.4's 12-event
/// list); those are intentionally dropped rather than shoehorned into an
/// existing variant.
pub async fn bridge_agent_events(conversation_id: String, rendezvous: Arc<Rendezvous>, mut events: mpsc::Receiver<AgentEvent>) {
    let mut pending_tool_uses: HashMap<String, ToolUse> = HashMap::new();
    let mut generating = false;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::TextDelta(token) => {
                if !generating {
                    generating = true;
                    rendezvous.publish(&conversation_id, SseEvent::GenerationStarted);
                }
                rendezvous.publish(&conversation_id, SseEvent::GenerationProgress { token });
            }
            AgentEvent::TextComplete(text) => {
                generating = false;
                rendezvous.publish(&conversation_id, SseEvent::GenerationComplete { message: Message::assistant(text) });
            }
            AgentEvent::ToolUseStarted { call_id, tool_use } => {
                pending_tool_uses.insert(call_id, tool_use);
            }
            AgentEvent::ToolPending { call_id, auto } => {
                let tooluse = pending_tool_uses.get(&call_id).cloned().unwrap_or_else(|| ToolUse::new("", "", 0));
                rendezvous.publish(&conversation_id, SseEvent::ToolPending { tool_id: call_id.clone(), tooluse, auto_confirm: auto });
                rendezvous.publish(&conversation_id, SseEvent::ToolExecuting { tool_id: call_id });
            }
            AgentEvent::ToolDeclined { call_id, message } => {
                pending_tool_uses.remove(&call_id);
                rendezvous.publish(&conversation_id, SseEvent::MessageAdded { message: Message::system(format!("declined: {message}")) });
            }
            AgentEvent::ToolFinished { call_id, output, .. } => {
                pending_tool_uses.remove(&call_id);
                rendezvous.publish(&conversation_id, SseEvent::MessageAdded { message: Message::tool_result(call_id, output) });
            }
            AgentEvent::Interrupted => rendezvous.publish(&conversation_id, SseEvent::Interrupted),
            AgentEvent::Error(error) => rendezvous.publish(&conversation_id, SseEvent::Error { error }),
            AgentEvent::ThinkingDelta(_) | AgentEvent::TokenUsage { .. } | AgentEvent::TurnComplete => {}
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
