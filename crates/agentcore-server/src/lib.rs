// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Server-mode rendezvous (§4.4): an `axum` HTTP surface that lets a remote
//! client drive the confirmation/elicitation prompts a terminal session
//! would otherwise answer locally.
mod confirm;
mod error;
mod http;
mod rendezvous;

pub use confirm::{install_elicit_hook, server_confirm_hook};
pub use error::ServerError;
pub use http::{bridge_agent_events, build_router};
pub use rendezvous::{Rendezvous, SseEvent};
