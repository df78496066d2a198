// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the rendezvous HTTP endpoints (§6, §7
/// "RendezvousError: NotFound, AlreadyResolved, TimedOut").
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No pending confirmation/elicitation record exists for the given id —
    /// either it was never created, already resolved, or timed out.
    #[error("no pending record for this id")]
    NotFound,
    /// A malformed request body: unknown `action`, missing required field.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
