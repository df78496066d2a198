// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors raised from within hook dispatch.
///
/// `SessionComplete` is the sole variant that is ever re-raised out of
/// `trigger` — everything else is caught, logged, and the offending hook is
/// skipped.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("session complete")]
    SessionComplete,

    #[error("hook registration failed: {0}")]
    Registration(String),

    #[error("hook dispatch failed: {0}")]
    Dispatch(#[from] anyhow::Error),
}
