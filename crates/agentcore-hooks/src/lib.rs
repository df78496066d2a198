// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod confirm;
mod elicit;
mod error;
mod init;
mod registry;
mod types;

pub use confirm::{ConfirmAction, ConfirmRegistry, ConfirmationResult};
pub use elicit::{ElicitRegistry, ElicitationField, ElicitationRequest, ElicitationResponse, ElicitationType};
pub use error::HookError;
pub use init::{check_auto_confirm, init_confirm_hooks, reset_auto_confirm, set_auto_confirm, ConfirmMode};
pub use registry::{Hook, HookRegistry};
pub use types::{HookArgs, HookType, HookYield};
