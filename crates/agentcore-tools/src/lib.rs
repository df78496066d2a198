// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod parse;
pub mod policy;
pub mod registry;
pub mod tool;

pub use policy::{ApprovalPolicy, ToolPolicy};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolOutput, ToolOutputPart};

pub use builtin::complete::CompleteTool;
pub use builtin::elicit::ElicitTool;
pub use builtin::patch::PatchTool;
pub use builtin::restart::RestartTool;
pub use builtin::save::SaveTool;
pub use builtin::shell::ShellTool;
