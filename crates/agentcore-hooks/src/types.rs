// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::path::PathBuf;

use agentcore_model::{Message, ToolUse};

/// The closed set of message-yielding hook points woven through a turn.
///
/// `tool.confirm` and `elicit` are deliberately absent here — they return a
/// decision value rather than a message stream and are dispatched through
/// [`crate::confirm::ConfirmRegistry`] / [`crate::elicit::ElicitRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookType {
    SessionStart,
    SessionEnd,
    TurnPre,
    TurnPost,
    StepPre,
    StepPost,
    GenerationPre,
    GenerationPost,
    GenerationInterrupt,
    MessageTransform,
    ToolExecutePre,
    ToolExecutePost,
    ToolTransform,
    FileSavePre,
    FileSavePost,
    FilePatchPre,
    FilePatchPost,
    LoopContinue,
    CacheInvalidated,
}

impl HookType {
    /// The dot-namespaced name used in allow-lists and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session.start",
            Self::SessionEnd => "session.end",
            Self::TurnPre => "turn.pre",
            Self::TurnPost => "turn.post",
            Self::StepPre => "step.pre",
            Self::StepPost => "step.post",
            Self::GenerationPre => "generation.pre",
            Self::GenerationPost => "generation.post",
            Self::GenerationInterrupt => "generation.interrupt",
            Self::MessageTransform => "message.transform",
            Self::ToolExecutePre => "tool.execute.pre",
            Self::ToolExecutePost => "tool.execute.post",
            Self::ToolTransform => "tool.transform",
            Self::FileSavePre => "file.save.pre",
            Self::FileSavePost => "file.save.post",
            Self::FilePatchPre => "file.patch.pre",
            Self::FilePatchPost => "file.patch.post",
            Self::LoopContinue => "loop.continue",
            Self::CacheInvalidated => "cache.invalidated",
        }
    }
}

/// Typed argument payload for one hook dispatch. Each variant carries exactly
/// the tuple the corresponding `HookType` contracts to receive (§4.1).
#[derive(Debug, Clone)]
pub enum HookArgs {
    SessionStart { logdir: PathBuf, workspace: PathBuf, initial_msgs: Vec<Message> },
    SessionEnd,
    TurnPre,
    TurnPost,
    StepPre,
    StepPost,
    GenerationPre { messages: Vec<Message> },
    GenerationPost { message: Message },
    GenerationInterrupt { partial_message: Option<Message> },
    MessageTransform { message: Message },
    ToolExecutePre { tool_use: ToolUse },
    ToolExecutePost { tool_use: ToolUse },
    ToolTransform { tool_use: ToolUse },
    FileSavePre { path: PathBuf, content: String },
    FileSavePost { path: PathBuf, content: String, created: bool },
    FilePatchPre { path: PathBuf, content: String },
    FilePatchPost { path: PathBuf, content: String, created: bool },
    LoopContinue { interactive: bool, queued_prompts: usize },
    CacheInvalidated { reason: String, tokens_before: u64, tokens_after: u64 },
}

impl HookArgs {
    pub fn hook_type(&self) -> HookType {
        match self {
            Self::SessionStart { .. } => HookType::SessionStart,
            Self::SessionEnd => HookType::SessionEnd,
            Self::TurnPre => HookType::TurnPre,
            Self::TurnPost => HookType::TurnPost,
            Self::StepPre => HookType::StepPre,
            Self::StepPost => HookType::StepPost,
            Self::GenerationPre { .. } => HookType::GenerationPre,
            Self::GenerationPost { .. } => HookType::GenerationPost,
            Self::GenerationInterrupt { .. } => HookType::GenerationInterrupt,
            Self::MessageTransform { .. } => HookType::MessageTransform,
            Self::ToolExecutePre { .. } => HookType::ToolExecutePre,
            Self::ToolExecutePost { .. } => HookType::ToolExecutePost,
            Self::ToolTransform { .. } => HookType::ToolTransform,
            Self::FileSavePre { .. } => HookType::FileSavePre,
            Self::FileSavePost { .. } => HookType::FileSavePost,
            Self::FilePatchPre { .. } => HookType::FilePatchPre,
            Self::FilePatchPost { .. } => HookType::FilePatchPost,
            Self::LoopContinue { .. } => HookType::LoopContinue,
            Self::CacheInvalidated { .. } => HookType::CacheInvalidated,
        }
    }
}

/// One value yielded from a hook's message stream.
#[derive(Debug, Clone)]
pub enum HookYield {
    Message(Message),
    StopPropagation,
}

/// Placeholder argument map for hooks that want freeform extra kwargs
/// (e.g. plugin-declared hooks). Unused by the built-in hook points, which
/// carry fully typed [`HookArgs`].
pub type ExtraKwargs = BTreeMap<String, String>;
