use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─── Content part types ───────────────────────────────────────────────────────

/// A single content part in a multi-part message.
///
/// Used for user and assistant messages that mix text with images.
/// Images are always represented as data URLs (`data:<mime>;base64,<b64>`)
/// or HTTPS URLs for providers that accept remote references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image {
        /// Data URL (`data:image/png;base64,...`) or HTTPS URL.
        image_url: String,
        /// OpenAI vision detail level: `"low"`, `"high"`, or `"auto"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        Self::Image { image_url: image_url.into(), detail: None }
    }

    pub fn image_with_detail(image_url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Image { image_url: image_url.into(), detail: Some(detail.into()) }
    }
}

/// Content returned by a tool – either a plain string or structured parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<ToolContentPart>),
}

impl ToolResultContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Parts(_) => None,
        }
    }

    pub fn image_urls(&self) -> Vec<&str> {
        match self {
            Self::Text(_) => vec![],
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ToolContentPart::Image { image_url } => Some(image_url.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl From<String> for ToolResultContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolResultContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl std::fmt::Display for ToolResultContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(t) => write!(f, "{t}"),
            Self::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|p| match p {
                        ToolContentPart::Text { text } => Some(text.as_str()),
                        ToolContentPart::Image { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                write!(f, "{text}")
            }
        }
    }
}

/// A single content part in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContentPart {
    Text { text: String },
    Image { image_url: String },
}

/// Parse a data URL of the form `data:<mime>;base64,<b64>`.
pub fn parse_data_url_parts(url: &str) -> Result<(String, String), &'static str> {
    let rest = url.strip_prefix("data:").ok_or("not a data URL")?;
    let (meta, b64) = rest.split_once(',').ok_or("malformed data URL")?;
    let mime = meta.strip_suffix(";base64").unwrap_or(meta).to_string();
    Ok((mime, b64.to_string()))
}

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// The content of a message: plain text, or text mixed with image parts for
/// multimodal turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A tool call carried as provider-native metadata on an assistant message
/// (extraction grammar 4 of §6 — not scanned from text at all).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// An immutable record of one conversation entry (spec §3 "Message").
///
/// Once appended to a [`crate::Session`]/log, a `Message` is never mutated —
/// a `message.transform` hook produces a *replacement* Message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    /// Links a `system` tool-result message back to the `assistant` tool
    /// call that produced it.
    pub call_id: Option<String>,
    /// Withheld from terminal display but remains in the log and is visible
    /// to the model (used for secrets and telemetry, see spec §4.5).
    pub hide: bool,
    /// Suppresses streaming display only.
    pub quiet: bool,
    pub files: Option<Vec<PathBuf>>,
    /// Provider-native structured tool calls attached to this message, if any.
    pub tool_calls: Vec<ProviderToolCall>,
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            call_id: None,
            hide: false,
            quiet: false,
            files: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(text.into()))
    }

    /// Construct a `system` tool-result message stamped with `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut m = Self::system(content);
        m.call_id = Some(call_id.into());
        m
    }

    /// Construct a user message from a list of content parts (text + images).
    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        let content = if parts.is_empty() {
            MessageContent::Text(String::new())
        } else if parts.len() == 1 {
            if let ContentPart::Text { text } = &parts[0] {
                MessageContent::Text(text.clone())
            } else {
                MessageContent::Parts(parts)
            }
        } else {
            MessageContent::Parts(parts)
        };
        Self::new(Role::User, content)
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// Return the plain text of this message, if it has exactly one text part.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Parts(parts) if parts.len() == 1 => match &parts[0] {
                ContentPart::Text { text } => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn image_urls(&self) -> Vec<&str> {
        match &self.content {
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Image { image_url, .. } => Some(image_url.as_str()),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Approximate token count used for context management (4 chars/token
    /// heuristic for text, OpenAI's image-token estimates for images).
    pub fn approx_tokens(&self) -> usize {
        let chars = match &self.content {
            MessageContent::Text(t) => t.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::Image { detail, .. } => {
                        let tokens = if detail.as_deref() == Some("low") { 85 } else { 765 };
                        tokens * 4
                    }
                })
                .sum(),
        };
        (chars / 4).max(1)
    }
}

/// A parsed tool invocation extracted from assistant text (or carried
/// natively by the provider — see [`ProviderToolCall`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUse {
    /// Tool name or block-type tag this use resolves against.
    pub tool: String,
    /// Ordered positional arguments (e.g. the rest of a fenced-block info string).
    pub args: Vec<String>,
    /// Named arguments, when the grammar supports them.
    pub kwargs: std::collections::BTreeMap<String, String>,
    /// Body content: code, file content, or a JSON spec.
    pub content: String,
    /// Identifier for structured tool-call formats (grammar 4); `None` for
    /// text-scanned grammars until stamped by the executor.
    pub call_id: Option<String>,
    /// Byte offset into the source message where this use began — used to
    /// preserve textual ordering when several grammars appear in one message.
    pub start_offset: usize,
}

impl ToolUse {
    pub fn new(tool: impl Into<String>, content: impl Into<String>, start_offset: usize) -> Self {
        Self {
            tool: tool.into(),
            args: Vec::new(),
            kwargs: std::collections::BTreeMap::new(),
            content: content.into(),
            call_id: None,
            start_offset,
        }
    }
}

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub stream: bool,
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    TextDelta(String),
    ThinkingDelta(String),
    ToolCall { id: String, name: String, arguments: String },
    Usage { input_tokens: u32, output_tokens: u32, cache_read_tokens: u32, cache_write_tokens: u32 },
    Done,
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_user_sets_role_and_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
        assert!(!m.hide);
        assert!(m.call_id.is_none());
    }

    #[test]
    fn message_tool_result_stamps_call_id_on_system_message() {
        let m = Message::tool_result("call-1", "output");
        assert_eq!(m.role, Role::System);
        assert_eq!(m.call_id.as_deref(), Some("call-1"));
        assert_eq!(m.as_text(), Some("output"));
    }

    #[test]
    fn message_hidden_sets_flag_without_removing_from_content() {
        let m = Message::tool_result("call-2", "secret-value").hidden();
        assert!(m.hide);
        assert_eq!(m.as_text(), Some("secret-value"));
    }

    #[test]
    fn message_user_with_parts_image() {
        let parts = vec![ContentPart::text("what is this?"), ContentPart::image("data:image/png;base64,XYZ")];
        let m = Message::user_with_parts(parts);
        assert_eq!(m.role, Role::User);
        assert_eq!(m.image_urls(), vec!["data:image/png;base64,XYZ"]);
        assert!(m.as_text().is_none());
    }

    #[test]
    fn approx_tokens_text_divides_by_four() {
        let m = Message::user("12345678");
        assert_eq!(m.approx_tokens(), 2);
    }

    #[test]
    fn approx_tokens_minimum_is_one() {
        let m = Message::user("hi");
        assert_eq!(m.approx_tokens(), 1);
    }

    #[test]
    fn approx_tokens_image_detail_low_uses_85_tokens() {
        let parts = vec![ContentPart::image_with_detail("data:image/png;base64,A", "low")];
        let m = Message::user_with_parts(parts);
        assert_eq!(m.approx_tokens(), 85);
    }

    #[test]
    fn message_serialises_and_deserialises() {
        let original = Message::user("test payload");
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.role, Role::User);
        assert_eq!(decoded.as_text(), Some("test payload"));
    }

    #[test]
    fn content_part_image_with_detail_round_trip() {
        let p = ContentPart::image_with_detail("data:image/png;base64,ABC", "low");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"detail\""));
        let back: ContentPart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn content_part_image_without_detail_omits_field() {
        let p = ContentPart::image("data:image/png;base64,ABC");
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("\"detail\""));
    }

    #[test]
    fn tool_use_new_has_no_call_id_until_stamped() {
        let tu = ToolUse::new("shell", "ls -la", 12);
        assert_eq!(tu.tool, "shell");
        assert_eq!(tu.start_offset, 12);
        assert!(tu.call_id.is_none());
    }
}
