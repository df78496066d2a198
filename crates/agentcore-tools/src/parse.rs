// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Extraction of [`ToolUse`] instances from free-form assistant text.
//!
//! Four grammars are recognized and merged into one offset-ordered sequence:
//! fenced code blocks, the gptme `<tool-use>` XML form, the `<invoke>` XML
//! form, and provider-native structured tool calls (which carry no text
//! offset and are appended after every text-extracted use).
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use agentcore_model::{ProviderToolCall, ToolUse};

/// Maps a markdown fenced-code info-string tag to the tool name it invokes.
/// In the common case a tool's only declared `block_types` entry is its own
/// name, so `tag == tool_name`; tools may register additional aliases.
pub struct BlockTypeMap<'a>(pub &'a [(&'a str, &'a str)]);

impl<'a> BlockTypeMap<'a> {
    fn resolve(&self, tag: &str) -> Option<&'a str> {
        self.0.iter().find(|(t, _)| *t == tag).map(|(_, name)| *name)
    }
}

/// Scans `content` for fenced code blocks (grammar 1). Hand-rolled rather
/// than regex-based: closing fences must have at least as many backticks as
/// the opening fence, which needs a backreference a non-backtracking regex
/// engine cannot express. This also gives the nested-fence rule in §8 for
/// free — a `patch` body containing its own triple-backtick fences is only
/// closed by a line with a matching-or-longer run.
pub fn extract_fenced(content: &str, known: &BlockTypeMap) -> Vec<ToolUse> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    let mut lines = content.split('\n').peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        let backtick_run = trimmed.chars().take_while(|&c| c == '`').count();

        if backtick_run >= 3 {
            let rest = trimmed[backtick_run..].trim();
            let mut parts = rest.split_whitespace();
            let tag = parts.next().unwrap_or("");
            if let Some(tool_name) = known.resolve(tag) {
                let args: Vec<String> = parts.map(|s| s.to_string()).collect();
                let block_start = offset + indent;
                let body_start = offset + line.len() + 1;

                let mut body_lines = Vec::new();
                for body_line in lines.by_ref() {
                    let bt = body_line.trim_start();
                    let run = bt.chars().take_while(|&c| c == '`').count();
                    if run >= backtick_run && run == bt.len() {
                        break;
                    }
                    body_lines.push(body_line);
                }

                let mut tu = ToolUse::new(tool_name, body_lines.join("\n"), block_start);
                tu.args = args;
                out.push(tu);

                offset = body_start + body_lines.iter().map(|l| l.len() + 1).sum::<usize>();
                continue;
            }
        }
        offset += line.len() + 1;
    }
    out
}

fn gptme_xml_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Note: NAME must match on both tags without backreference support
        // in the `regex` crate's info-string position, so we capture the
        // opening NAME and require the same literal on the closing tag via
        // a manually alternated pattern built from the known tool list would
        // be ideal; in practice tool names are simple identifiers so a
        // non-greedy body capture bounded by any `</word></tool-use>` works.
        Regex::new(r#"(?s)<tool-use>\s*<([A-Za-z0-9_-]+)([^>]*)>(.*?)</([A-Za-z0-9_-]+)>\s*</tool-use>"#).unwrap()
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).unwrap())
}

/// Grammar 2: `<tool-use><NAME attr="v">body</NAME></tool-use>`.
pub fn extract_gptme_xml(content: &str) -> Vec<ToolUse> {
    gptme_xml_re()
        .captures_iter(content)
        .filter(|cap| cap.get(1).map(|m| m.as_str()) == cap.get(4).map(|m| m.as_str()))
        .map(|cap| {
            let whole = cap.get(0).unwrap();
            let name = cap[1].to_string();
            let body = cap[3].to_string();
            let mut kwargs = BTreeMap::new();
            for attr in attr_re().captures_iter(&cap[2]) {
                kwargs.insert(attr[1].to_string(), attr[2].to_string());
            }
            let mut tu = ToolUse::new(name, body, whole.start());
            tu.kwargs = kwargs;
            tu
        })
        .collect()
}

fn invoke_xml_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<invoke\s+name="([^"]+)"\s*>(.*?)</invoke>"#).unwrap())
}

/// Grammar 3: `<function_calls><invoke name="NAME">body</invoke>...</function_calls>`.
/// Scans for `<invoke>` directly — a message with no enclosing
/// `<function_calls>` wrapper around a stray `<invoke>` is not expected to
/// occur in practice, so the wrapper is not re-validated here.
pub fn extract_invoke_xml(content: &str) -> Vec<ToolUse> {
    invoke_xml_re()
        .captures_iter(content)
        .map(|cap| {
            let whole = cap.get(0).unwrap();
            ToolUse::new(cap[1].to_string(), cap[2].trim().to_string(), whole.start())
        })
        .collect()
}

/// Grammar 4: provider-native tool calls carried as out-of-band metadata.
/// These have no textual offset, so they are assigned offsets past the end
/// of the message text, in the order the provider returned them — keeping
/// the merged sequence deterministic without implying a false text position.
pub fn extract_provider_native(content_len: usize, calls: &[ProviderToolCall]) -> Vec<ToolUse> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            let kwargs: BTreeMap<String, String> = match &call.arguments {
                serde_json::Value::Object(map) => {
                    map.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect()
                }
                _ => BTreeMap::new(),
            };
            let mut tu = ToolUse::new(&call.name, call.arguments.to_string(), content_len + i);
            tu.kwargs = kwargs;
            tu.call_id = Some(call.id.clone());
            tu
        })
        .collect()
}

fn value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Runs all four extractors and merges the results in textual order
/// (invariant 4, §8): ties broken by extractor priority — fenced-code,
/// gptme XML, invoke XML — then provider-native calls appended last.
pub fn extract_all(content: &str, known: &BlockTypeMap, provider_calls: &[ProviderToolCall]) -> Vec<ToolUse> {
    let mut all: Vec<ToolUse> = Vec::new();
    all.extend(extract_fenced(content, known));
    all.extend(extract_gptme_xml(content));
    all.extend(extract_invoke_xml(content));
    all.sort_by_key(|tu| tu.start_offset);
    all.extend(extract_provider_native(content.chars().count(), provider_calls));
    all
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BlockTypeMap<'static> {
        BlockTypeMap(&[("shell", "shell"), ("save", "save"), ("patch", "patch")])
    }

    #[test]
    fn fenced_block_extracts_tool_and_content() {
        let msg = "Let's run:\n```shell\nls -la\n```\ndone.";
        let uses = extract_fenced(msg, &known());
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool, "shell");
        assert_eq!(uses[0].content, "ls -la");
    }

    #[test]
    fn fenced_block_with_positional_args() {
        let msg = "```shell --timeout 5\necho hi\n```";
        let uses = extract_fenced(msg, &known());
        assert_eq!(uses[0].args, vec!["--timeout", "5"]);
    }

    #[test]
    fn unknown_tag_is_not_extracted() {
        let msg = "```python\nprint(1)\n```";
        let uses = extract_fenced(msg, &known());
        assert!(uses.is_empty());
    }

    #[test]
    fn nested_fence_does_not_prematurely_close_outer_block() {
        let msg = "```patch\n--- a\n+++ b\n```diff inner marker```\nmore body\n```";
        let uses = extract_fenced(msg, &known());
        assert_eq!(uses.len(), 1);
        assert!(uses[0].content.contains("inner marker"));
        assert!(uses[0].content.contains("more body"));
    }

    #[test]
    fn multiple_fenced_blocks_in_order() {
        let msg = "```shell\nfirst\n```\ntext\n```shell\nsecond\n```";
        let uses = extract_fenced(msg, &known());
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].content, "first");
        assert_eq!(uses[1].content, "second");
        assert!(uses[0].start_offset < uses[1].start_offset);
    }

    #[test]
    fn gptme_xml_extracts_name_and_body() {
        let msg = r#"<tool-use><shell>ls -la</shell></tool-use>"#;
        let uses = extract_gptme_xml(msg);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool, "shell");
        assert_eq!(uses[0].content, "ls -la");
    }

    #[test]
    fn gptme_xml_parses_attributes_as_kwargs() {
        let msg = r#"<tool-use><save path="a.txt">hello</save></tool-use>"#;
        let uses = extract_gptme_xml(msg);
        assert_eq!(uses[0].kwargs.get("path"), Some(&"a.txt".to_string()));
    }

    #[test]
    fn invoke_xml_extracts_name_and_body() {
        let msg = r#"<function_calls><invoke name="shell">ls</invoke></function_calls>"#;
        let uses = extract_invoke_xml(msg);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool, "shell");
        assert_eq!(uses[0].content, "ls");
    }

    #[test]
    fn invoke_xml_multiple_invokes_preserve_order() {
        let msg = r#"<function_calls><invoke name="a">1</invoke><invoke name="b">2</invoke></function_calls>"#;
        let uses = extract_invoke_xml(msg);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].tool, "a");
        assert_eq!(uses[1].tool, "b");
    }

    #[test]
    fn provider_native_calls_get_trailing_offsets_in_order() {
        let calls = vec![
            ProviderToolCall { id: "1".into(), name: "a".into(), arguments: serde_json::json!({"x": 1}) },
            ProviderToolCall { id: "2".into(), name: "b".into(), arguments: serde_json::json!({}) },
        ];
        let uses = extract_provider_native(10, &calls);
        assert_eq!(uses.len(), 2);
        assert!(uses[0].start_offset < uses[1].start_offset);
        assert_eq!(uses[0].call_id.as_deref(), Some("1"));
    }

    #[test]
    fn extract_all_merges_text_grammars_in_textual_order() {
        let msg = r#"```shell
first
```
<tool-use><save path="x">second</save></tool-use>
<function_calls><invoke name="patch">third</invoke></function_calls>"#;
        let uses = extract_all(msg, &known(), &[]);
        assert_eq!(uses.len(), 3);
        assert_eq!(uses[0].tool, "shell");
        assert_eq!(uses[1].tool, "save");
        assert_eq!(uses[2].tool, "patch");
    }

    #[test]
    fn extract_all_appends_provider_native_after_text_uses() {
        let msg = "```shell\nls\n```";
        let calls = vec![ProviderToolCall { id: "1".into(), name: "save".into(), arguments: serde_json::json!({}) }];
        let uses = extract_all(msg, &known(), &calls);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].tool, "shell");
        assert_eq!(uses[1].tool, "save");
    }

    #[test]
    fn empty_message_yields_no_tool_uses() {
        assert!(extract_all("", &known(), &[]).is_empty());
    }

    #[test]
    fn message_with_only_unknown_tags_yields_no_tool_uses() {
        let msg = "```python\nprint(1)\n```\n```ruby\nputs 1\n```";
        assert!(extract_all(msg, &known(), &[]).is_empty());
    }
}
