// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::os::unix::io::AsRawFd;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use agentcore_model::ToolUse;

use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolOutput};

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 20_000;
const HEAD_LINES: usize = 100;
const TAIL_LINES: usize = 100;

const DELIMITER: &str = "END_OF_COMMAND_OUTPUT";

/// A persistent `bash` subprocess that preserves environment and working
/// directory across commands — the shell tool's one conversation-scoped
/// piece of state.
pub struct ShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

impl ShellSession {
    pub async fn new() -> anyhow::Result<Self> {
        let mut child = Command::new("bash")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
        let stderr = BufReader::new(child.stderr.take().expect("piped stderr"));
        let mut session = Self { child, stdin, stdout, stderr };

        session.run("export PAGER= GIT_PAGER=cat PYTHONUNBUFFERED=1", None).await?;
        Ok(session)
    }

    /// Runs one command, blocking until the delimiter marker is read back or
    /// `timeout` elapses. On timeout, SIGTERM is sent, a brief grace period
    /// is given, then SIGKILL; whatever output was read before that point is
    /// returned with exit code `124` (the shell convention for "timed out").
    pub async fn run(&mut self, command: &str, timeout: Option<Duration>) -> anyhow::Result<(i32, String, String)> {
        let full = format!("{command}\necho \"ReturnCode:$? {DELIMITER}\"\n");
        self.stdin.write_all(full.as_bytes()).await?;
        self.stdin.flush().await?;

        let read_loop = async {
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();
            let mut out_line = String::new();
            let mut err_line = String::new();
            loop {
                out_line.clear();
                err_line.clear();
                tokio::select! {
                    n = self.stdout.read_line(&mut out_line) => {
                        if n? == 0 { break; }
                        if let Some(code) = parse_marker(&out_line) {
                            return Ok::<_, anyhow::Error>((code, stdout_buf, stderr_buf));
                        }
                        stdout_buf.push_str(&out_line);
                    }
                    n = self.stderr.read_line(&mut err_line) => {
                        if n? == 0 { continue; }
                        stderr_buf.push_str(&err_line);
                    }
                }
            }
            Ok((-1, stdout_buf, stderr_buf))
        };

        match timeout {
            Some(d) => match tokio::time::timeout(d, read_loop).await {
                Ok(result) => result,
                Err(_) => {
                    self.terminate_current_command().await;
                    Ok((124, String::new(), String::new()))
                }
            },
            None => read_loop.await,
        }
    }

    async fn terminate_current_command(&mut self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: `pid` comes from the live child handle; SIGTERM is a
            // no-op if the process has already exited.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            if self.child.try_wait().ok().flatten().is_none() {
                let _ = self.child.start_kill();
            }
        }
    }

    /// Closes the session's pipes and kills the subprocess. Consuming
    /// `self` drops `stdin`/`stdout`/`stderr`, closing their file
    /// descriptors — verified by the leak-prevention test below.
    pub async fn close(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

fn parse_marker(line: &str) -> Option<i32> {
    let idx = line.find("ReturnCode:")?;
    if !line.contains(DELIMITER) {
        return None;
    }
    let rest = &line[idx + "ReturnCode:".len()..];
    rest.split_whitespace().next()?.parse().ok()
}

/// Built-in tool that runs shell commands in a persistent session.
pub struct ShellTool {
    pub timeout_secs: u64,
    session: Mutex<Option<ShellSession>>,
}

impl ShellTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs, session: Mutex::new(None) }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in a persistent bash session and return stdout + stderr.\n\
         Environment variables and the working directory (including `cd`) persist across calls.\n\
         Output is capped at ~20 KB; when larger, the first 100 and last 100 lines are preserved\n\
         with an omission marker in the middle."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute." }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, tool_use: &ToolUse) -> ToolOutput {
        let call_id = tool_use.call_id.clone().unwrap_or_default();
        let command = tool_use.content.trim();
        if command.is_empty() {
            return ToolOutput::err(call_id, "no command given to the shell tool");
        }

        debug!(cmd = %command, "executing shell tool");

        let mut guard = self.session.lock().await;
        if guard.is_none() {
            match ShellSession::new().await {
                Ok(s) => *guard = Some(s),
                Err(e) => return ToolOutput::err(call_id, format!("failed to start shell: {e}")),
            }
        }
        let session = guard.as_mut().expect("just initialized");

        let timeout = if self.timeout_secs == 0 { None } else { Some(Duration::from_secs(self.timeout_secs)) };
        match session.run(command, timeout).await {
            Ok((code, stdout, stderr)) => {
                let mut content = String::new();
                if !stdout.trim().is_empty() {
                    content.push_str(&head_tail_truncate(stdout.trim()));
                }
                if !stderr.trim().is_empty() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str("[stderr]\n");
                    content.push_str(&head_tail_truncate(stderr.trim()));
                }
                if content.is_empty() {
                    content = format!("[exit {code}]");
                }

                if code == 0 {
                    ToolOutput::ok(call_id, content)
                } else if code == 1 {
                    // Unix convention for "no matches"/"condition false" — not
                    // a tool failure, just an empty result.
                    ToolOutput::ok(call_id, format!("[exit 1]\n{content}"))
                } else if code == 124 {
                    ToolOutput::err(call_id, format!("timed out after {}s\n{content}", self.timeout_secs))
                } else {
                    ToolOutput::err(call_id, format!("[exit {code}]\n{content}"))
                }
            }
            Err(e) => {
                warn!(error = %e, "shell session failed; it will be restarted on next call");
                *guard = None;
                ToolOutput::err(call_id, format!("shell error: {e}"))
            }
        }
    }
}

/// Truncate `s` to fit within `OUTPUT_LIMIT_BYTES`, keeping the first
/// `HEAD_LINES` and last `TAIL_LINES` when truncation is needed — errors and
/// summaries almost always appear at the end of build/test output.
pub(crate) fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        let tail_start = s.len().saturating_sub(OUTPUT_LIMIT_BYTES / 2);
        let tail_str = &s[tail_start..];
        let head_end = (OUTPUT_LIMIT_BYTES / 2).min(s.len());
        let head_str = &s[..head_end];
        let omitted_bytes = s.len() - head_str.len() - tail_str.len();
        return format!("{head_str}\n...[{omitted_bytes} bytes omitted]...\n{tail_str}");
    }

    let head: Vec<&str> = lines[..HEAD_LINES].to_vec();
    let tail: Vec<&str> = lines[total - TAIL_LINES..].to_vec();
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;
    let shown_bytes = head.join("\n").len() + tail.join("\n").len();
    let omitted_bytes = s.len().saturating_sub(shown_bytes);

    format!(
        "{}\n...[{omitted_lines} lines / ~{omitted_bytes} bytes omitted]...\n{}",
        head.join("\n"),
        tail.join("\n"),
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tu(cmd: &str) -> ToolUse {
        let mut t = ToolUse::new("shell", cmd, 0);
        t.call_id = Some("c1".into());
        t
    }

    #[tokio::test]
    async fn echo_command_succeeds() {
        let tool = ShellTool::default();
        let out = tool.execute(&tu("echo hello")).await;
        assert!(!out.is_error);
        assert!(out.content.contains("hello"));
    }

    #[tokio::test]
    async fn working_directory_persists_across_commands() {
        let tool = ShellTool::default();
        let dir = tempfile::tempdir().unwrap();
        let cd_cmd = format!("cd {}", dir.path().display());
        let out1 = tool.execute(&tu(&cd_cmd)).await;
        assert!(!out1.is_error);
        let out2 = tool.execute(&tu("pwd")).await;
        assert!(out2.content.contains(dir.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported_as_error() {
        let tool = ShellTool::default();
        let out = tool.execute(&tu("exit 2")).await;
        assert!(out.is_error);
        assert!(out.content.contains("exit 2"));
    }

    #[tokio::test]
    async fn exit_code_one_is_not_an_error() {
        let tool = ShellTool::default();
        let out = tool.execute(&tu("grep nope /dev/null; true; exit 1")).await;
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let tool = ShellTool::default();
        let out = tool.execute(&tu("")).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn command_timeout_reports_error() {
        let tool = ShellTool::new(1);
        let out = tool.execute(&tu("sleep 5")).await;
        assert!(out.is_error);
        assert!(out.content.contains("timed out"));
    }

    #[test]
    fn head_tail_truncate_keeps_small_output_intact() {
        assert_eq!(head_tail_truncate("short"), "short");
    }

    #[test]
    fn head_tail_truncate_keeps_head_and_tail_of_long_output() {
        let lines: Vec<String> = (0..500).map(|i| format!("line {i}")).collect();
        let big = lines.join("\n");
        let out = head_tail_truncate(&big);
        assert!(out.contains("line 0"));
        assert!(out.contains("line 499"));
        assert!(out.contains("omitted"));
    }

    #[tokio::test]
    async fn closing_a_session_closes_its_pipe_file_descriptors() {
        let session = ShellSession::new().await.unwrap();
        let stdout_fd = session.stdout.get_ref().as_raw_fd();
        session.close().await;

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(stdout_fd, &mut stat) };
        assert_eq!(rc, -1);
        assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EBADF));
    }
}
