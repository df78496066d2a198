// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use agentcore_model::Message;
use anyhow::Context as _;
use fs4::fs_std::FileExt;
use uuid::Uuid;

/// In-memory conversation session: the message list plus running token count.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    /// Approximate total token count for the current message list
    pub token_count: usize,
    /// Maximum context tokens (set from model config / provider limits)
    pub max_tokens: usize,
}

impl Session {
    pub fn new(max_tokens: usize) -> Self {
        Self { id: Uuid::new_v4().to_string(), messages: Vec::new(), token_count: 0, max_tokens }
    }

    pub fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        for m in msgs {
            self.push(m);
        }
    }

    /// Fraction of context window consumed (0.0-1.0)
    pub fn context_fraction(&self) -> f32 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        (self.token_count as f32) / (self.max_tokens as f32)
    }

    pub fn is_near_limit(&self, threshold: f32) -> bool {
        self.context_fraction() >= threshold
    }

    /// Recalculate token count from scratch.
    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    /// Replace the message list and recalculate token count.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate_tokens();
    }
}

/// Locks currently held by this process, keyed by canonicalized conversation
/// directory. A directory opened twice by the same process shares the
/// already-held lock instead of re-flocking (flock is scoped to the open
/// file description, not the process, so a naive second `try_lock_exclusive`
/// from a fresh `File` handle would spuriously conflict with ourselves).
static HELD_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<File>>>>> = OnceLock::new();

fn held_locks() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<File>>>> {
    HELD_LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Owns the conversation directory's on-disk lock and the message log
/// (`messages.jsonl`, append-only). Per §3's ownership rules: the
/// `LogManager` is the exclusive writer of a conversation's message list and
/// the sole holder of its directory lock.
pub struct LogManager {
    canon: PathBuf,
    messages_path: PathBuf,
    _lock: Arc<Mutex<File>>,
    session: Session,
}

impl LogManager {
    /// Opens (creating if absent) the conversation directory, replays any
    /// existing `messages.jsonl` into a fresh [`Session`], and acquires the
    /// directory's advisory lock. Re-entry from the same process succeeds;
    /// a genuine cross-process conflict fails fast with a clear error.
    pub fn open(dir: impl AsRef<Path>, max_tokens: usize) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating conversation directory {dir:?}"))?;
        let canon = dir.canonicalize().with_context(|| format!("resolving {dir:?}"))?;

        let lock = {
            let mut held = held_locks().lock().unwrap();
            if let Some(existing) = held.get(&canon) {
                existing.clone()
            } else {
                let lock_path = canon.join("session.lock");
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .open(&lock_path)
                    .with_context(|| format!("opening lock file {lock_path:?}"))?;
                file.try_lock_exclusive().map_err(|_| {
                    anyhow::anyhow!("conversation directory {dir:?} is locked by another process")
                })?;
                let arc = Arc::new(Mutex::new(file));
                held.insert(canon.clone(), arc.clone());
                arc
            }
        };

        let messages_path = canon.join("messages.jsonl");
        let mut session = Session::new(max_tokens);
        if messages_path.exists() {
            let content = std::fs::read_to_string(&messages_path)
                .with_context(|| format!("reading {messages_path:?}"))?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let msg: Message = serde_json::from_str(line)
                    .with_context(|| format!("parsing logged message: {line}"))?;
                session.push(msg);
            }
        }

        Ok(Self { canon, messages_path, _lock: lock, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Appends `msg` to the on-disk log and the in-memory session. Messages
    /// are immutable once appended (§3) — there is no update/delete path.
    pub fn append(&mut self, msg: Message) -> anyhow::Result<()> {
        let line = serde_json::to_string(&msg)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.messages_path)
            .with_context(|| format!("appending to {:?}", self.messages_path))?;
        writeln!(f, "{line}")?;
        self.session.push(msg);
        Ok(())
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        let mut held = held_locks().lock().unwrap();
        if let Some(arc) = held.get(&self.canon) {
            // Only the map's reference and ours remain -> last closer unlocks.
            if Arc::strong_count(arc) <= 2 {
                held.remove(&self.canon);
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Construction ─────────────────────────────────────────────────────────

    #[test]
    fn new_session_has_unique_id() {
        let a = Session::new(1000);
        let b = Session::new(1000);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn new_session_starts_empty() {
        let s = Session::new(1000);
        assert!(s.messages.is_empty());
        assert_eq!(s.token_count, 0);
    }

    // ── Token accounting ──────────────────────────────────────────────────────

    #[test]
    fn push_increments_token_count() {
        let mut s = Session::new(1000);
        s.push(Message::user("12345678")); // 8 chars -> 2 tokens
        assert_eq!(s.token_count, 2);
    }

    #[test]
    fn push_many_accumulates_tokens() {
        let mut s = Session::new(10_000);
        s.push_many([Message::user("12345678"), Message::assistant("abcd")]);
        assert_eq!(s.token_count, 3);
    }

    #[test]
    fn recalculate_tokens_matches_push_sum() {
        let mut s = Session::new(1000);
        s.push(Message::user("hello world"));
        let after_push = s.token_count;
        s.recalculate_tokens();
        assert_eq!(s.token_count, after_push);
    }

    #[test]
    fn replace_messages_sets_messages_and_recalculates_tokens() {
        let mut s = Session::new(1000);
        s.push(Message::user("first"));
        s.push(Message::assistant("reply"));
        let new_msgs = vec![Message::user("only")];
        s.replace_messages(new_msgs);
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.token_count, 1);
    }

    // ── Context fraction / near-limit ────────────────────────────────────────

    #[test]
    fn context_fraction_zero_when_empty_or_unbounded() {
        assert_eq!(Session::new(1000).context_fraction(), 0.0);
        assert_eq!(Session::new(0).context_fraction(), 0.0);
    }

    #[test]
    fn is_near_limit_true_when_over_threshold() {
        let mut s = Session::new(4);
        s.push(Message::user("1234567890123"));
        s.push(Message::user("abcd"));
        assert!(s.is_near_limit(0.8));
    }

    // ── LogManager ────────────────────────────────────────────────────────────

    #[test]
    fn log_manager_replays_messages_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut mgr = LogManager::open(tmp.path(), 10_000).unwrap();
            mgr.append(Message::user("hello")).unwrap();
            mgr.append(Message::assistant("hi there")).unwrap();
        }
        let mgr2 = LogManager::open(tmp.path(), 10_000).unwrap();
        assert_eq!(mgr2.session().messages.len(), 2);
        assert_eq!(mgr2.session().messages[0].as_text(), Some("hello"));
    }

    #[test]
    fn log_manager_same_process_reentry_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let _a = LogManager::open(tmp.path(), 1000).unwrap();
        let _b = LogManager::open(tmp.path(), 1000).unwrap();
    }
}
