// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Purely observational prompt-cache bookkeeping (§4.6). Listens to
//! `cache.invalidated` and `step.post`; triggers no behavior of its own.
use std::sync::{Arc, Mutex};

/// A point-in-time snapshot of cache bookkeeping, handed to subscribers.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub last_invalidation_reason: Option<String>,
    pub turns_since_invalidation: u64,
    pub tokens_since_invalidation: u64,
    pub invalidation_count: u64,
}

type Subscriber = Arc<dyn Fn(&CacheState) + Send + Sync>;

/// Tracks [`CacheState`] and notifies subscribers on every invalidation.
#[derive(Default)]
pub struct CacheTracker {
    state: Mutex<CacheState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl CacheTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        self.state.lock().unwrap().clone()
    }

    /// Registers a callback invoked once per invalidation, after the new
    /// state is computed.
    pub fn subscribe<F>(&self, f: F)
    where
        F: Fn(&CacheState) + Send + Sync + 'static,
    {
        self.subscribers.lock().unwrap().push(Arc::new(f));
    }

    /// Called once per completed step (`step.post`): accumulates elapsed
    /// turns/tokens since the last invalidation.
    pub fn record_step(&self, tokens_this_step: u64) {
        let mut state = self.state.lock().unwrap();
        state.turns_since_invalidation += 1;
        state.tokens_since_invalidation += tokens_this_step;
    }

    /// Called on `cache.invalidated`: resets the running counters and
    /// notifies every subscriber with the new state.
    pub fn invalidate(&self, reason: impl Into<String>) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.last_invalidation_reason = Some(reason.into());
            state.turns_since_invalidation = 0;
            state.tokens_since_invalidation = 0;
            state.invalidation_count += 1;
            state.clone()
        };
        for sub in self.subscribers.lock().unwrap().iter() {
            sub(&snapshot);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn record_step_accumulates_turns_and_tokens() {
        let t = CacheTracker::new();
        t.record_step(100);
        t.record_step(50);
        let s = t.state();
        assert_eq!(s.turns_since_invalidation, 2);
        assert_eq!(s.tokens_since_invalidation, 150);
    }

    #[test]
    fn invalidate_resets_counters_and_increments_count() {
        let t = CacheTracker::new();
        t.record_step(100);
        t.invalidate("context edit");
        let s = t.state();
        assert_eq!(s.turns_since_invalidation, 0);
        assert_eq!(s.tokens_since_invalidation, 0);
        assert_eq!(s.invalidation_count, 1);
        assert_eq!(s.last_invalidation_reason.as_deref(), Some("context edit"));
    }

    #[test]
    fn subscribers_invoked_exactly_once_per_invalidation() {
        let t = CacheTracker::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        t.subscribe(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        t.invalidate("one");
        t.invalidate("two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
