//! Windowed counters for rules that declare a rate limit.
//!
//! Each key owns one window. A call on a missing or expired window opens a
//! fresh one at count 1; otherwise the count is bumped and the call is allowed
//! while `count <= max_count`. Single process only.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindow {
    pub window_start: u64,
    pub count: u32,
    pub max_count: u32,
    pub window_ms: u64,
}

impl RateWindow {
    fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.window_start) >= self.window_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    pub current_count: u32,
    pub max_count: u32,
    pub reset_in_ms: u64,
}

/// Serializable window table; the clock is supplied per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub windows: HashMap<String, RateWindow>,
}

impl RateLimitState {
    pub fn check(&mut self, key: &str, max_count: u32, window_ms: u64, now: u64) -> RateLimitResult {
        let fresh = RateWindow { window_start: now, count: 1, max_count, window_ms };

        let window = self
            .windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.expired(now) {
                    *w = fresh;
                } else {
                    w.count = w.count.saturating_add(1);
                    w.max_count = max_count;
                    w.window_ms = window_ms;
                }
            })
            .or_insert(fresh);

        RateLimitResult {
            allowed: window.count <= max_count,
            current_count: window.count,
            max_count,
            reset_in_ms: window.window_start.saturating_add(window.window_ms).saturating_sub(now),
        }
    }

    /// Drop windows that have run out.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.expired(now));
        before - self.windows.len()
    }
}

/// Rate limiter bound to a clock.
pub struct RateLimiter {
    state: RateLimitState,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { state: RateLimitState::default(), clock }
    }

    pub fn with_state(state: RateLimitState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    pub fn check(&mut self, key: &str, max_count: u32, window_ms: u64) -> RateLimitResult {
        let now = self.clock.now_ms();
        self.state.check(key, max_count, window_ms, now)
    }

    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.state.purge_expired(now)
    }

    pub fn state(&self) -> &RateLimitState {
        &self.state
    }

    pub fn into_state(self) -> RateLimitState {
        self.state
    }
}

/// Limiter key for a policy rule.
pub fn rule_key(rule_id: &str) -> String {
    format!("rule:{rule_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (RateLimiter::new(clock.clone()), clock)
    }

    #[test]
    fn fourth_call_in_window_is_denied() {
        let (mut rl, clock) = limiter();
        let allowed: Vec<bool> = (0..4)
            .map(|_| {
                clock.advance(10);
                rl.check("k", 3, 1000).allowed
            })
            .collect();
        assert_eq!(allowed, vec![true, true, true, false]);
    }

    #[test]
    fn window_expiry_resets() {
        let (mut rl, clock) = limiter();
        for _ in 0..4 {
            rl.check("k", 3, 1000);
        }
        clock.advance(1000);
        let r = rl.check("k", 3, 1000);
        assert!(r.allowed);
        assert_eq!(r.current_count, 1);
        assert_eq!(r.reset_in_ms, 1000);
    }

    #[test]
    fn reset_counts_down() {
        let (mut rl, clock) = limiter();
        rl.check("k", 3, 1000);
        clock.advance(400);
        let r = rl.check("k", 3, 1000);
        assert_eq!(r.current_count, 2);
        assert_eq!(r.reset_in_ms, 600);
    }

    #[test]
    fn keys_are_independent() {
        let (mut rl, _) = limiter();
        assert!(rl.check("a", 1, 1000).allowed);
        assert!(!rl.check("a", 1, 1000).allowed);
        assert!(rl.check("b", 1, 1000).allowed);
    }

    #[test]
    fn purge_drops_only_expired() {
        let (mut rl, clock) = limiter();
        rl.check("old", 1, 100);
        clock.advance(50);
        rl.check("new", 1, 1000);
        clock.advance(60);
        assert_eq!(rl.purge_expired(), 1);
        assert!(rl.state().windows.contains_key("new"));
    }

    #[test]
    fn state_survives_rebinding() {
        let (mut rl, clock) = limiter();
        rl.check("k", 2, 1000);
        let mut rl = RateLimiter::with_state(rl.into_state(), clock);
        assert!(rl.check("k", 2, 1000).allowed);
        assert!(!rl.check("k", 2, 1000).allowed);
    }

    #[test]
    fn rule_keys() {
        assert_eq!(rule_key("rate-agent"), "rule:rate-agent");
    }
}
