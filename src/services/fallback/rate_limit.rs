//! Provider Rate Limiter
//!
//! Sliding one-minute window per provider, process-local. A provider at its
//! `rate_limit_per_minute` is skipped without a network call.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use suite_gateway_core::SharedClock;

pub struct RateLimiter {
    clock: SharedClock,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            window: Duration::minutes(1),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve one call slot. `None` means unlimited.
    pub fn try_acquire(&self, provider: &str, limit: Option<u32>) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let now = self.clock.now();
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let recent = calls.entry(provider.to_string()).or_default();
        while recent.front().is_some_and(|t| now - *t >= self.window) {
            recent.pop_front();
        }
        if recent.len() >= limit as usize {
            return false;
        }
        recent.push_back(now);
        true
    }
}
