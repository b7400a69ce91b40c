//! Provider Circuit Breaker
//!
//! Per-provider failure counting with a cool-down window. State lives for the
//! lifetime of the process: a restart starts every provider closed. There is
//! no cross-process coordination.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

use suite_gateway_core::SharedClock;

/// Failure bookkeeping for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerState {
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Failure-counting gate in front of each provider.
pub struct CircuitBreaker {
    threshold: u32,
    reset_window: Duration,
    clock: SharedClock,
    states: Mutex<HashMap<String, BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset_window: Duration, clock: SharedClock) -> Self {
        Self {
            threshold: threshold.max(1),
            reset_window,
            clock,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the provider may be attempted.
    ///
    /// Once the reset window has elapsed since the last failure the count is
    /// cleared and the provider is admitted again.
    pub fn is_available(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = states.get_mut(provider) else {
            return true;
        };

        if let Some(last) = state.last_failure_at {
            if now - last > self.reset_window {
                if state.failure_count > 0 {
                    info!(provider, "Circuit breaker reset window elapsed");
                }
                state.failure_count = 0;
                return true;
            }
        }
        state.failure_count < self.threshold
    }

    pub fn record_failure(&self, provider: &str) {
        let now = self.clock.now();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = states.entry(provider.to_string()).or_default();
        state.failure_count += 1;
        state.last_failure_at = Some(now);
        if state.failure_count == self.threshold {
            warn!(
                provider,
                failures = state.failure_count,
                "Circuit breaker opened"
            );
        }
    }

    /// Clear the failure count. Safe to call repeatedly.
    pub fn record_success(&self, provider: &str) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = states.get_mut(provider) {
            state.failure_count = 0;
        }
    }

    pub fn state(&self, provider: &str) -> BreakerState {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(provider)
            .copied()
            .unwrap_or_default()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
