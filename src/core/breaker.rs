//! Per-destination circuit breaker.
//!
//! Tracks consecutive failures per destination service inside the gateway
//! process. After `failure_threshold` failures the breaker opens and the
//! router rejects calls without touching the network; once the cooldown has
//! elapsed the breaker turns half-open and admits the next request as a
//! trial. A successful call at any state resets the breaker.
//!
//! State is process-local and never persisted: restarting the gateway
//! resets every breaker to closed. There is deliberately no single-trial
//! guard on the half-open state; concurrent requests arriving right after
//! the cooldown may all be admitted as trials.

use std::time::Duration;

use scc::HashMap;
use tokio::time::Instant;

/// Snapshot of one destination's breaker state.
#[derive(Debug, Clone, Copy)]
pub struct BreakerState {
    pub failure_count: u32,
    pub is_open: bool,
    pub is_half_open: bool,
    pub last_failure_at: Instant,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            failure_count: 0,
            is_open: false,
            is_half_open: false,
            last_failure_at: Instant::now(),
        }
    }
}

/// Failure tracker keyed by destination service name. Entries are created
/// lazily on the first recorded failure and live for the process lifetime.
pub struct CircuitBreaker {
    states: HashMap<String, BreakerState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            states: HashMap::new(),
            failure_threshold,
            cooldown,
        }
    }

    /// Record a failed call to `name`. Opens the breaker once the failure
    /// count reaches the threshold; a failure while half-open re-opens it.
    pub async fn record_failure(&self, name: &str) {
        let mut entry = self
            .states
            .entry_async(name.to_string())
            .await
            .or_insert_with(BreakerState::closed);
        let state = entry.get_mut();

        state.failure_count += 1;
        state.last_failure_at = Instant::now();
        if state.failure_count >= self.failure_threshold {
            if !state.is_open {
                tracing::warn!(
                    service = name,
                    failures = state.failure_count,
                    "circuit breaker opened"
                );
            }
            state.is_open = true;
            state.is_half_open = false;
        }
    }

    /// Record a successful call to `name`, unconditionally resetting its
    /// breaker to closed with zero failures.
    pub async fn record_success(&self, name: &str) {
        self.states
            .update_async(name, |_, state| {
                if state.is_open || state.is_half_open {
                    tracing::info!(service = name, "circuit breaker closed after success");
                }
                *state = BreakerState::closed();
            })
            .await;
    }

    /// Whether calls to `name` should currently be rejected.
    ///
    /// Returns false for destinations with no recorded state. An open
    /// breaker whose cooldown has elapsed transitions in place to half-open
    /// and this check returns false, admitting the caller as the trial
    /// request.
    pub async fn is_open(&self, name: &str) -> bool {
        let cooldown = self.cooldown;
        self.states
            .update_async(name, |_, state| {
                if !state.is_open {
                    return false;
                }
                if state.last_failure_at.elapsed() >= cooldown {
                    state.is_open = false;
                    state.is_half_open = true;
                    tracing::info!(service = name, "circuit breaker half-open, admitting trial");
                    return false;
                }
                true
            })
            .await
            .unwrap_or(false)
    }

    /// Snapshot the state tracked for `name`, if any. Diagnostics only.
    pub async fn state(&self, name: &str) -> Option<BreakerState> {
        self.states.read_async(name, |_, state| *state).await
    }
}
