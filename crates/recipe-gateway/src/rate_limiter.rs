//! Per-client sliding-window rate limiter

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Sliding-window limiter keyed by client identifier
///
/// Check-and-record happens under one lock, so concurrent requests from the
/// same client cannot both slip past the limit. The lock is never held across
/// an await.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    max_requests: usize,
    window: Duration,
}

struct LimiterState {
    windows: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    /// Create a limiter with a 60-second window
    pub fn new(max_requests: usize) -> Self {
        Self::with_window(max_requests, Duration::from_secs(60))
    }

    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            max_requests,
            window,
        }
    }

    /// Admit or reject a request arriving now
    pub fn admit(&self, client_id: &str) -> bool {
        self.admit_at(client_id, Instant::now())
    }

    /// Admit or reject a request arriving at `now`
    pub fn admit_at(&self, client_id: &str, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // Drop clients whose whole window has expired, at most once per window
        if now.saturating_duration_since(state.last_sweep) >= self.window {
            let window = self.window;
            let before = state.windows.len();
            state.windows.retain(|_, timestamps| {
                timestamps
                    .back()
                    .is_some_and(|&last| now.saturating_duration_since(last) < window)
            });
            state.last_sweep = now;
            debug!(
                "Rate limiter sweep evicted {} idle clients",
                before - state.windows.len()
            );
        }

        let timestamps = state.windows.entry(client_id.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Number of clients currently holding state
    pub fn tracked_clients(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
