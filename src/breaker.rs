//! Flood-protection circuit breaker.
//!
//! Counts confirmed matches inside a rolling time window. Once the count
//! reaches the threshold the breaker opens and the orchestrator stops
//! scanning until the window elapses; affected strings pass through
//! unmodified. This trade-off is deliberate and fail-open: availability of
//! logging is preserved over completeness of redaction.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker tuning. The defaults are the engine's historical constants:
/// 1000 matches inside a 5 second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Confirmed matches allowed per window; reaching this opens the breaker.
    pub threshold: u64,
    pub window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 1000,
            window: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    window_start: Instant,
    count: u64,
    open: bool,
}

/// Global per engine instance, shared by every concurrent scan; all state
/// transitions happen under one lock so concurrent increments can neither
/// lose updates nor observe a half-advanced window.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                window_start: Instant::now(),
                count: 0,
                open: false,
            }),
        }
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Gate consulted before scanning a string. An open breaker closes again
    /// once its window has elapsed.
    pub fn should_process(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = state.window_start.elapsed();
        if state.open {
            if elapsed >= self.config.window {
                state.open = false;
                state.count = 0;
                state.window_start = Instant::now();
                tracing::info!(target: "opaque::security", "circuit breaker closed; scanning resumed");
                return true;
            }
            return false;
        }
        if elapsed >= self.config.window {
            state.count = 0;
            state.window_start = Instant::now();
        }
        true
    }

    /// Record one confirmed match. Opening is signaled through observable
    /// behavior plus a log event, never an error.
    pub fn record_match(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.window_start.elapsed() >= self.config.window && !state.open {
            state.count = 0;
            state.window_start = Instant::now();
        }
        state.count += 1;
        if !state.open && state.count >= self.config.threshold {
            state.open = true;
            state.window_start = Instant::now();
            tracing::warn!(
                target: "opaque::security",
                matches = state.count,
                window_secs = self.config.window.as_secs_f64(),
                "circuit breaker opened; passing text through unmodified until the window elapses"
            );
        }
    }

    /// Whether the breaker is currently open (diagnostic).
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.open && state.window_start.elapsed() < self.config.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u64, window_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            threshold,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn closed_until_threshold() {
        let b = breaker(3, 60_000);
        assert!(b.should_process());
        b.record_match();
        b.record_match();
        assert!(b.should_process());
        b.record_match();
        assert!(!b.should_process());
        assert!(b.is_open());
    }

    #[test]
    fn reopens_after_window() {
        let b = breaker(2, 50);
        b.record_match();
        b.record_match();
        assert!(!b.should_process());
        std::thread::sleep(Duration::from_millis(60));
        assert!(b.should_process());
        assert!(!b.is_open());
        // Counter was reset with the window.
        b.record_match();
        assert!(b.should_process());
    }

    #[test]
    fn count_resets_when_idle_past_window() {
        let b = breaker(2, 50);
        b.record_match();
        std::thread::sleep(Duration::from_millis(60));
        b.record_match();
        // Two matches total but never two inside one window.
        assert!(b.should_process());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let b = std::sync::Arc::new(breaker(1000, 60_000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let b = std::sync::Arc::clone(&b);
            handles.push(std::thread::spawn(move || {
                for _ in 0..125 {
                    b.record_match();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        // 8 * 125 = 1000 == threshold: the breaker must have opened.
        assert!(!b.should_process());
    }
}
