//! Adaptive client-side rate limiting
//!
//! Paces outbound probe traffic with a sliding 60-second window plus a
//! minimum inter-request interval, and adapts the per-minute ceiling to
//! server feedback: 429 responses shrink it, sustained success grows it
//! back toward twice the configured baseline.
//!
//! All state lives behind a single mutex. [`RateLimiter::wait_if_needed`]
//! is the only suspension point; it computes the required delay under the
//! lock, sleeps outside it, and re-validates, so record operations are
//! never blocked by a sleeping waiter.
//!
//! # Example
//!
//! ```rust,no_run
//! use spec_drift::limiter::{RateLimitConfig, RateLimiter};
//!
//! # async fn probe() {
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//! limiter.wait_if_needed().await;
//! // ... issue the request ...
//! limiter.record_success();
//! # }
//! ```

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Sliding window span.
const WINDOW: Duration = Duration::from_secs(60);

/// Safety margin added when waiting for the oldest admission to age out.
const WINDOW_MARGIN: Duration = Duration::from_millis(100);

/// The adaptive ceiling never drops below this many requests per minute.
const MIN_RPM: f64 = 5.0;

/// Rate limiter tuning. Defaults match the conservative profile used
/// against production tenants.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Baseline requests per minute; the adaptive ceiling starts here and
    /// may grow to twice this value.
    pub requests_per_minute: u32,
    /// Minimum spacing between consecutive admissions.
    pub min_request_interval: Duration,
    /// First backoff handed to the caller after a 429.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Backoff growth factor per consecutive 429.
    pub backoff_multiplier: f64,
    /// Whether the ceiling reacts to server feedback at all.
    pub adaptive: bool,
    /// Ceiling shrink factor applied on a 429.
    pub decrease_factor: f64,
    /// Ceiling growth factor applied after a success streak.
    pub increase_factor: f64,
    /// Consecutive successes required before raising the ceiling.
    pub success_streak_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            min_request_interval: Duration::from_millis(500),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            adaptive: true,
            decrease_factor: 0.8,
            increase_factor: 1.1,
            success_streak_threshold: 50,
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    /// Admission timestamps, oldest first. Bounded by the ceiling cap.
    window: VecDeque<Instant>,
    /// Adaptive requests-per-minute ceiling. A float because the
    /// shrink/grow factors are fractional.
    current_rpm: f64,
    current_backoff: Duration,
    success_streak: u32,
}

/// Point-in-time limiter snapshot for logs and run summaries.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub current_rpm: f64,
    pub requests_in_window: usize,
    pub current_backoff_secs: f64,
    pub success_streak: u32,
}

/// Shared, adaptive request pacer. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window_capacity: usize,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window_capacity = (2 * config.requests_per_minute).max(MIN_RPM as u32) as usize;
        let state = LimiterState {
            window: VecDeque::with_capacity(window_capacity),
            current_rpm: f64::from(config.requests_per_minute),
            current_backoff: config.initial_backoff,
            success_streak: 0,
        };
        Self {
            config,
            window_capacity,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Upper bound the adaptive ceiling may grow to.
    fn ceiling(&self) -> f64 {
        2.0 * f64::from(self.config.requests_per_minute)
    }

    // State mutations are small and non-panicking, so a poisoned guard
    // still holds consistent data; recover it instead of propagating.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_expired(window: &mut VecDeque<Instant>, now: Instant) {
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) > WINDOW)
        {
            window.pop_front();
        }
    }

    /// Delay required before the next admission, or `None` once admitted.
    /// Must be called with expired entries already evicted.
    fn try_admit(&self, state: &mut LimiterState, now: Instant) -> Option<Duration> {
        if (state.window.len() as f64) + 1.0 > state.current_rpm {
            if let Some(oldest) = state.window.front() {
                let wait = WINDOW.saturating_sub(now.duration_since(*oldest)) + WINDOW_MARGIN;
                return Some(wait);
            }
        }

        if let Some(last) = state.window.back() {
            let since_last = now.duration_since(*last);
            if since_last < self.config.min_request_interval {
                return Some(self.config.min_request_interval - since_last);
            }
        }

        if state.window.len() == self.window_capacity {
            state.window.pop_front();
        }
        state.window.push_back(now);
        None
    }

    /// Block (asynchronously) until a request may be issued.
    ///
    /// Admissions are FIFO relative to the window; there is no
    /// cancellation, a blocked wait runs to completion. The lock is
    /// released while sleeping and the state re-validated afterwards.
    pub async fn wait_if_needed(&self) {
        loop {
            let delay = {
                let mut state = self.lock_state();
                let now = Instant::now();
                Self::evict_expired(&mut state.window, now);
                self.try_admit(&mut state, now)
            };

            match delay {
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "rate limit pacing");
                    sleep(delay).await;
                }
                None => return,
            }
        }
    }

    /// Record a successful (non-429) response.
    ///
    /// Resets the backoff and, once the success streak reaches the
    /// configured threshold, raises the ceiling by `increase_factor`
    /// capped at twice the baseline.
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        state.success_streak += 1;
        state.current_backoff = self.config.initial_backoff;

        if self.config.adaptive && state.success_streak >= self.config.success_streak_threshold {
            let raised = (state.current_rpm * self.config.increase_factor).min(self.ceiling());
            if raised > state.current_rpm {
                debug!(
                    from = state.current_rpm,
                    to = raised,
                    "raising request ceiling after success streak"
                );
            }
            state.current_rpm = raised;
            state.success_streak = 0;
        }
    }

    /// Record a 429 from the server and obtain the backoff to sleep.
    ///
    /// Zeroes the streak, shrinks the ceiling by `decrease_factor` with a
    /// floor of five requests per minute, and doubles the stored backoff
    /// (capped) for the next occurrence.
    pub fn record_rate_limit(&self) -> Duration {
        let mut state = self.lock_state();
        state.success_streak = 0;

        if self.config.adaptive {
            let lowered = (state.current_rpm * self.config.decrease_factor).max(MIN_RPM);
            warn!(
                ceiling = lowered,
                "rate limited by server, lowering request ceiling"
            );
            state.current_rpm = lowered;
        }

        let backoff = state.current_backoff;
        state.current_backoff = state
            .current_backoff
            .mul_f64(self.config.backoff_multiplier)
            .min(self.config.max_backoff);
        backoff
    }

    /// Snapshot the limiter state (expired admissions evicted first).
    pub fn stats(&self) -> RateLimiterStats {
        let mut state = self.lock_state();
        let now = Instant::now();
        Self::evict_expired(&mut state.window, now);

        RateLimiterStats {
            current_rpm: state.current_rpm,
            requests_in_window: state.window.len(),
            current_backoff_secs: state.current_backoff.as_secs_f64(),
            success_streak: state.success_streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fast_config() -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: 3,
            min_request_interval: Duration::ZERO,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.requests_per_minute, 30);
        assert_eq!(config.min_request_interval, Duration::from_millis(500));
        assert_eq!(config.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.max_backoff, Duration::from_secs(60));
        assert!(config.adaptive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_blocks_at_ceiling() {
        let limiter = RateLimiter::new(fast_config());

        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_if_needed().await;
        }
        assert_eq!(limiter.stats().requests_in_window, 3);
        assert!(start.elapsed() < Duration::from_secs(1));

        // Fourth admission must wait for the oldest entry to age out.
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_secs(59));
        assert!(limiter.stats().requests_in_window <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_never_exceeds_ceiling() {
        let limiter = RateLimiter::new(fast_config());

        for _ in 0..10 {
            limiter.wait_if_needed().await;
            let stats = limiter.stats();
            assert!(
                stats.requests_in_window as f64 <= stats.current_rpm,
                "window {} exceeded ceiling {}",
                stats.requests_in_window,
                stats.current_rpm
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spacing() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 100,
            min_request_interval: Duration::from_millis(500),
            ..RateLimitConfig::default()
        });

        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let limiter = RateLimiter::new(RateLimitConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
            ..RateLimitConfig::default()
        });

        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(1));
        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(2));
        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(4));
        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(4));
    }

    #[test]
    fn test_success_resets_backoff() {
        let limiter = RateLimiter::new(RateLimitConfig::default());

        let _ = limiter.record_rate_limit();
        let _ = limiter.record_rate_limit();
        limiter.record_success();
        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(1));
    }

    #[test]
    fn test_ceiling_shrinks_with_floor() {
        let limiter = RateLimiter::new(RateLimitConfig::default());

        let _ = limiter.record_rate_limit();
        assert!((limiter.stats().current_rpm - 24.0).abs() < 1e-9);

        for _ in 0..50 {
            let _ = limiter.record_rate_limit();
        }
        assert!(limiter.stats().current_rpm >= 5.0);
    }

    #[test]
    fn test_ceiling_grows_after_streak_and_caps() {
        let limiter = RateLimiter::new(RateLimitConfig {
            success_streak_threshold: 2,
            increase_factor: 2.0,
            ..RateLimitConfig::default()
        });

        limiter.record_success();
        assert!((limiter.stats().current_rpm - 30.0).abs() < 1e-9);
        limiter.record_success();
        assert!((limiter.stats().current_rpm - 60.0).abs() < 1e-9);

        // Already at twice the baseline; further streaks are a no-op.
        limiter.record_success();
        limiter.record_success();
        assert!((limiter.stats().current_rpm - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_limit_resets_streak() {
        let limiter = RateLimiter::new(RateLimitConfig {
            success_streak_threshold: 3,
            ..RateLimitConfig::default()
        });

        limiter.record_success();
        limiter.record_success();
        let _ = limiter.record_rate_limit();
        assert_eq!(limiter.stats().success_streak, 0);

        limiter.record_success();
        limiter.record_success();
        limiter.record_success();
        assert!(limiter.stats().current_rpm > 24.0);
    }

    #[test]
    fn test_non_adaptive_keeps_ceiling() {
        let limiter = RateLimiter::new(RateLimitConfig {
            adaptive: false,
            ..RateLimitConfig::default()
        });

        let _ = limiter.record_rate_limit();
        assert!((limiter.stats().current_rpm - 30.0).abs() < 1e-9);

        // Backoff still escalates even when the ceiling is pinned.
        assert_eq!(limiter.record_rate_limit(), Duration::from_secs(2));
    }

    proptest! {
        #[test]
        fn prop_ceiling_stays_bounded(ops in prop::collection::vec(any::<bool>(), 0..200)) {
            let limiter = RateLimiter::new(RateLimitConfig::default());
            for success in ops {
                if success {
                    limiter.record_success();
                } else {
                    let _ = limiter.record_rate_limit();
                }
                let stats = limiter.stats();
                prop_assert!(stats.current_rpm >= 5.0);
                prop_assert!(stats.current_rpm <= 60.0);
            }
        }
    }
}
