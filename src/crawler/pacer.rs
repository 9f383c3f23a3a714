//! Request pacing shared by everything that dispatches page requests
//!
//! A pacer admits at most one dispatch per interval. The interval is measured
//! from one dispatch to the next, so time spent waiting on a slow response
//! counts toward the following gap.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Explicit rate-limit state, one per pipeline run
pub struct RequestPacer {
    interval: Duration,

    /// `None` when the interval is zero
    limiter: Option<DirectLimiter>,
}

impl RequestPacer {
    /// Create a pacer allowing one dispatch per `interval`
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(RateLimiter::direct);

        Self { interval, limiter }
    }

    /// Pacer that never waits
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured spacing between dispatches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next dispatch slot is available
    ///
    /// The first call returns immediately.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("interval", &self.interval)
            .field("throttled", &self.limiter.is_some())
            .finish()
    }
}
