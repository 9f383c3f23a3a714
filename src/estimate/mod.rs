//! Run duration estimates
//!
//! The fetcher dispatches at most one request per interval, so a batch run is
//! linear in its page count.

use serde::Serialize;
use std::time::Duration;

use crate::utils::format_seconds;

/// Fixed startup and sitemap overhead added to every run estimate
pub const DEFAULT_RUN_OVERHEAD: Duration = Duration::from_secs(10);

/// Request time assumed when no run has recorded one yet
pub const DEFAULT_AVERAGE_REQUEST_TIME: Duration = Duration::from_secs(1);

/// Linear duration model: `page_count * (interval + per_page_overhead)`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sitescribe::estimate::estimate;
///
/// let total = estimate(10, Duration::from_secs(10), Duration::ZERO);
/// assert_eq!(total, Duration::from_secs(100));
/// ```
pub fn estimate(page_count: usize, interval: Duration, per_page_overhead: Duration) -> Duration {
    let per_page = interval.saturating_add(per_page_overhead);
    per_page.saturating_mul(u32::try_from(page_count).unwrap_or(u32::MAX))
}

/// Breakdown of an estimated run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunEstimate {
    pub page_count: usize,
    pub interval: Duration,
    pub average_request_time: Duration,
    /// Time per page beyond the pacing interval
    pub per_page_overhead: Duration,
    pub run_overhead: Duration,
    pub total: Duration,
}

impl RunEstimate {
    /// Total in the `1 hour, 2 minutes, 3.00 seconds` form
    pub fn human_total(&self) -> String {
        format_seconds(self.total.as_secs_f64())
    }
}

/// Estimate a full run from the recorded average request time
///
/// A dispatch slot lasts the longer of the pacing interval and the request
/// itself, so only request time beyond the interval adds per-page overhead.
/// [`DEFAULT_RUN_OVERHEAD`] is added once.
pub fn estimate_run(
    page_count: usize,
    interval: Duration,
    average_request_time: Option<Duration>,
) -> RunEstimate {
    let average = average_request_time.unwrap_or(DEFAULT_AVERAGE_REQUEST_TIME);
    let per_page_overhead = average.saturating_sub(interval);
    let total = estimate(page_count, interval, per_page_overhead).saturating_add(DEFAULT_RUN_OVERHEAD);

    RunEstimate {
        page_count,
        interval,
        average_request_time: average,
        per_page_overhead,
        run_overhead: DEFAULT_RUN_OVERHEAD,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_basic() {
        assert_eq!(
            estimate(10, Duration::from_secs(10), Duration::ZERO),
            Duration::from_secs(100)
        );
        assert_eq!(
            estimate(0, Duration::from_secs(10), Duration::from_secs(3)),
            Duration::ZERO
        );
        assert_eq!(
            estimate(4, Duration::from_secs(10), Duration::from_millis(500)),
            Duration::from_secs(42)
        );
    }

    #[test]
    fn test_estimate_run_fast_requests() {
        // Requests shorter than the interval add nothing per page
        let run = estimate_run(5, Duration::from_secs(10), Some(Duration::from_secs(2)));
        assert_eq!(run.per_page_overhead, Duration::ZERO);
        assert_eq!(run.total, Duration::from_secs(60));
        assert_eq!(run.human_total(), "1 minute, 0.00 seconds");
    }

    #[test]
    fn test_estimate_run_slow_requests() {
        let run = estimate_run(3, Duration::from_secs(10), Some(Duration::from_secs(12)));
        assert_eq!(run.per_page_overhead, Duration::from_secs(2));
        assert_eq!(run.total, Duration::from_secs(46));
    }

    #[test]
    fn test_estimate_run_default_average() {
        let run = estimate_run(1, Duration::ZERO, None);
        assert_eq!(run.average_request_time, DEFAULT_AVERAGE_REQUEST_TIME);
        assert_eq!(run.total, Duration::from_secs(11));
    }

    proptest! {
        #[test]
        fn estimate_is_linear(
            pages in 0usize..10_000,
            interval_ms in 0u64..60_000,
            overhead_ms in 0u64..10_000,
        ) {
            let interval = Duration::from_millis(interval_ms);
            let overhead = Duration::from_millis(overhead_ms);

            let one = estimate(1, interval, overhead);
            prop_assert_eq!(estimate(pages, interval, overhead), one * pages as u32);
            prop_assert_eq!(
                estimate(pages + 1, interval, overhead),
                estimate(pages, interval, overhead) + one
            );
        }
    }
}
