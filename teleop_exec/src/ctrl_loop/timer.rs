//! Fixed rate timer
//!
//! Deadlines are aligned to multiples of the period measured from a fixed epoch, so the loop keeps
//! its phase however long each cycle's work takes. A cycle which overruns simply waits for the
//! next boundary, missed boundaries are not made up.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RateTimer {
    epoch: Instant,
    period: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RateTimer {
    /// Start a timer at the given rate, with the epoch set to now.
    ///
    /// `rate_hz` must be finite and positive.
    pub fn new(rate_hz: f64) -> Self {
        Self {
            epoch: Instant::now(),
            period: Duration::from_secs_f64(1.0 / rate_hz),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time remaining until the next aligned deadline.
    pub fn time_to_next(&self) -> Duration {
        phase_sleep(self.epoch.elapsed(), self.period)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Time to sleep from `since_epoch` until the next multiple of `period`.
///
/// Always in `(0, period]`, or zero if the period is zero.
pub fn phase_sleep(since_epoch: Duration, period: Duration) -> Duration {
    let period_ns = period.as_nanos();
    if period_ns == 0 {
        return Duration::from_secs(0);
    }

    let rem_ns = since_epoch.as_nanos() % period_ns;

    Duration::from_nanos((period_ns - rem_ns) as u64)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_phase_sleep() {
        let p = Duration::from_millis(20);

        assert_eq!(phase_sleep(Duration::from_millis(0), p), p);
        assert_eq!(phase_sleep(Duration::from_millis(5), p), Duration::from_millis(15));
        assert_eq!(phase_sleep(Duration::from_millis(20), p), p);

        // Overruns wait for the following boundary rather than stacking
        assert_eq!(phase_sleep(Duration::from_millis(47), p), Duration::from_millis(13));
        assert_eq!(phase_sleep(Duration::from_millis(47), Duration::from_secs(0)), Duration::from_secs(0));
    }

    #[test]
    fn test_period() {
        assert_eq!(RateTimer::new(50.0).period(), Duration::from_millis(20));
    }
}
