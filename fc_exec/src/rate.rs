//! # Fixed rate timing
//!
//! A [`Rate`] paces a loop to a fixed frequency. Each call to [`Rate::sleep`] blocks until the next
//! tick boundary. If the cycle overran the boundary a warning is logged and the schedule is
//! restarted from the current instant, so an overrun never causes a burst of catch-up ticks.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

use log::warn;

use util::time::period_from_hz;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Loop pacing at a fixed frequency.
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    next_tick: Instant,

    /// Number of consecutive cycles which overran the period
    pub num_consec_overruns: u64,

    /// Total number of overrun cycles
    pub num_overruns: u64,

    /// Warn when a cycle overruns. Disabled for loops that only poll.
    warn_on_overrun: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Clone, Copy)]
pub enum RateError {
    #[error("Expected a finite and positive rate with a representable period, found {0} Hz")]
    InvalidRate(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Rate {
    /// Create a new rate, the first tick boundary being one period from now.
    pub fn new(rate_hz: f64) -> Result<Self, RateError> {
        let period = period_from_hz(rate_hz).ok_or(RateError::InvalidRate(rate_hz))?;

        Ok(Self {
            period,
            next_tick: Instant::now() + period,
            num_consec_overruns: 0,
            num_overruns: 0,
            warn_on_overrun: true,
        })
    }

    /// Disable overrun warnings, the overrun counters are still maintained.
    pub fn quiet(mut self) -> Self {
        self.warn_on_overrun = false;
        self
    }

    /// Restart the schedule, the next boundary being one period from now.
    pub fn reset(&mut self) {
        self.next_tick = Instant::now() + self.period;
    }

    /// Sleep until the next tick boundary.
    ///
    /// Returns the time left in the cycle when it finished, or `None` if it overran.
    pub fn sleep(&mut self) -> Option<Duration> {
        let now = Instant::now();

        match self.next_tick.checked_duration_since(now) {
            Some(d) => {
                self.num_consec_overruns = 0;
                thread::sleep(d);
                self.next_tick += self.period;
                Some(d)
            },
            None => {
                let overrun = now - self.next_tick;
                self.num_consec_overruns += 1;
                self.num_overruns += 1;

                if self.warn_on_overrun {
                    warn!(
                        "Cycle overran by {:.06} s ({} consecutive)",
                        overrun.as_secs_f64(),
                        self.num_consec_overruns
                    );
                }

                self.next_tick = now + self.period;
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_rate() {
        assert_eq!(Rate::new(0.0).unwrap_err(), RateError::InvalidRate(0.0));
        assert!(Rate::new(-5.0).is_err());
        assert!(Rate::new(std::f64::INFINITY).is_err());

        // Too slow for the period to fit in a Duration
        assert_eq!(Rate::new(1e-300).unwrap_err(), RateError::InvalidRate(1e-300));
    }

    #[test]
    fn test_sleep_paces_loop() {
        let mut rate = Rate::new(100.0).unwrap();
        let start = Instant::now();

        for _ in 0..5 {
            rate.sleep();
        }

        // Five 10 ms periods, allowing for scheduler jitter
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_overrun_counted() {
        let mut rate = Rate::new(200.0).unwrap().quiet();

        thread::sleep(Duration::from_millis(12));
        assert_eq!(rate.sleep(), None);
        assert_eq!(rate.num_consec_overruns, 1);

        thread::sleep(Duration::from_millis(12));
        assert_eq!(rate.sleep(), None);
        assert_eq!(rate.num_consec_overruns, 2);
        assert_eq!(rate.num_overruns, 2);

        // Schedule restarted from the overrun, so the next cycle fits
        rate.reset();
        assert!(rate.sleep().is_some());
        assert_eq!(rate.num_consec_overruns, 0);
        assert_eq!(rate.num_overruns, 2);
    }
}
