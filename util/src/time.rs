//! General time utility functions

use chrono;
use std::time::Duration;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Get the period of a loop running at the given frequency.
///
/// Returns `None` if the frequency isn't a finite positive number, or if the period is too long
/// for a `Duration` or rounds down to zero.
pub fn period_from_hz(rate_hz: f64) -> Option<Duration> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return None
    }

    duration_from_seconds(1.0 / rate_hz).filter(|p| *p > Duration::from_secs(0))
}

/// Convert a number of seconds into a duration, or `None` if negative, non-finite or too large.
pub fn duration_from_seconds(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_period_from_hz() {
        let p50 = period_from_hz(50.0).unwrap();
        let p10 = period_from_hz(10.0).unwrap();
        assert!((p50.as_secs_f64() - 0.02).abs() < 1e-9);
        assert!((p10.as_secs_f64() - 0.1).abs() < 1e-9);
        assert_eq!(period_from_hz(0.0), None);
        assert_eq!(period_from_hz(-1.0), None);
        assert_eq!(period_from_hz(std::f64::NAN), None);

        // Periods a Duration can't hold
        assert_eq!(period_from_hz(1e-300), None);
        assert_eq!(period_from_hz(1e300), None);
    }

    #[test]
    fn test_duration_from_seconds() {
        assert_eq!(duration_from_seconds(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(duration_from_seconds(1e20), None);
        assert_eq!(duration_from_seconds(-1.0), None);
        assert_eq!(duration_from_seconds(std::f64::INFINITY), None);
    }
}
