//! Proportional retry backoff.

use std::time::Duration;

use crate::config;

/// Wait interval for the given retry count.
///
/// Grows linearly from [`config::WAIT_STEP_MIN`] at retry 0 to
/// [`config::WAIT_STEP_MAX`] at [`config::MAX_RETRIES`]; counts past the
/// maximum are clamped.
pub fn retry_interval(retries: usize) -> Duration {
    let capped = retries.min(config::MAX_RETRIES);
    let spread = config::WAIT_STEP_MAX - config::WAIT_STEP_MIN;
    let fraction = capped as f64 / config::MAX_RETRIES as f64;
    config::WAIT_STEP_MIN + spread.mul_f64(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_retry_waits_minimum() {
        assert_eq!(retry_interval(0), config::WAIT_STEP_MIN);
    }

    #[test]
    fn test_last_retry_waits_maximum() {
        assert_eq!(retry_interval(config::MAX_RETRIES), config::WAIT_STEP_MAX);
        assert_eq!(retry_interval(config::MAX_RETRIES * 3), config::WAIT_STEP_MAX);
    }

    #[test]
    fn test_interval_is_monotonic() {
        let mut previous = Duration::ZERO;
        for retries in 0..=config::MAX_RETRIES {
            let interval = retry_interval(retries);
            assert!(interval >= previous, "interval shrank at retry {}", retries);
            previous = interval;
        }
    }
}
