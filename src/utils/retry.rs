//! Backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use backon::ExponentialBuilder;

use crate::config::RetryConfig;

/// Backoff for connections at startup: bounded by `max_attempts`.
pub fn connection_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_attempts)
        .with_jitter()
}

/// Backoff for the consumer's reconnect loop.
///
/// Same delays as [`connection_backoff`]; the loop restarts the schedule
/// after each successful connection, so the attempt bound only caps how
/// many distinct delays are produced before the loop's fallback delay.
pub fn reconnect_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_attempts.max(1))
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use backon::BackoffBuilder;

    use super::*;

    fn config(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            min_delay_ms: 10,
            max_delay_ms: 40,
            max_attempts,
        }
    }

    #[test]
    fn test_connection_backoff_is_bounded() {
        let delays: Vec<Duration> = connection_backoff(&config(3)).build().collect();
        assert_eq!(delays.len(), 3);
    }

    #[test]
    fn test_delays_respect_max_with_jitter() {
        // Jitter at most doubles the capped delay
        for delay in connection_backoff(&config(8)).build() {
            assert!(delay <= Duration::from_millis(80), "delay {:?}", delay);
        }
    }

    #[test]
    fn test_reconnect_backoff_yields_at_least_one_delay() {
        let mut backoff = reconnect_backoff(&config(0)).build();
        assert!(backoff.next().is_some());
    }
}
