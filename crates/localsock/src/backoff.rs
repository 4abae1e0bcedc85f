//! Accept-loop retry delay.

use std::time::Duration;

use localsock_traits::BackoffConfig;

/// Retry delay for the accept loop.
///
/// Unset until the first failure. Each consecutive failure doubles the delay,
/// capped at the configured maximum; a successful accept resets it.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    config: BackoffConfig,
    current: Option<Duration>,
}

impl AcceptBackoff {
    /// Creates an unset backoff with normalized `config`.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config: config.normalized(),
            current: None,
        }
    }

    /// Advances to the next delay and returns it.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.config.initial_delay,
            Some(previous) => previous.saturating_mul(2).min(self.config.max_delay),
        };
        self.current = Some(next);
        next
    }

    /// Returns to the unset state.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// The most recent delay, or `None` when unset.
    pub fn current(&self) -> Option<Duration> {
        self.current
    }

    /// The normalized timing in use.
    pub fn config(&self) -> BackoffConfig {
        self.config
    }
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(initial_ms: u64, max_ms: u64) -> AcceptBackoff {
        AcceptBackoff::new(BackoffConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
        })
    }

    #[test]
    fn test_starts_unset() {
        let backoff = backoff(10, 100);
        assert_eq!(backoff.current(), None);
    }

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = backoff(10, 50);
        let delays: Vec<u64> = (0..5)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![10, 20, 40, 50, 50]);
        assert_eq!(backoff.current(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = backoff(10, 1000);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.current(), None);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_inverted_config_is_normalized() {
        let mut backoff = backoff(100, 10);
        assert_eq!(backoff.config().initial_delay, Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }
}
