//! Configuration for feed consumers.

use crate::error::{ConsumerError, ConsumerResult};
use rand::Rng;
use std::time::Duration;

/// What the consumer does after an entry fails to process.
///
/// In both cases the cursor stays on the last entry that succeeded, so the
/// failed entry is delivered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryErrorPolicy {
    /// Move to `Stopped`; an operator must [`reset`](crate::FeedConsumer::reset).
    Stop,
    /// Return to `Idle` and retry the same entry on the next poll.
    #[default]
    RetryNextPoll,
}

/// Configuration for a feed consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Stable identity; the cursor is stored under this id.
    pub consumer_id: String,
    /// Page size of the feed being read.
    pub page_size: usize,
    /// Retry policy for page fetches.
    pub retry: RetryConfig,
    /// Delay between head polls once caught up.
    pub poll_interval: Duration,
    /// Reaction to entry-level failures.
    pub entry_error_policy: EntryErrorPolicy,
}

impl ConsumerConfig {
    /// Creates a configuration for a consumer.
    pub fn new(consumer_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            page_size,
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(1),
            entry_error_policy: EntryErrorPolicy::default(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the head poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the entry error policy.
    pub fn with_entry_error_policy(mut self, policy: EntryErrorPolicy) -> Self {
        self.entry_error_policy = policy;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidConfig`] for an empty consumer id, a
    /// zero page size, or a backoff multiplier below 1.
    pub fn validate(&self) -> ConsumerResult<()> {
        if self.consumer_id.is_empty() {
            return Err(ConsumerError::InvalidConfig(
                "consumer_id must not be empty".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConsumerError::InvalidConfig(
                "page_size must be positive".into(),
            ));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConsumerError::InvalidConfig(format!(
                "retry.backoff_multiplier must be at least 1, got {multiplier}"
            )));
        }
        Ok(())
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random jitter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Total fetch attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based; 0 means no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter && delay_secs > 0.0 {
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_builder() {
        let config = ConsumerConfig::new("billing", 20)
            .with_poll_interval(Duration::from_millis(250))
            .with_entry_error_policy(EntryErrorPolicy::Stop)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.consumer_id, "billing");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.entry_error_policy, EntryErrorPolicy::Stop);
        assert_eq!(config.retry.max_attempts(), 1);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(ConsumerConfig::new("billing", 20).validate().is_ok());

        for config in [
            ConsumerConfig::new("billing", 0),
            ConsumerConfig::new("", 20),
            ConsumerConfig::new("billing", 20)
                .with_retry(RetryConfig::new(3).with_backoff_multiplier(-2.0)),
        ] {
            assert!(matches!(
                config.validate(),
                Err(ConsumerError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn retry_budget_counts_retries() {
        assert_eq!(RetryConfig::new(3).max_attempts(), 4);
        assert_eq!(RetryConfig::no_retry().max_retries, 0);
    }

    #[test]
    fn exponential_backoff_without_jitter() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::new(20)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(400));
        for _ in 0..50 {
            let delay = config.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }
}
