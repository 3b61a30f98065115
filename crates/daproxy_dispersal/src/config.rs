//! Configuration for dispersal stores.

use crate::error::{DispersalError, DispersalResult};
use daproxy_storage::{serde_millis, DEFAULT_MAX_BLOB_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total put attempts.
    ///
    /// A positive value bounds the number of attempts, a negative value
    /// retries until success or cancellation, and zero is invalid.
    pub put_tries: i32,
    /// Initial delay between retries.
    #[serde(with = "serde_millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    #[serde(with = "serde_millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
    /// Fixed pause after the disperser reports rate limiting.
    #[serde(with = "serde_millis")]
    pub resource_exhausted_backoff: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(put_tries: i32) -> Self {
        Self {
            put_tries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            resource_exhausted_backoff: Duration::from_secs(5),
        }
    }

    /// Creates a configuration with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            put_tries: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
            resource_exhausted_backoff: Duration::ZERO,
        }
    }

    /// Retries until success or cancellation.
    pub fn unlimited() -> Self {
        Self::new(-1)
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

    /// Sets the rate-limit pause.
    pub fn with_resource_exhausted_backoff(mut self, backoff: Duration) -> Self {
        self.resource_exhausted_backoff = backoff;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DispersalError::InvalidConfig`] if `put_tries` is zero or
    /// `backoff_multiplier` is below 1.0 or not finite.
    pub fn validate(&self) -> DispersalResult<()> {
        if self.put_tries == 0 {
            return Err(DispersalError::InvalidConfig(
                "put_tries must be non-zero (positive bounds attempts, negative retries forever)"
                    .into(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(DispersalError::InvalidConfig(format!(
                "backoff_multiplier must be a finite value of at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let delay_secs = if self.add_jitter {
            // up to 25%
            delay_secs + delay_secs * 0.25 * rand_jitter()
        } else {
            delay_secs
        };
        // NaN or negative only from an unvalidated multiplier
        Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

/// On-chain confirmation polling for legacy stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Interval between verification polls, roughly one L1 block.
    #[serde(with = "serde_millis")]
    pub poll_interval: Duration,
    /// Overall budget for confirmation of one dispersal.
    #[serde(with = "serde_millis")]
    pub status_query_timeout: Duration,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(12),
            status_query_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl ConfirmationConfig {
    /// Creates a confirmation configuration.
    pub fn new(poll_interval: Duration, status_query_timeout: Duration) -> Self {
        Self {
            poll_interval,
            status_query_timeout,
        }
    }
}

/// Configuration shared by the versioned DA stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaStoreConfig {
    /// Largest accepted encoded blob.
    pub max_blob_size_bytes: usize,
    /// Retry policy for puts.
    pub retry: RetryConfig,
    /// Confirmation polling (legacy stores only).
    pub confirmation: ConfirmationConfig,
}

impl Default for DaStoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DaStoreConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_blob_size_bytes: DEFAULT_MAX_BLOB_SIZE,
            retry: RetryConfig::default(),
            confirmation: ConfirmationConfig::default(),
        }
    }

    /// Sets the maximum encoded blob size.
    pub fn with_max_blob_size(mut self, bytes: usize) -> Self {
        self.max_blob_size_bytes = bytes;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the confirmation configuration.
    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.put_tries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_tries_rejected() {
        assert!(matches!(
            RetryConfig::new(0).validate(),
            Err(DispersalError::InvalidConfig(_))
        ));
        assert!(RetryConfig::unlimited().validate().is_ok());
    }

    #[test]
    fn shrinking_or_non_finite_multiplier_rejected() {
        for multiplier in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let config = RetryConfig::new(3).with_backoff_multiplier(multiplier);
            assert!(
                matches!(config.validate(), Err(DispersalError::InvalidConfig(_))),
                "multiplier {multiplier} accepted"
            );
        }
        assert!(RetryConfig::new(3).with_backoff_multiplier(1.0).validate().is_ok());
    }

    #[test]
    fn negative_multiplier_from_json_rejected() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"put_tries": 3, "backoff_multiplier": -2.0}"#).unwrap();
        assert!(config.validate().is_err());

        // an unvalidated config still yields a usable delay
        let delay = config.with_jitter(false).delay_for_attempt(2);
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_capped() {
        let config = RetryConfig::new(20)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn config_from_json() {
        let json = r#"{
            "max_blob_size_bytes": 1024,
            "retry": { "put_tries": -1, "initial_delay": 50 },
            "confirmation": { "poll_interval": 1000 }
        }"#;
        let config: DaStoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_blob_size_bytes, 1024);
        assert_eq!(config.retry.put_tries, -1);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(50));
        assert_eq!(config.confirmation.poll_interval, Duration::from_secs(1));
        assert_eq!(
            config.confirmation.status_query_timeout,
            Duration::from_secs(1800)
        );
    }
}
