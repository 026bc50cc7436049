//! Reconnect policy.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Capped exponential backoff between reconnect attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reconnect after an unexpected transport loss
    pub enabled: bool,

    /// Attempts before giving up. 0 means unlimited.
    pub max_attempts: u32,

    /// Delay before the first attempt (milliseconds)
    pub initial_delay_ms: u64,

    /// Upper bound on any delay (milliseconds)
    pub max_delay_ms: u64,

    /// Growth factor per attempt
    pub backoff_multiplier: f64,

    /// Add up to 25% random jitter
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    /// Never reconnect
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Delay before attempt number `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let cap = self.max_delay_ms as f64;
        let mut delay =
            (self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent)).min(cap);

        if self.jitter && delay > 0.0 {
            delay += rand::thread_rng().gen_range(0.0..=delay * 0.25);
            delay = delay.min(cap);
        }

        Duration::from_millis(delay as u64)
    }

    /// Whether another attempt is allowed after `attempts` failed ones
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempts < self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_exponential_growth() {
        let config = no_jitter();
        assert_eq!(config.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = no_jitter();
        assert_eq!(config.calculate_delay(10), Duration::from_millis(30_000));
        assert_eq!(config.calculate_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = ReconnectConfig::default();
        for _ in 0..100 {
            let delay = config.calculate_delay(2);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(2500));
        }
        assert!(config.calculate_delay(20) <= Duration::from_millis(30_000));
    }

    #[test]
    fn test_should_retry() {
        let config = ReconnectConfig {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));

        let unlimited = ReconnectConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(unlimited.should_retry(1_000_000));

        assert!(!ReconnectConfig::disabled().should_retry(0));
    }
}
